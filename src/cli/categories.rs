use comfy_table::{Cell, Table};

use crate::db::{create_category, delete_category, find_category, list_categories};
use crate::error::Result;
use crate::models::TransactionClass;

use super::{open_db, parse_class};

pub fn add(name: &str, class: &str) -> Result<()> {
    let class: TransactionClass = class.parse()?;
    let conn = open_db()?;
    create_category(&conn, name, class)?;
    println!("Added category: {} ({class})", name.trim());
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let mut stmt = conn.prepare(
        "SELECT category_id, count(*) FROM transactions WHERE category_id IS NOT NULL GROUP BY category_id",
    )?;
    let counts: std::collections::HashMap<i64, i64> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<_, _>>()?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Class", "Name", "Transactions"]);
    for cat in list_categories(&conn)? {
        table.add_row(vec![
            Cell::new(cat.id),
            Cell::new(cat.class),
            Cell::new(&cat.name),
            Cell::new(counts.get(&cat.id).copied().unwrap_or(0)),
        ]);
    }
    println!("Categories\n{table}");
    Ok(())
}

pub fn delete(name: &str, class: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let category = find_category(&conn, name, parse_class(class)?)?;
    let (released, reclassified) = delete_category(&conn, category.id)?;
    println!(
        "Deleted category {} ({}); {reclassified} transactions picked up by other rules, {} unclassified",
        category.name,
        category.class,
        released.saturating_sub(reclassified)
    );
    Ok(())
}

pub fn classes() -> Result<()> {
    let mut table = Table::new();
    table.set_header(vec!["Key", "Class"]);
    for class in TransactionClass::ALL {
        table.add_row(vec![Cell::new(class.key()), Cell::new(class.label())]);
    }
    println!("Classes\n{table}");
    Ok(())
}
