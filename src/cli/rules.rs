use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::categorizer::{create_rule, delete_rule, list_rules, sync_with_rules};
use crate::db::find_category;
use crate::error::Result;
use crate::fmt::money;
use crate::models::{MatchType, Rule};

use super::{open_db, parse_class};

pub fn add(
    pattern: &str,
    category: &str,
    class: Option<&str>,
    match_type: &str,
    priority: i64,
    min_amount: Option<f64>,
    max_amount: Option<f64>,
) -> Result<()> {
    let match_type: MatchType = match_type.parse()?;
    let conn = open_db()?;
    let category = find_category(&conn, category, parse_class(class)?)?;

    let rule = Rule {
        id: 0,
        pattern: pattern.to_string(),
        match_type,
        category_id: category.id,
        min_amount,
        max_amount,
        priority,
        hit_count: 0,
    };
    let tx = conn.unchecked_transaction()?;
    create_rule(&tx, &rule)?;
    let result = sync_with_rules(&tx)?;
    tx.commit()?;

    println!("Added rule: '{pattern}' \u{2192} {} ({})", category.name, category.class);
    if result.classified > 0 {
        println!("{} transactions classified", result.classified.to_string().green());
    }
    if result.moved > 0 {
        println!("{} transactions moved from lower-priority rules", result.moved.to_string().yellow());
    }
    Ok(())
}

fn bound(value: Option<f64>) -> String {
    value.map(money).unwrap_or_default()
}

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let rules = list_rules(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Pattern", "Type", "Category", "Class", "Min", "Max", "Priority", "Hits"]);
    for view in rules {
        table.add_row(vec![
            Cell::new(view.rule.id),
            Cell::new(&view.rule.pattern),
            Cell::new(view.rule.match_type.key()),
            Cell::new(&view.category),
            Cell::new(view.class),
            Cell::new(bound(view.rule.min_amount)),
            Cell::new(bound(view.rule.max_amount)),
            Cell::new(view.rule.priority),
            Cell::new(view.rule.hit_count),
        ]);
    }
    println!("Rules\n{table}");
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let conn = open_db()?;
    let deleted = delete_rule(&conn, id)?;
    println!("Deleted rule {id}: '{}'", deleted.pattern);
    if deleted.reclassified > 0 {
        println!("{} transactions picked up by other rules", deleted.reclassified.to_string().green());
    }
    let unclassified = deleted.released.saturating_sub(deleted.reclassified);
    if unclassified > 0 {
        println!("{} transactions are unclassified again", unclassified.to_string().red());
    }
    Ok(())
}
