use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::db::{account_by_name, find_category};
use crate::error::Result;
use crate::fmt::{money, trunc_desc};
use crate::reports::UNCLASSIFIED;
use crate::reviewer::{clear_category, list_transactions, set_category, TransactionView, TxnFilter};

use super::{bound_opt, open_db, parse_class};

fn amount_cell(amount: f64) -> Cell {
    if amount < 0.0 {
        Cell::new(money(amount).red())
    } else {
        Cell::new(money(amount).green())
    }
}

fn print_transactions(title: &str, rows: &[TransactionView]) {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Account", "Description", "Amount", "Category", "Source"]);
    for t in rows {
        let category = match (&t.category, t.class) {
            (Some(name), Some(class)) => format!("{name} ({class})"),
            _ => UNCLASSIFIED.to_string(),
        };
        let source = if t.is_manual {
            "manual".to_string()
        } else {
            t.pattern.clone().unwrap_or_default()
        };
        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(&t.date),
            Cell::new(&t.account_name),
            Cell::new(trunc_desc(&t.description)),
            amount_cell(t.amount),
            Cell::new(category),
            Cell::new(source),
        ]);
    }
    println!("{title}\n{table}");
}

pub fn list(
    account: Option<&str>,
    category: Option<&str>,
    class: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
    limit: usize,
) -> Result<()> {
    let conn = open_db()?;
    if let Some(name) = account {
        account_by_name(&conn, name)?;
    }
    let class = parse_class(class)?;
    let category_id = match category {
        Some(name) => Some(find_category(&conn, name, class)?.id),
        None => None,
    };
    let filter = TxnFilter {
        account: account.map(str::to_string),
        category_id,
        class,
        from: bound_opt(from, false)?,
        to: bound_opt(to, true)?,
        limit: Some(limit),
        ..Default::default()
    };
    let rows = list_transactions(&conn, &filter)?;
    print_transactions(&format!("Transactions ({})", rows.len()), &rows);
    Ok(())
}

pub fn unclassified(from: Option<&str>, to: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let filter = TxnFilter {
        unclassified_only: true,
        from: bound_opt(from, false)?,
        to: bound_opt(to, true)?,
        ..Default::default()
    };
    let rows = list_transactions(&conn, &filter)?;
    if rows.is_empty() {
        println!("No unclassified transactions.");
        return Ok(());
    }
    let total: f64 = rows.iter().map(|t| t.amount).sum();
    print_transactions(&format!("{} ({})", UNCLASSIFIED, rows.len()), &rows);
    println!("Total: {}", money(total));
    Ok(())
}

pub fn set(id: i64, category: &str, class: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let category = find_category(&conn, category, parse_class(class)?)?;
    set_category(&conn, id, category.id)?;
    println!("Transaction {id} \u{2192} {} ({})", category.name, category.class);
    Ok(())
}

pub fn clear(id: i64) -> Result<()> {
    let conn = open_db()?;
    clear_category(&conn, id)?;
    println!("Cleared category of transaction {id}");
    Ok(())
}
