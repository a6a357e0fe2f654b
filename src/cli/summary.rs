use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::fmt::money;
use crate::models::TransactionClass;
use crate::reports::{clear_budget, get_budget_report, get_summary, set_budget, Bucket, Grouping};
use crate::settings::load_settings;

use super::{open_db, parse_class, resolve_range};

fn amount_cell(value: f64) -> Cell {
    if value == 0.0 {
        Cell::new("")
    } else {
        Cell::new(money(value))
    }
}

pub fn run(
    class: Option<&str>,
    by_class: bool,
    from: Option<&str>,
    to: Option<&str>,
    months: Option<u32>,
) -> Result<()> {
    let months = months.unwrap_or_else(|| load_settings().summary_months);
    let range = resolve_range(from, to, months)?;
    let grouping = match parse_class(class)? {
        Some(c) => Grouping::WithinClass(c),
        None if by_class => Grouping::ByClass,
        None => Grouping::ByCategory,
    };

    let conn = open_db()?;
    let summary = get_summary(&conn, range, grouping)?;

    let mut header = vec![match grouping {
        Grouping::ByClass => "Class".to_string(),
        _ => "Category".to_string(),
    }];
    header.extend(summary.months.iter().cloned());
    header.push("Total".to_string());
    header.push("Txns".to_string());

    let mut table = Table::new();
    table.set_header(header);
    for row in &summary.rows {
        let label = match &row.bucket {
            Bucket::Category { class, name, .. } if grouping == Grouping::ByCategory => {
                format!("{name} ({class})")
            }
            Bucket::Unclassified => row.bucket.label().yellow().to_string(),
            other => other.label(),
        };
        let mut cells = vec![Cell::new(label)];
        cells.extend(row.amounts.iter().map(|v| amount_cell(*v)));
        cells.push(Cell::new(money(row.total).bold()));
        cells.push(Cell::new(row.count));
        table.add_row(cells);
    }
    let mut totals = vec![Cell::new("Total".bold())];
    totals.extend(summary.month_totals.iter().map(|v| Cell::new(money(*v))));
    let grand = if summary.total < 0.0 {
        money(summary.total).red().bold()
    } else {
        money(summary.total).green().bold()
    };
    totals.push(Cell::new(grand));
    totals.push(Cell::new(summary.rows.iter().map(|r| r.count).sum::<i64>()));
    table.add_row(totals);

    let title = match grouping {
        Grouping::WithinClass(c) => format!("Summary: {c}"),
        _ => "Summary".to_string(),
    };
    println!("{title} {} to {}\n{table}", summary.range.from, summary.range.to);
    if let Some(row) = summary.unclassified() {
        println!("{} unclassified transactions; see `simplefi unclassified`", row.count);
    }
    Ok(())
}

pub fn budget_list(from: Option<&str>, to: Option<&str>) -> Result<()> {
    let range = resolve_range(from, to, load_settings().summary_months)?;
    let conn = open_db()?;
    let lines = get_budget_report(&conn, range)?;

    let mut table = Table::new();
    table.set_header(vec!["Class", "Budget", "Monthly Average", "Difference"]);
    for line in lines {
        let (budget, diff) = match line.budget {
            Some(b) => {
                let diff = line.monthly_average - b;
                let shown = if diff < 0.0 {
                    money(diff).red().to_string()
                } else {
                    money(diff).green().to_string()
                };
                (money(b), shown)
            }
            None => (String::new(), String::new()),
        };
        table.add_row(vec![
            Cell::new(line.class),
            Cell::new(budget),
            Cell::new(money(line.monthly_average)),
            Cell::new(diff),
        ]);
    }
    println!("Budget {} to {}\n{table}", range.from, range.to);
    Ok(())
}

pub fn budget_set(class: &str, value: f64) -> Result<()> {
    let class: TransactionClass = class.parse()?;
    let conn = open_db()?;
    set_budget(&conn, class, value)?;
    println!("Budget for {class}: {}", money(value));
    Ok(())
}

pub fn budget_clear(class: &str) -> Result<()> {
    let class: TransactionClass = class.parse()?;
    let conn = open_db()?;
    if clear_budget(&conn, class)? {
        println!("Removed budget for {class}");
    } else {
        println!("No budget set for {class}");
    }
    Ok(())
}
