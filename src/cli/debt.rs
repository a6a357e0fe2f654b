use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::debt::{add_credit_line, debt_summary, delete_credit_line, load_histories, set_statement};
use crate::error::{Result, SimplefiError};
use crate::fmt::{money, whole};
use crate::importer::parse_date;
use crate::models::CreditLine;

use super::{open_db, parse_month, today};

pub struct NewCreditLine<'a> {
    pub name: &'a str,
    pub holder: Option<&'a str>,
    pub limit: f64,
    pub rate: f64,
    pub min_pay_pct: f64,
    pub min_pay_dlr: f64,
    pub annual_fee: f64,
    pub statement_day: u32,
    pub opened: Option<&'a str>,
    pub priority: i64,
}

pub fn add_line(new: NewCreditLine<'_>) -> Result<()> {
    let date_opened = match new.opened {
        Some(raw) => Some(
            parse_date(raw, Some("%Y-%m-%d")).ok_or_else(|| SimplefiError::InvalidDate(raw.to_string()))?,
        ),
        None => None,
    };
    let line = CreditLine {
        id: 0,
        name: new.name.trim().to_string(),
        holder: new.holder.map(str::to_string),
        statement_day: new.statement_day,
        date_opened,
        annual_fee: new.annual_fee,
        interest_rate: new.rate,
        credit_limit: new.limit,
        min_pay_pct: new.min_pay_pct,
        min_pay_dlr: new.min_pay_dlr,
        priority: new.priority,
    };
    let conn = open_db()?;
    add_credit_line(&conn, &line)?;
    println!("Added credit line: {} (limit {})", line.name, money(line.credit_limit));
    Ok(())
}

pub fn list_lines() -> Result<()> {
    let conn = open_db()?;
    let histories = load_histories(&conn)?;

    let mut table = Table::new();
    table.set_header(vec![
        "Name", "Holder", "Opened", "Stmt Day", "Limit", "Rate %", "Min %", "Min $", "Annual Fee", "Balance",
        "Available", "Latest", "Priority",
    ]);
    for h in &histories {
        let latest = h
            .latest()
            .map(|(y, m)| format!("{y}-{m:02}"))
            .unwrap_or_else(|| "(none)".to_string());
        table.add_row(vec![
            Cell::new(&h.line.name),
            Cell::new(h.line.holder.as_deref().unwrap_or("")),
            Cell::new(h.line.date_opened.as_deref().unwrap_or("")),
            Cell::new(h.line.statement_day),
            Cell::new(money(h.line.credit_limit)),
            Cell::new(format!("{:.2}", h.line.interest_rate)),
            Cell::new(format!("{:.2}", h.line.min_pay_pct)),
            Cell::new(money(h.line.min_pay_dlr)),
            Cell::new(money(h.line.annual_fee)),
            Cell::new(money(h.balance())),
            Cell::new(money(h.available_credit())),
            Cell::new(latest),
            Cell::new(h.line.priority),
        ]);
    }
    println!("Credit Lines\n{table}");
    Ok(())
}

pub fn delete_line(name: &str) -> Result<()> {
    let conn = open_db()?;
    delete_credit_line(&conn, name)?;
    println!("Deleted credit line {name}");
    Ok(())
}

pub fn statement(line: &str, month: &str, balance: f64) -> Result<()> {
    let (year, month) = parse_month(month)?;
    let conn = open_db()?;
    let stmt = set_statement(&conn, line, year, month, balance)?;
    println!(
        "{line} {}-{:02}: {}",
        stmt.year,
        stmt.month,
        money(stmt.balance)
    );
    Ok(())
}

pub fn summary(forecast: bool) -> Result<()> {
    let conn = open_db()?;
    let summary = debt_summary(&conn, today(), forecast)?;

    for warning in &summary.warnings {
        eprintln!("{} {warning}", "Warning:".yellow().bold());
    }
    if summary.rows.is_empty() {
        return Ok(());
    }

    let mut header = vec!["Month".to_string()];
    header.extend(summary.names.iter().cloned());
    header.push("Total".to_string());

    let mut table = Table::new();
    table.set_header(header);
    for row in &summary.rows {
        let mut cells = vec![Cell::new(&row.label)];
        cells.extend(row.balances.iter().map(|b| Cell::new(whole(*b))));
        cells.push(Cell::new(whole(row.total).bold()));
        table.add_row(cells);
    }
    let title = if forecast { "Debt Forecast" } else { "Debt Summary" };
    println!("{title}\n{table}");
    Ok(())
}
