use comfy_table::{Cell, Table};

use crate::db::{account_by_name, list_accounts};
use crate::error::{Result, SimplefiError};

use super::open_db;

pub fn add(
    name: &str,
    holder: Option<&str>,
    date_col: &str,
    amount_col: &str,
    desc_col: &str,
    date_format: Option<&str>,
) -> Result<()> {
    let conn = open_db()?;
    let name = name.trim();
    if name.is_empty() {
        return Err(SimplefiError::Other("Account name must not be empty".into()));
    }
    if account_by_name(&conn, name).is_ok() {
        return Err(SimplefiError::Other(format!("Account '{name}' already exists")));
    }
    conn.execute(
        "INSERT INTO accounts (name, holder, date_col, amount_col, desc_col, date_format) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![name, holder, date_col, amount_col, desc_col, date_format],
    )?;
    println!("Added account: {name}");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_db()?;
    let accounts = list_accounts(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Holder", "Date Col", "Amount Col", "Description Col", "Date Format"]);
    for acct in accounts {
        table.add_row(vec![
            Cell::new(acct.id),
            Cell::new(acct.name),
            Cell::new(acct.holder.unwrap_or_default()),
            Cell::new(acct.date_col),
            Cell::new(acct.amount_col),
            Cell::new(acct.desc_col),
            Cell::new(acct.date_format.unwrap_or_else(|| "(auto)".into())),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}

pub fn delete(name: &str) -> Result<()> {
    let conn = open_db()?;
    let account = account_by_name(&conn, name)?;
    let txns: i64 = conn.query_row(
        "SELECT count(*) FROM transactions WHERE account_id = ?1",
        [account.id],
        |r| r.get(0),
    )?;
    conn.execute("DELETE FROM accounts WHERE id = ?1", [account.id])?;
    println!("Deleted account {} ({txns} transactions)", account.name);
    Ok(())
}
