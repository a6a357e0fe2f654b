use rusqlite::types::ToSql;
use rusqlite::Connection;

use crate::db::class_from_sql;
use crate::error::{Result, SimplefiError};
use crate::models::TransactionClass;

#[derive(Debug, Clone)]
pub struct TransactionView {
    pub id: i64,
    pub date: String,
    pub description: String,
    pub amount: f64,
    pub account_name: String,
    pub category: Option<String>,
    pub class: Option<TransactionClass>,
    pub pattern: Option<String>,
    pub is_manual: bool,
}

#[derive(Debug, Default, Clone)]
pub struct TxnFilter {
    pub account: Option<String>,
    pub category_id: Option<i64>,
    pub class: Option<TransactionClass>,
    pub unclassified_only: bool,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<usize>,
}

pub fn list_transactions(conn: &Connection, filter: &TxnFilter) -> Result<Vec<TransactionView>> {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(account) = &filter.account {
        params.push(Box::new(account.clone()));
        clauses.push(format!("a.name = ?{}", params.len()));
    }
    if let Some(category_id) = filter.category_id {
        params.push(Box::new(category_id));
        clauses.push(format!("t.category_id = ?{}", params.len()));
    }
    if let Some(class) = filter.class {
        params.push(Box::new(class.key()));
        clauses.push(format!("cl.name = ?{}", params.len()));
    }
    if filter.unclassified_only {
        clauses.push("t.category_id IS NULL".to_string());
    }
    if let Some(from) = &filter.from {
        params.push(Box::new(from.clone()));
        clauses.push(format!("t.date >= ?{}", params.len()));
    }
    if let Some(to) = &filter.to {
        params.push(Box::new(to.clone()));
        clauses.push(format!("t.date <= ?{}", params.len()));
    }
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let limit_sql = filter.limit.map(|n| format!("LIMIT {n}")).unwrap_or_default();

    let sql = format!(
        "SELECT t.id, t.date, t.description, t.amount, a.name, c.name, cl.name, r.pattern, t.is_manual \
         FROM transactions t \
         JOIN accounts a ON t.account_id = a.id \
         LEFT JOIN categories c ON t.category_id = c.id \
         LEFT JOIN classes cl ON c.class_id = cl.id \
         LEFT JOIN rules r ON t.rule_id = r.id \
         {where_sql} ORDER BY t.date DESC, t.id DESC {limit_sql}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            let class: Option<String> = row.get(6)?;
            Ok(TransactionView {
                id: row.get(0)?,
                date: row.get(1)?,
                description: row.get(2)?,
                amount: row.get(3)?,
                account_name: row.get(4)?,
                category: row.get(5)?,
                class: class.map(class_from_sql).transpose()?,
                pattern: row.get(7)?,
                is_manual: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn ensure_transaction(conn: &Connection, transaction_id: i64) -> Result<()> {
    let exists = conn
        .prepare("SELECT 1 FROM transactions WHERE id = ?1")?
        .exists([transaction_id])?;
    if exists {
        Ok(())
    } else {
        Err(SimplefiError::Other(format!("No transaction with ID {transaction_id}")))
    }
}

/// Manually categorize a transaction. The matcher will not touch it again
/// until the override is cleared.
pub fn set_category(conn: &Connection, transaction_id: i64, category_id: i64) -> Result<()> {
    ensure_transaction(conn, transaction_id)?;
    conn.execute(
        "UPDATE transactions SET category_id = ?1, rule_id = NULL, is_manual = 1 WHERE id = ?2",
        [category_id, transaction_id],
    )?;
    Ok(())
}

/// Remove any category from a transaction and hand it back to the matcher.
pub fn clear_category(conn: &Connection, transaction_id: i64) -> Result<()> {
    ensure_transaction(conn, transaction_id)?;
    conn.execute(
        "UPDATE transactions SET category_id = NULL, rule_id = NULL, is_manual = 0 WHERE id = ?1",
        [transaction_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorizer::{classify_transactions, Scope};
    use crate::db::test_support::*;

    #[test]
    fn test_list_filters() {
        let (_dir, conn) = test_db();
        let checking = add_account(&conn, "Checking");
        let visa = add_account(&conn, "Visa");
        let dining = add_category(&conn, "Dining", TransactionClass::Discretionary);
        let t1 = add_txn(&conn, checking, "2024-01-05", "COFFEE SHOP", -12.5);
        add_txn(&conn, checking, "2024-02-05", "RENT", -900.0);
        add_txn(&conn, visa, "2024-01-09", "BOOKS", -20.0);
        set_category(&conn, t1, dining).unwrap();

        let all = list_transactions(&conn, &TxnFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].description, "RENT");

        let by_account = list_transactions(
            &conn,
            &TxnFilter { account: Some("Visa".into()), ..Default::default() },
        )
        .unwrap();
        assert_eq!(by_account.len(), 1);

        let unclassified = list_transactions(
            &conn,
            &TxnFilter { unclassified_only: true, from: Some("2024-01-01".into()), to: Some("2024-01-31".into()), ..Default::default() },
        )
        .unwrap();
        assert_eq!(unclassified.len(), 1);
        assert_eq!(unclassified[0].description, "BOOKS");

        let dined = list_transactions(
            &conn,
            &TxnFilter { category_id: Some(dining), ..Default::default() },
        )
        .unwrap();
        assert_eq!(dined.len(), 1);
        assert_eq!(dined[0].class, Some(TransactionClass::Discretionary));
        assert!(dined[0].is_manual);

        let bills = list_transactions(
            &conn,
            &TxnFilter { class: Some(TransactionClass::Bills), ..Default::default() },
        )
        .unwrap();
        assert!(bills.is_empty());
        let discretionary = list_transactions(
            &conn,
            &TxnFilter { class: Some(TransactionClass::Discretionary), ..Default::default() },
        )
        .unwrap();
        assert_eq!(discretionary.len(), 1);
        assert_eq!(discretionary[0].description, "COFFEE SHOP");
    }

    #[test]
    fn test_clear_category_returns_to_matcher() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Checking");
        let dining = add_category(&conn, "Dining", TransactionClass::Discretionary);
        let gifts = add_category(&conn, "Gifts", TransactionClass::Discretionary);
        conn.execute("INSERT INTO rules (pattern, category_id) VALUES ('COFFEE', ?1)", [dining]).unwrap();
        let t = add_txn(&conn, acct, "2024-01-05", "COFFEE SHOP", -12.5);

        set_category(&conn, t, gifts).unwrap();
        assert_eq!(classify_transactions(&conn, Scope::Unclassified).unwrap().classified, 0);

        clear_category(&conn, t).unwrap();
        assert_eq!(classify_transactions(&conn, Scope::Unclassified).unwrap().classified, 1);
        let view = &list_transactions(&conn, &TxnFilter::default()).unwrap()[0];
        assert_eq!(view.category.as_deref(), Some("Dining"));
        assert_eq!(view.pattern.as_deref(), Some("COFFEE"));
        assert!(!view.is_manual);
    }

    #[test]
    fn test_unknown_transaction() {
        let (_dir, conn) = test_db();
        assert!(set_category(&conn, 42, 1).is_err());
        assert!(clear_category(&conn, 42).is_err());
    }
}
