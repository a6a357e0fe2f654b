use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use rusqlite::backup::Backup;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::categorizer::{classify_transactions, Scope};
use crate::error::{Result, SimplefiError};
use crate::importer::{insert_if_new, parse_amount, parse_date};
use crate::models::{ParsedRow, SkippedRow};

const BACKUP_FIELDS: [&str; 6] = ["Account", "Class", "Category", "Date", "Amount", "Description"];
const REQUIRED_FIELDS: [&str; 4] = ["Account", "Date", "Amount", "Description"];

/// One line of the CSV history export. Class and category are informational:
/// a restore re-derives them from the current rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupRecord {
    #[serde(rename = "Account")]
    pub account: String,
    #[serde(rename = "Class", default)]
    pub class: String,
    #[serde(rename = "Category", default)]
    pub category: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Amount")]
    pub amount: String,
    #[serde(rename = "Description")]
    pub description: String,
}

/// Write every transaction as CSV, ordered by account then date.
pub fn export_csv<W: Write>(conn: &Connection, writer: W) -> Result<usize> {
    let mut stmt = conn.prepare(
        "SELECT a.name, cl.name, c.name, t.date, t.amount, t.description \
         FROM transactions t \
         JOIN accounts a ON t.account_id = a.id \
         LEFT JOIN categories c ON t.category_id = c.id \
         LEFT JOIN classes cl ON c.class_id = cl.id \
         ORDER BY a.name, t.date, t.id",
    )?;
    let records = stmt
        .query_map([], |row| {
            let class: Option<String> = row.get(1)?;
            let amount: f64 = row.get(4)?;
            Ok(BackupRecord {
                account: row.get(0)?,
                class: class
                    .and_then(|c| c.parse::<crate::models::TransactionClass>().ok())
                    .map(|c| c.label().to_string())
                    .unwrap_or_default(),
                category: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                date: row.get(3)?,
                amount: format!("{amount:.2}"),
                description: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut wtr = csv::Writer::from_writer(writer);
    if records.is_empty() {
        wtr.write_record(BACKUP_FIELDS)?;
    }
    for record in &records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(records.len())
}

#[derive(Debug, Default)]
pub struct RestoreResult {
    pub accounts_created: usize,
    pub imported: usize,
    pub duplicates: usize,
    pub skipped: Vec<SkippedRow>,
    pub classified: usize,
}

fn account_id_or_create(conn: &Connection, name: &str, created: &mut usize) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM accounts WHERE name = ?1", [name], |r| r.get(0))
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    conn.execute("INSERT INTO accounts (name) VALUES (?1)", [name])?;
    *created += 1;
    Ok(conn.last_insert_rowid())
}

/// Restore transactions from a CSV history export. Missing accounts are
/// created with the default column layout; existing rows are skipped by the
/// usual dedup key. Runs as a single transaction.
pub fn restore_csv<R: Read>(conn: &Connection, reader: R, source_name: &str) -> Result<RestoreResult> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    if REQUIRED_FIELDS.iter().any(|field| !headers.iter().any(|h| h == *field)) {
        return Err(SimplefiError::MissingColumns {
            expected: REQUIRED_FIELDS.iter().map(|f| f.to_string()).collect(),
            found: headers.iter().map(|h| h.to_string()).collect(),
        });
    }
    let mut parsed: Vec<(String, ParsedRow)> = Vec::new();
    let mut result = RestoreResult::default();

    let mut raw = csv::StringRecord::new();
    while rdr.read_record(&mut raw)? {
        let line = raw.position().map_or(0, |p| p.line());
        let record: BackupRecord = match raw.deserialize(Some(&headers)) {
            Ok(r) => r,
            Err(e) => {
                result.skipped.push(SkippedRow { line, reason: e.to_string() });
                continue;
            }
        };
        let date = parse_date(&record.date, None);
        let amount = parse_amount(&record.amount);
        let description = record.description.trim();
        match (date, amount) {
            (Some(date), Some(amount)) if !description.is_empty() && !record.account.trim().is_empty() => {
                parsed.push((
                    record.account.trim().to_string(),
                    ParsedRow {
                        date,
                        description: description.to_string(),
                        amount,
                    },
                ));
            }
            _ => result.skipped.push(SkippedRow {
                line,
                reason: format!(
                    "unusable row: account '{}', date '{}', amount '{}'",
                    record.account, record.date, record.amount
                ),
            }),
        }
    }
    for s in &result.skipped {
        warn!("skipping backup line {}: {}", s.line, s.reason);
    }

    let tx = conn.unchecked_transaction()?;
    let mut accounts: HashMap<String, (i64, i64)> = HashMap::new();
    for (account, row) in &parsed {
        let (account_id, upload_id) = match accounts.get(account) {
            Some(ids) => *ids,
            None => {
                let account_id = account_id_or_create(&tx, account, &mut result.accounts_created)?;
                tx.execute(
                    "INSERT INTO uploads (filename, account_id) VALUES (?1, ?2)",
                    rusqlite::params![source_name, account_id],
                )?;
                let ids = (account_id, tx.last_insert_rowid());
                accounts.insert(account.clone(), ids);
                ids
            }
        };
        if insert_if_new(&tx, account_id, Some(upload_id), row)? {
            result.imported += 1;
        } else {
            result.duplicates += 1;
        }
    }
    for (account_id, upload_id) in accounts.values() {
        tx.execute(
            "UPDATE uploads SET record_count = \
             (SELECT count(*) FROM transactions WHERE upload_id = ?1), \
             date_range_start = (SELECT min(date) FROM transactions WHERE upload_id = ?1), \
             date_range_end = (SELECT max(date) FROM transactions WHERE upload_id = ?1) \
             WHERE id = ?1 AND account_id = ?2",
            [upload_id, account_id],
        )?;
    }

    result.classified = classify_transactions(&tx, Scope::Unclassified)?.classified;
    tx.commit()?;
    info!(
        "restored {} transactions ({} duplicates) from {source_name}",
        result.imported, result.duplicates
    );
    Ok(result)
}

/// Delete every transaction together with the uploads that brought them in,
/// so the same files can be imported again. Accounts, categories, rules,
/// budgets and debt records stay. Returns how many transactions were removed.
pub fn purge_transactions(conn: &Connection) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute("DELETE FROM transactions", [])?;
    tx.execute("DELETE FROM uploads", [])?;
    tx.execute("UPDATE rules SET hit_count = 0", [])?;
    tx.commit()?;
    info!("purged {removed} transactions");
    Ok(removed)
}

/// A CSV history export kept in the exports directory.
#[derive(Debug, Clone)]
pub struct StoredExport {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Local>>,
}

/// CSV files in `dir`, newest name first. A missing directory has none.
pub fn list_exports(dir: &Path) -> Result<Vec<StoredExport>> {
    let mut exports = Vec::new();
    if !dir.exists() {
        return Ok(exports);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) if name.ends_with(".csv") => name.to_string(),
            _ => continue,
        };
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        exports.push(StoredExport {
            name,
            path,
            size: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Local>::from),
        });
    }
    exports.sort_by(|a, b| b.name.cmp(&a.name));
    Ok(exports)
}

/// Look up a stored export by its file name. Only names listed by
/// [`list_exports`] resolve, so a name can never reach outside `dir`.
pub fn find_export(dir: &Path, name: &str) -> Result<StoredExport> {
    list_exports(dir)?
        .into_iter()
        .find(|e| e.name == name)
        .ok_or_else(|| SimplefiError::Other(format!("No stored export named {name}")))
}

pub fn delete_export(dir: &Path, name: &str) -> Result<StoredExport> {
    let export = find_export(dir, name)?;
    std::fs::remove_file(&export.path)?;
    info!("deleted export {}", export.name);
    Ok(export)
}

/// Copy the live database to `dest` with the SQLite online backup API.
pub fn backup_db(conn: &Connection, dest: &Path) -> Result<u64> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut dest_conn = Connection::open(dest)?;
    let backup = Backup::new(conn, &mut dest_conn)?;
    backup.run_to_completion(100, std::time::Duration::from_millis(10), None)?;
    drop(backup);
    drop(dest_conn);
    Ok(std::fs::metadata(dest)?.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::*;
    use crate::db::{get_connection, init_db};
    use crate::models::TransactionClass;

    fn seed(conn: &Connection) {
        let acct = add_account(conn, "Checking");
        let visa = add_account(conn, "Visa");
        let dining = add_category(conn, "Dining", TransactionClass::Discretionary);
        conn.execute("INSERT INTO rules (pattern, category_id) VALUES ('COFFEE', ?1)", [dining]).unwrap();
        add_txn(conn, acct, "2024-01-05", "COFFEE SHOP", -12.5);
        add_txn(conn, acct, "2024-01-02", "PAYCHECK", 1500.0);
        add_txn(conn, visa, "2024-01-03", "BOOKS, USED", -20.0);
        classify_transactions(conn, Scope::Unclassified).unwrap();
    }

    #[test]
    fn test_export_layout() {
        let (_dir, conn) = test_db();
        seed(&conn);
        let mut out = Vec::new();
        let n = export_csv(&conn, &mut out).unwrap();
        assert_eq!(n, 3);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Account,Class,Category,Date,Amount,Description");
        assert_eq!(lines[1], "Checking,,,2024-01-02,1500.00,PAYCHECK");
        assert_eq!(lines[2], "Checking,Discretionary,Dining,2024-01-05,-12.50,COFFEE SHOP");
        assert_eq!(lines[3], "Visa,,,2024-01-03,-20.00,\"BOOKS, USED\"");
    }

    #[test]
    fn test_export_empty_still_has_header() {
        let (_dir, conn) = test_db();
        let mut out = Vec::new();
        assert_eq!(export_csv(&conn, &mut out).unwrap(), 0);
        assert_eq!(String::from_utf8(out).unwrap().trim(), "Account,Class,Category,Date,Amount,Description");
    }

    #[test]
    fn test_export_then_restore_into_empty_db() {
        let (dir, conn) = test_db();
        seed(&conn);
        let mut out = Vec::new();
        export_csv(&conn, &mut out).unwrap();

        let fresh = get_connection(&dir.path().join("fresh.db")).unwrap();
        init_db(&fresh).unwrap();
        let dining = add_category(&fresh, "Dining", TransactionClass::Discretionary);
        fresh.execute("INSERT INTO rules (pattern, category_id) VALUES ('COFFEE', ?1)", [dining]).unwrap();

        let r = restore_csv(&fresh, out.as_slice(), "backup.csv").unwrap();
        assert_eq!(r.accounts_created, 2);
        assert_eq!(r.imported, 3);
        assert_eq!(r.classified, 1);
        assert!(r.skipped.is_empty());

        let mut again = Vec::new();
        export_csv(&fresh, &mut again).unwrap();
        assert_eq!(again, out);
    }

    #[test]
    fn test_restore_skips_existing_and_bad_rows() {
        let (_dir, conn) = test_db();
        seed(&conn);
        let csv = "\
Account,Class,Category,Date,Amount,Description
Checking,Discretionary,Dining,2024-01-05,-12.50,COFFEE SHOP
Checking,,,2024-01-09,-3.00,TEA
Checking,,,someday,-3.00,TEA
";
        let r = restore_csv(&conn, csv.as_bytes(), "b.csv").unwrap();
        assert_eq!(r.accounts_created, 0);
        assert_eq!(r.imported, 1);
        assert_eq!(r.duplicates, 1);
        assert_eq!(r.skipped.len(), 1);
        assert_eq!(r.skipped[0].line, 4);
    }

    #[test]
    fn test_backup_db_copies_data() {
        let (dir, conn) = test_db();
        seed(&conn);
        let dest = dir.path().join("backups").join("copy.db");
        let size = backup_db(&conn, &dest).unwrap();
        assert!(size > 0);
        let copy = Connection::open(&dest).unwrap();
        let n: i64 = copy.query_row("SELECT count(*) FROM transactions", [], |r| r.get(0)).unwrap();
        assert_eq!(n, 3);
    }

    #[test]
    fn test_restore_without_required_headers_fails() {
        let (_dir, conn) = test_db();
        let csv = "Date,Amount,Memo\n2024-01-05,-12.50,COFFEE SHOP\n";
        match restore_csv(&conn, csv.as_bytes(), "bank.csv") {
            Err(SimplefiError::MissingColumns { found, .. }) => {
                assert_eq!(found, vec!["Date", "Amount", "Memo"]);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
        let n: i64 = conn.query_row("SELECT count(*) FROM uploads", [], |r| r.get(0)).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_purge_removes_transactions_and_uploads() {
        let (_dir, conn) = test_db();
        seed(&conn);
        let acct: i64 = conn
            .query_row("SELECT id FROM accounts WHERE name = 'Checking'", [], |r| r.get(0))
            .unwrap();
        conn.execute("INSERT INTO uploads (filename, account_id) VALUES ('a.csv', ?1)", [acct]).unwrap();

        assert_eq!(purge_transactions(&conn).unwrap(), 3);
        for table in ["transactions", "uploads"] {
            let n: i64 = conn
                .query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))
                .unwrap();
            assert_eq!(n, 0, "{table}");
        }
        let (rules, hits): (i64, i64) = conn
            .query_row("SELECT count(*), sum(hit_count) FROM rules", [], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap();
        assert_eq!((rules, hits), (1, 0));
        let accounts: i64 = conn.query_row("SELECT count(*) FROM accounts", [], |r| r.get(0)).unwrap();
        assert_eq!(accounts, 2);
    }

    #[test]
    fn test_stored_exports_list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let exports = dir.path().join("exports");
        assert!(list_exports(&exports).unwrap().is_empty());

        std::fs::create_dir_all(&exports).unwrap();
        std::fs::write(exports.join("simplefi-20240101-000000.csv"), "Account\n").unwrap();
        std::fs::write(exports.join("simplefi-20240201-000000.csv"), "Account\n").unwrap();
        std::fs::write(exports.join("notes.txt"), "x").unwrap();

        let listed = list_exports(&exports).unwrap();
        let names: Vec<&str> = listed.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["simplefi-20240201-000000.csv", "simplefi-20240101-000000.csv"]);
        assert_eq!(listed[0].size, 8);

        assert!(find_export(&exports, "../settings.json").is_err());
        delete_export(&exports, "simplefi-20240101-000000.csv").unwrap();
        assert_eq!(list_exports(&exports).unwrap().len(), 1);
        assert!(delete_export(&exports, "simplefi-20240101-000000.csv").is_err());
    }
}
