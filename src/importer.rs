use std::path::Path;

use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::categorizer::{classify_transactions, Scope};
use crate::db::account_by_name;
use crate::error::{Result, SimplefiError};
use crate::models::{Account, ParsedRow, SkippedRow};

// ---------------------------------------------------------------------------
// Field parsing
// ---------------------------------------------------------------------------

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%Y/%m/%d"];

/// Parse a bank amount: `1,234.56`, `$50.00`, `-$50.00`, `(500.00)`.
/// The result is rounded to cents so identical statements compare equal.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.replace([',', '"', '$'], "");
    let s = s.trim();
    let value = if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        -inner.trim().parse::<f64>().ok()?
    } else {
        s.strip_prefix('+').unwrap_or(s).parse::<f64>().ok()?
    };
    if !value.is_finite() {
        return None;
    }
    Some((value * 100.0).round() / 100.0)
}

/// Parse a date into ISO `YYYY-MM-DD`. With an explicit chrono `format` only
/// that layout is accepted; otherwise the common bank layouts are tried and
/// any trailing time component is ignored.
pub fn parse_date(raw: &str, format: Option<&str>) -> Option<String> {
    let raw = raw.trim();
    if let Some(fmt) = format {
        return NaiveDate::parse_from_str(raw, fmt)
            .ok()
            .map(|d| d.format("%Y-%m-%d").to_string());
    }
    let day = raw.split(['T', ' ']).next()?;
    DATE_FORMATS
        .iter()
        .filter_map(|fmt| NaiveDate::parse_from_str(day, fmt).ok())
        .find(|d| d.year() >= 1000)
        .map(|d| d.format("%Y-%m-%d").to_string())
}

fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// CSV parsing
// ---------------------------------------------------------------------------

/// Column layout of a bank export.
#[derive(Debug, Clone)]
pub struct CsvLayout {
    pub date_col: String,
    pub amount_col: String,
    pub desc_col: String,
    pub date_format: Option<String>,
}

impl From<&Account> for CsvLayout {
    fn from(account: &Account) -> Self {
        Self {
            date_col: account.date_col.clone(),
            amount_col: account.amount_col.clone(),
            desc_col: account.desc_col.clone(),
            date_format: account.date_format.clone(),
        }
    }
}

impl CsvLayout {
    fn columns(&self) -> [&str; 3] {
        [&self.date_col, &self.amount_col, &self.desc_col]
    }

    /// Column indexes of (date, amount, description) if `record` is the header.
    fn locate(&self, record: &csv::StringRecord) -> Option<[usize; 3]> {
        let find = |name: &str| {
            record
                .iter()
                .position(|f| f.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(name.trim()))
        };
        Some([find(&self.date_col)?, find(&self.amount_col)?, find(&self.desc_col)?])
    }
}

#[derive(Debug, Default)]
pub struct ParseOutcome {
    /// Accepted rows with their line numbers.
    pub rows: Vec<(u64, ParsedRow)>,
    pub skipped: Vec<SkippedRow>,
}

fn parse_record(
    record: &csv::StringRecord,
    idx: [usize; 3],
    date_format: Option<&str>,
) -> std::result::Result<ParsedRow, String> {
    let field = |i: usize, name: &str| {
        record
            .get(i)
            .map(str::trim)
            .ok_or_else(|| format!("missing {name} field"))
    };
    let raw_date = field(idx[0], "date")?;
    let raw_amount = field(idx[1], "amount")?;
    let description = field(idx[2], "description")?;

    let date = parse_date(raw_date, date_format).ok_or_else(|| format!("invalid date '{raw_date}'"))?;
    let amount = parse_amount(raw_amount).ok_or_else(|| format!("invalid amount '{raw_amount}'"))?;
    if description.is_empty() {
        return Err("empty description".to_string());
    }
    Ok(ParsedRow {
        date,
        description: description.to_string(),
        amount,
    })
}

/// Parse a CSV export. Lines before the header row are ignored; rows that
/// cannot be read are collected in `skipped` instead of failing the parse.
pub fn parse_csv<R: std::io::Read>(reader: R, layout: &CsvLayout) -> Result<ParseOutcome> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut outcome = ParseOutcome::default();
    let mut header: Option<[usize; 3]> = None;
    let mut first_record: Option<Vec<String>> = None;

    for result in rdr.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                let line = e.position().map_or(0, |p| p.line());
                if header.is_some() {
                    outcome.skipped.push(SkippedRow { line, reason: e.to_string() });
                }
                continue;
            }
        };
        let line = record.position().map_or(0, |p| p.line());
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        let Some(idx) = header else {
            if first_record.is_none() {
                first_record = Some(record.iter().map(|f| f.trim().to_string()).collect());
            }
            header = layout.locate(&record);
            continue;
        };

        match parse_record(&record, idx, layout.date_format.as_deref()) {
            Ok(row) => outcome.rows.push((line, row)),
            Err(reason) => outcome.skipped.push(SkippedRow { line, reason }),
        }
    }

    if header.is_none() {
        return Err(SimplefiError::MissingColumns {
            expected: layout.columns().iter().map(|c| c.to_string()).collect(),
            found: first_record.unwrap_or_default(),
        });
    }
    debug!(
        "parsed {} rows, {} malformed",
        outcome.rows.len(),
        outcome.skipped.len()
    );
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Dedup + insert
// ---------------------------------------------------------------------------

/// Insert `row` unless the dedup key (account, date, amount, description)
/// already exists. Returns whether a row was inserted.
pub fn insert_if_new(
    conn: &Connection,
    account_id: i64,
    upload_id: Option<i64>,
    row: &ParsedRow,
) -> Result<bool> {
    let exists = conn
        .prepare_cached(
            "SELECT 1 FROM transactions WHERE account_id = ?1 AND date = ?2 AND amount = ?3 AND description = ?4",
        )?
        .exists(rusqlite::params![account_id, row.date, row.amount, row.description])?;
    if exists {
        return Ok(false);
    }
    conn.prepare_cached(
        "INSERT INTO transactions (account_id, upload_id, date, description, amount) VALUES (?1, ?2, ?3, ?4, ?5)",
    )?
    .execute(rusqlite::params![account_id, upload_id, row.date, row.description, row.amount])?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// import_file
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ImportResult {
    pub upload_id: Option<i64>,
    pub imported: usize,
    pub duplicates: usize,
    pub skipped: Vec<SkippedRow>,
    pub classified: usize,
    pub unclassified: usize,
    pub duplicate_file: bool,
}

/// Import a bank CSV into `account_name` and classify the new rows.
///
/// The whole upload runs in one SQLite transaction: if anything fails after
/// parsing, no transaction, upload record or classification is kept.
pub fn import_file(conn: &Connection, file_path: &Path, account_name: &str) -> Result<ImportResult> {
    let account = account_by_name(conn, account_name)?;
    let data = std::fs::read(file_path)?;
    let checksum = compute_checksum(&data);

    let already: bool = conn
        .prepare("SELECT 1 FROM uploads WHERE checksum = ?1 AND account_id = ?2")?
        .exists(rusqlite::params![checksum, account.id])?;
    if already {
        info!("{} was already imported into {}", file_path.display(), account.name);
        return Ok(ImportResult {
            duplicate_file: true,
            ..Default::default()
        });
    }

    let parsed = parse_csv(data.as_slice(), &CsvLayout::from(&account))?;
    for s in &parsed.skipped {
        warn!("skipping line {}: {}", s.line, s.reason);
    }

    let filename = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO uploads (filename, account_id, checksum) VALUES (?1, ?2, ?3)",
        rusqlite::params![filename, account.id, checksum],
    )?;
    let upload_id = tx.last_insert_rowid();

    let mut result = ImportResult {
        upload_id: Some(upload_id),
        skipped: parsed.skipped,
        ..Default::default()
    };
    let mut dates: Vec<&str> = Vec::new();
    for (_, row) in &parsed.rows {
        if insert_if_new(&tx, account.id, Some(upload_id), row)? {
            result.imported += 1;
            dates.push(&row.date);
        } else {
            result.duplicates += 1;
        }
    }

    tx.execute(
        "UPDATE uploads SET record_count = ?1, date_range_start = ?2, date_range_end = ?3 WHERE id = ?4",
        rusqlite::params![
            result.imported as i64,
            dates.iter().min().copied(),
            dates.iter().max().copied(),
            upload_id,
        ],
    )?;

    let classified = classify_transactions(&tx, Scope::Upload(upload_id))?;
    result.classified = classified.classified;
    result.unclassified = classified.unclassified;
    tx.commit()?;

    info!(
        "imported {} rows into {} ({} duplicates, {} malformed)",
        result.imported,
        account.name,
        result.duplicates,
        result.skipped.len()
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Upload history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct UploadInfo {
    pub id: i64,
    pub filename: String,
    pub account_name: String,
    pub upload_time: String,
    pub record_count: i64,
    pub date_range_start: Option<String>,
    pub date_range_end: Option<String>,
}

pub fn list_uploads(conn: &Connection) -> Result<Vec<UploadInfo>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.filename, a.name, u.upload_time, COALESCE(u.record_count, 0), \
         u.date_range_start, u.date_range_end \
         FROM uploads u JOIN accounts a ON u.account_id = a.id \
         ORDER BY u.upload_time DESC, u.id DESC",
    )?;
    let uploads = stmt
        .query_map([], |row| {
            Ok(UploadInfo {
                id: row.get(0)?,
                filename: row.get(1)?,
                account_name: row.get(2)?,
                upload_time: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                record_count: row.get(4)?,
                date_range_start: row.get(5)?,
                date_range_end: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(uploads)
}

/// Delete an upload and every transaction it brought in. Returns the number
/// of transactions removed.
pub fn delete_upload(conn: &Connection, upload_id: i64) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute("DELETE FROM transactions WHERE upload_id = ?1", [upload_id])?;
    if tx.execute("DELETE FROM uploads WHERE id = ?1", [upload_id])? == 0 {
        return Err(SimplefiError::Other(format!("No upload with ID {upload_id}")));
    }
    tx.commit()?;
    info!("deleted upload {upload_id} with {removed} transactions");
    Ok(removed)
}
