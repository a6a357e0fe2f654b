use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use crate::error::{Result, SimplefiError};
use crate::models::{Account, Category, TransactionClass};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    holder TEXT,
    date_col TEXT NOT NULL DEFAULT 'Date',
    amount_col TEXT NOT NULL DEFAULT 'Amount',
    desc_col TEXT NOT NULL DEFAULT 'Description',
    date_format TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS classes (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    class_id INTEGER NOT NULL,
    UNIQUE (class_id, name),
    FOREIGN KEY (class_id) REFERENCES classes(id)
);

CREATE TABLE IF NOT EXISTS uploads (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    account_id INTEGER NOT NULL,
    upload_time TEXT DEFAULT (datetime('now')),
    record_count INTEGER,
    date_range_start TEXT,
    date_range_end TEXT,
    checksum TEXT,
    FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS rules (
    id INTEGER PRIMARY KEY,
    pattern TEXT NOT NULL UNIQUE,
    match_type TEXT NOT NULL DEFAULT 'regex',
    category_id INTEGER NOT NULL,
    min_amount REAL,
    max_amount REAL,
    priority INTEGER NOT NULL DEFAULT 0,
    hit_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL,
    upload_id INTEGER,
    date TEXT NOT NULL,
    description TEXT NOT NULL,
    amount REAL NOT NULL,
    category_id INTEGER,
    rule_id INTEGER,
    is_manual INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    UNIQUE (account_id, date, amount, description),
    FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE,
    FOREIGN KEY (upload_id) REFERENCES uploads(id) ON DELETE CASCADE,
    FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE SET NULL,
    FOREIGN KEY (rule_id) REFERENCES rules(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);

CREATE TABLE IF NOT EXISTS budgets (
    id INTEGER PRIMARY KEY,
    class_id INTEGER NOT NULL UNIQUE,
    value REAL NOT NULL,
    FOREIGN KEY (class_id) REFERENCES classes(id)
);

CREATE TABLE IF NOT EXISTS credit_lines (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    holder TEXT,
    statement_day INTEGER NOT NULL DEFAULT 1,
    date_opened TEXT,
    annual_fee REAL NOT NULL DEFAULT 0,
    interest_rate REAL NOT NULL DEFAULT 0,
    credit_limit REAL NOT NULL DEFAULT 0,
    min_pay_pct REAL NOT NULL DEFAULT 0,
    min_pay_dlr REAL NOT NULL DEFAULT 0,
    priority INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS statements (
    id INTEGER PRIMARY KEY,
    credit_line_id INTEGER NOT NULL,
    year INTEGER NOT NULL,
    month INTEGER NOT NULL,
    balance REAL NOT NULL,
    UNIQUE (credit_line_id, year, month),
    FOREIGN KEY (credit_line_id) REFERENCES credit_lines(id) ON DELETE CASCADE
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    for class in TransactionClass::ALL {
        conn.execute(
            "INSERT OR IGNORE INTO classes (name) VALUES (?1)",
            [class.key()],
        )?;
    }
    Ok(())
}

/// Open the database at `path`, creating the schema if needed.
pub fn open(path: &Path) -> Result<Connection> {
    if !path.exists() {
        return Err(SimplefiError::Other(format!(
            "Database not found at {}. Run `simplefi init` first.",
            path.display()
        )));
    }
    let conn = get_connection(path)?;
    init_db(&conn)?;
    Ok(conn)
}

pub fn class_id(conn: &Connection, class: TransactionClass) -> Result<i64> {
    conn.query_row("SELECT id FROM classes WHERE name = ?1", [class.key()], |r| r.get(0))
        .optional()?
        .ok_or_else(|| SimplefiError::UnknownClass(class.key().to_string()))
}

pub fn account_by_name(conn: &Connection, name: &str) -> Result<Account> {
    conn.query_row(
        "SELECT id, name, holder, date_col, amount_col, desc_col, date_format \
         FROM accounts WHERE name = ?1",
        [name],
        |row| {
            Ok(Account {
                id: row.get(0)?,
                name: row.get(1)?,
                holder: row.get(2)?,
                date_col: row.get(3)?,
                amount_col: row.get(4)?,
                desc_col: row.get(5)?,
                date_format: row.get(6)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| SimplefiError::UnknownAccount(name.to_string()))
}

pub(crate) fn class_from_sql(key: String) -> rusqlite::Result<TransactionClass> {
    key.parse().map_err(|e: SimplefiError| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Resolve a category by name. Names are only unique within a class, so an
/// ambiguous name must be qualified with `class`.
pub fn find_category(
    conn: &Connection,
    name: &str,
    class: Option<TransactionClass>,
) -> Result<Category> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.name, cl.name FROM categories c JOIN classes cl ON c.class_id = cl.id \
         WHERE lower(c.name) = lower(?1) ORDER BY cl.id",
    )?;
    let found: Vec<Category> = stmt
        .query_map([name.trim()], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                class: class_from_sql(row.get(2)?)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut candidates: Vec<Category> = match class {
        Some(c) => found.into_iter().filter(|cat| cat.class == c).collect(),
        None => found,
    };
    match candidates.len() {
        0 => Err(SimplefiError::UnknownCategory(name.to_string())),
        1 => Ok(candidates.remove(0)),
        _ => Err(SimplefiError::Other(format!(
            "Category '{name}' exists in several classes; pass --class"
        ))),
    }
}

pub fn list_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, holder, date_col, amount_col, desc_col, date_format \
         FROM accounts ORDER BY name",
    )?;
    let accounts = stmt
        .query_map([], |row| {
            Ok(Account {
                id: row.get(0)?,
                name: row.get(1)?,
                holder: row.get(2)?,
                date_col: row.get(3)?,
                amount_col: row.get(4)?,
                desc_col: row.get(5)?,
                date_format: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(accounts)
}

pub fn list_categories(conn: &Connection) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.name, cl.name FROM categories c JOIN classes cl ON c.class_id = cl.id \
         ORDER BY cl.id, c.name",
    )?;
    let categories = stmt
        .query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                class: class_from_sql(row.get(2)?)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(categories)
}

pub fn create_category(conn: &Connection, name: &str, class: TransactionClass) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(SimplefiError::Other("Category name must not be empty".into()));
    }
    let class_id = class_id(conn, class)?;
    let exists = conn
        .prepare("SELECT 1 FROM categories WHERE class_id = ?1 AND lower(name) = lower(?2)")?
        .exists(rusqlite::params![class_id, name])?;
    if exists {
        return Err(SimplefiError::Other(format!(
            "Category '{name}' already exists in {class}"
        )));
    }
    conn.execute(
        "INSERT INTO categories (name, class_id) VALUES (?1, ?2)",
        rusqlite::params![name, class_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Delete a category together with its rules. Its transactions, manual or
/// not, go back to the matcher; those no remaining rule matches end up
/// unclassified. Returns how many were released and how many of those
/// another rule picked up.
pub fn delete_category(conn: &Connection, category_id: i64) -> Result<(usize, usize)> {
    let tx = conn.unchecked_transaction()?;
    let released = tx.execute(
        "UPDATE transactions SET category_id = NULL, rule_id = NULL, is_manual = 0 \
         WHERE category_id = ?1",
        [category_id],
    )?;
    tx.execute("DELETE FROM rules WHERE category_id = ?1", [category_id])?;
    let deleted = tx.execute("DELETE FROM categories WHERE id = ?1", [category_id])?;
    if deleted == 0 {
        return Err(SimplefiError::Other(format!("No category with ID {category_id}")));
    }
    let sync = crate::categorizer::sync_with_rules(&tx)?;
    tx.commit()?;
    Ok((released, sync.classified))
}
