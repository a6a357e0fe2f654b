//! Credit lines, their monthly statements and the month-by-month payoff table.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::db::class_id;
use crate::error::{Result, SimplefiError};
use crate::models::{CreditLine, Statement, TransactionClass};

/// Upper bound on forecast rows (ten years).
pub const MAX_ROWS: usize = 120;

impl CreditLine {
    /// Minimum payment due on `balance`: the larger of the fixed and the
    /// percentage minimum, never more than the balance itself.
    pub fn min_pay(&self, balance: f64) -> f64 {
        self.min_pay_dlr
            .max(self.min_pay_pct / 100.0 * balance)
            .min(balance)
    }

    /// Next month's balance when only the minimum is paid.
    pub fn forecast_next(&self, balance: f64) -> f64 {
        (balance * (1.0 + self.interest_rate / 100.0 / 12.0) - self.min_pay(balance)).max(0.0)
    }
}

type YearMonth = (i32, u32);

fn next_month((year, month): YearMonth) -> YearMonth {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn month_label((year, month): YearMonth) -> String {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.format("%b %Y").to_string())
        .unwrap_or_else(|| format!("{year}-{month:02}"))
}

/// A credit line with its statements keyed by (year, month).
#[derive(Debug, Clone)]
pub struct CreditLineHistory {
    pub line: CreditLine,
    pub statements: BTreeMap<YearMonth, f64>,
}

impl CreditLineHistory {
    /// Balance on the latest statement, or the full limit when there is none.
    pub fn balance(&self) -> f64 {
        self.statements
            .values()
            .next_back()
            .copied()
            .unwrap_or(self.line.credit_limit)
    }

    pub fn available_credit(&self) -> f64 {
        self.line.credit_limit - self.balance()
    }

    pub fn earliest(&self) -> Option<YearMonth> {
        self.statements.keys().next().copied()
    }

    pub fn latest(&self) -> Option<YearMonth> {
        self.statements.keys().next_back().copied()
    }

    /// Balance for an arbitrary month plus the minimum payment when the value
    /// was forecast:
    ///
    /// 1. a statement exists for the month: its balance;
    /// 2. no statement, but later ones exist: the latest balance;
    /// 3. after the latest statement: forecast from `prev_balance`.
    pub fn calc_balance(&self, ym: YearMonth, prev_balance: f64) -> (f64, Option<f64>) {
        match self.latest() {
            Some(latest) if ym <= latest => (
                self.statements.get(&ym).copied().unwrap_or_else(|| self.balance()),
                None,
            ),
            _ => (
                self.line.forecast_next(prev_balance),
                Some(self.line.min_pay(prev_balance)),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DebtRow {
    pub label: String,
    pub year: i32,
    pub month: u32,
    /// One balance per entry of `DebtSummary::names`.
    pub balances: Vec<f64>,
    pub total: f64,
}

#[derive(Debug, Clone, Default)]
pub struct DebtSummary {
    pub names: Vec<String>,
    pub rows: Vec<DebtRow>,
    pub warnings: Vec<String>,
}

/// Build the payoff table.
///
/// `histories` must already be in payment priority order. Without
/// `forecast` the table ends with the month of `today`; with it, rows continue
/// until every balance reaches zero or `MAX_ROWS` is hit, and once past
/// `today` the debt budget left after minimum payments goes to the lines in
/// priority order.
pub fn build_summary(
    histories: &[CreditLineHistory],
    debt_budget: Option<f64>,
    today: NaiveDate,
    forecast: bool,
) -> DebtSummary {
    let histories: Vec<&CreditLineHistory> = histories
        .iter()
        .filter(|h| h.line.credit_limit > 0.0 && !h.statements.is_empty())
        .collect();

    let mut summary = DebtSummary {
        names: histories.iter().map(|h| h.line.name.clone()).collect(),
        ..Default::default()
    };
    let debt_budget = match debt_budget {
        Some(b) => b.abs(),
        None => {
            summary.warnings.push("No debt budget specified".to_string());
            0.0
        }
    };
    let Some(start) = histories.iter().filter_map(|h| h.earliest()).min() else {
        summary
            .warnings
            .push("No statement data for debt summary table".to_string());
        return summary;
    };

    let now: YearMonth = (today.year(), today.month());
    let mut cursor = start;
    loop {
        let done = if forecast {
            summary
                .rows
                .last()
                .map_or(false, |r| r.total == 0.0 || summary.rows.len() >= MAX_ROWS)
        } else {
            cursor > now
        };
        if done {
            break;
        }

        let mut balances = Vec::with_capacity(histories.len());
        let mut min_pays = Vec::new();
        for (i, h) in histories.iter().enumerate() {
            let prev = summary.rows.last().map_or_else(|| h.balance(), |r| r.balances[i]);
            let (bal, min_pay) = h.calc_balance(cursor, prev);
            balances.push(bal);
            if let Some(mp) = min_pay {
                min_pays.push(mp);
            }
        }

        if cursor > now && min_pays.len() == histories.len() {
            let mut budget = debt_budget - min_pays.iter().sum::<f64>();
            if budget > 0.0 {
                for bal in balances.iter_mut() {
                    if *bal >= budget {
                        *bal -= budget;
                        break;
                    }
                    budget -= *bal;
                    *bal = 0.0;
                }
            }
        }

        let total = balances.iter().sum();
        summary.rows.push(DebtRow {
            label: month_label(cursor),
            year: cursor.0,
            month: cursor.1,
            balances,
            total,
        });
        cursor = next_month(cursor);
    }
    debug!("debt summary has {} rows", summary.rows.len());
    summary
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

pub fn add_credit_line(conn: &Connection, line: &CreditLine) -> Result<i64> {
    if !(1..=31).contains(&line.statement_day) {
        return Err(SimplefiError::Other(format!(
            "Statement day must be between 1 and 31, got {}",
            line.statement_day
        )));
    }
    conn.execute(
        "INSERT INTO credit_lines (name, holder, statement_day, date_opened, annual_fee, interest_rate, \
         credit_limit, min_pay_pct, min_pay_dlr, priority) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            line.name,
            line.holder,
            line.statement_day,
            line.date_opened,
            line.annual_fee,
            line.interest_rate,
            line.credit_limit,
            line.min_pay_pct,
            line.min_pay_dlr,
            line.priority,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn credit_line_id(conn: &Connection, name: &str) -> Result<i64> {
    conn.query_row("SELECT id FROM credit_lines WHERE name = ?1", [name], |r| r.get(0))
        .optional()?
        .ok_or_else(|| SimplefiError::UnknownCreditLine(name.to_string()))
}

pub fn delete_credit_line(conn: &Connection, name: &str) -> Result<()> {
    let id = credit_line_id(conn, name)?;
    conn.execute("DELETE FROM credit_lines WHERE id = ?1", [id])?;
    Ok(())
}

/// Record the balance of a monthly statement, replacing any earlier value.
pub fn set_statement(conn: &Connection, name: &str, year: i32, month: u32, balance: f64) -> Result<Statement> {
    if !(1..=12).contains(&month) {
        return Err(SimplefiError::Other(format!("Invalid month: {month}")));
    }
    let id = credit_line_id(conn, name)?;
    conn.execute(
        "INSERT INTO statements (credit_line_id, year, month, balance) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT (credit_line_id, year, month) DO UPDATE SET balance = excluded.balance",
        rusqlite::params![id, year, month, balance],
    )?;
    Ok(Statement {
        year,
        month,
        balance,
    })
}

/// All credit lines with their statements, in payment priority order.
pub fn load_histories(conn: &Connection) -> Result<Vec<CreditLineHistory>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, holder, statement_day, date_opened, annual_fee, interest_rate, \
         credit_limit, min_pay_pct, min_pay_dlr, priority \
         FROM credit_lines ORDER BY priority, name",
    )?;
    let lines = stmt
        .query_map([], |row| {
            Ok(CreditLine {
                id: row.get(0)?,
                name: row.get(1)?,
                holder: row.get(2)?,
                statement_day: row.get(3)?,
                date_opened: row.get(4)?,
                annual_fee: row.get(5)?,
                interest_rate: row.get(6)?,
                credit_limit: row.get(7)?,
                min_pay_pct: row.get(8)?,
                min_pay_dlr: row.get(9)?,
                priority: row.get(10)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare("SELECT year, month, balance FROM statements WHERE credit_line_id = ?1")?;
    let mut histories = Vec::with_capacity(lines.len());
    for line in lines {
        let statements = stmt
            .query_map([line.id], |row| Ok(((row.get(0)?, row.get(1)?), row.get(2)?)))?
            .collect::<std::result::Result<BTreeMap<YearMonth, f64>, _>>()?;
        histories.push(CreditLineHistory { line, statements });
    }
    Ok(histories)
}

/// The monthly budget of the debt class, if one is set.
pub fn debt_budget(conn: &Connection) -> Result<Option<f64>> {
    let debt = class_id(conn, TransactionClass::Debt)?;
    Ok(conn
        .query_row("SELECT value FROM budgets WHERE class_id = ?1", [debt], |r| r.get(0))
        .optional()?)
}

pub fn debt_summary(conn: &Connection, today: NaiveDate, forecast: bool) -> Result<DebtSummary> {
    let histories = load_histories(conn)?;
    let budget = debt_budget(conn)?;
    Ok(build_summary(&histories, budget, today, forecast))
}
