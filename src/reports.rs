use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};
use rusqlite::Connection;

use crate::db::{class_from_sql, class_id};
use crate::error::Result;
use crate::models::TransactionClass;

pub const UNCLASSIFIED: &str = "Unclassified";

// ---------------------------------------------------------------------------
// Date range helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

fn first_of_month(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

fn last_of_month(d: NaiveDate) -> NaiveDate {
    first_of_month(d)
        .checked_add_months(Months::new(1))
        .and_then(|n| n.pred_opt())
        .unwrap_or(d)
}

impl DateRange {
    /// The `months` calendar months ending with the month of `today`.
    pub fn trailing_months(today: NaiveDate, months: u32) -> Self {
        let back = months.max(1) - 1;
        let from = first_of_month(today)
            .checked_sub_months(Months::new(back))
            .unwrap_or(today);
        Self {
            from,
            to: last_of_month(today),
        }
    }

    /// `YYYY-MM` keys for every month touched by the range, in order.
    pub fn month_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        let mut cursor = first_of_month(self.from);
        while cursor <= self.to {
            keys.push(cursor.format("%Y-%m").to_string());
            match cursor.checked_add_months(Months::new(1)) {
                Some(next) => cursor = next,
                None => break,
            }
        }
        keys
    }

    fn bounds(&self) -> (String, String) {
        (
            self.from.format("%Y-%m-%d").to_string(),
            self.to.format("%Y-%m-%d").to_string(),
        )
    }
}

// ---------------------------------------------------------------------------
// Monthly summary
// ---------------------------------------------------------------------------

/// A summary row key. Ordering puts classes first, then categories by class
/// and name, and always ends with the unclassified bucket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Bucket {
    Class(TransactionClass),
    Category {
        class: TransactionClass,
        name: String,
        id: i64,
    },
    Unclassified,
}

impl Bucket {
    pub fn label(&self) -> String {
        match self {
            Self::Class(c) => c.label().to_string(),
            Self::Category { name, .. } => name.clone(),
            Self::Unclassified => UNCLASSIFIED.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    ByCategory,
    ByClass,
    /// Categories of one class only. Unclassified rows have no class and are
    /// left out.
    WithinClass(TransactionClass),
}

#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub bucket: Bucket,
    /// One amount per entry of `Summary::months`.
    pub amounts: Vec<f64>,
    pub total: f64,
    pub count: i64,
}

#[derive(Debug, Clone)]
pub struct Summary {
    pub range: DateRange,
    pub months: Vec<String>,
    pub rows: Vec<SummaryRow>,
    pub month_totals: Vec<f64>,
    pub total: f64,
}

impl Summary {
    pub fn row(&self, bucket: &Bucket) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| &r.bucket == bucket)
    }

    pub fn unclassified(&self) -> Option<&SummaryRow> {
        self.row(&Bucket::Unclassified)
    }
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn get_summary(conn: &Connection, range: DateRange, grouping: Grouping) -> Result<Summary> {
    let (from, to) = range.bounds();
    let mut stmt = conn.prepare(
        "SELECT substr(t.date, 1, 7) AS month, c.id, c.name, cl.name, SUM(t.amount), COUNT(*) \
         FROM transactions t \
         LEFT JOIN categories c ON t.category_id = c.id \
         LEFT JOIN classes cl ON c.class_id = cl.id \
         WHERE t.date BETWEEN ?1 AND ?2 \
         GROUP BY month, c.id",
    )?;
    let raw = stmt
        .query_map([&from, &to], |row| {
            let class: Option<String> = row.get(3)?;
            let class = class.map(class_from_sql).transpose()?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<i64>>(1)?,
                row.get::<_, Option<String>>(2)?,
                class,
                row.get::<_, f64>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let months = range.month_keys();
    let month_index: BTreeMap<&str, usize> = months
        .iter()
        .enumerate()
        .map(|(i, m)| (m.as_str(), i))
        .collect();

    let mut buckets: BTreeMap<Bucket, (Vec<f64>, i64)> = BTreeMap::new();
    for (month, cat_id, cat_name, class, sum, count) in raw {
        let bucket = match (cat_id, cat_name, class) {
            (Some(id), Some(name), Some(class)) => match grouping {
                Grouping::ByCategory => Bucket::Category { class, name, id },
                Grouping::ByClass => Bucket::Class(class),
                Grouping::WithinClass(only) if only == class => Bucket::Category { class, name, id },
                Grouping::WithinClass(_) => continue,
            },
            _ => match grouping {
                Grouping::WithinClass(_) => continue,
                _ => Bucket::Unclassified,
            },
        };
        let Some(&idx) = month_index.get(month.as_str()) else {
            continue;
        };
        let entry = buckets
            .entry(bucket)
            .or_insert_with(|| (vec![0.0; months.len()], 0));
        entry.0[idx] += sum;
        entry.1 += count;
    }

    let mut month_totals = vec![0.0; months.len()];
    let rows: Vec<SummaryRow> = buckets
        .into_iter()
        .map(|(bucket, (amounts, count))| {
            let amounts: Vec<f64> = amounts.into_iter().map(round_cents).collect();
            for (t, a) in month_totals.iter_mut().zip(&amounts) {
                *t += a;
            }
            SummaryRow {
                bucket,
                total: round_cents(amounts.iter().sum()),
                amounts,
                count,
            }
        })
        .collect();
    let month_totals: Vec<f64> = month_totals.into_iter().map(round_cents).collect();
    let total = round_cents(month_totals.iter().sum());

    Ok(Summary {
        range,
        months,
        rows,
        month_totals,
        total,
    })
}

// ---------------------------------------------------------------------------
// Budget vs actual
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BudgetLine {
    pub class: TransactionClass,
    pub budget: Option<f64>,
    /// Average monthly net amount over the range.
    pub monthly_average: f64,
}

pub fn get_budget_report(conn: &Connection, range: DateRange) -> Result<Vec<BudgetLine>> {
    let summary = get_summary(conn, range, Grouping::ByClass)?;
    let months = summary.months.len().max(1) as f64;

    let mut stmt = conn.prepare(
        "SELECT cl.name, b.value FROM budgets b JOIN classes cl ON b.class_id = cl.id",
    )?;
    let budgets: BTreeMap<TransactionClass, f64> = stmt
        .query_map([], |row| Ok((class_from_sql(row.get(0)?)?, row.get::<_, f64>(1)?)))?
        .collect::<std::result::Result<_, _>>()?;

    Ok(TransactionClass::ALL
        .into_iter()
        .map(|class| BudgetLine {
            class,
            budget: budgets.get(&class).copied(),
            monthly_average: summary
                .row(&Bucket::Class(class))
                .map_or(0.0, |r| round_cents(r.total / months)),
        })
        .collect())
}

/// Set the monthly budget of `class`, replacing any previous value.
pub fn set_budget(conn: &Connection, class: TransactionClass, value: f64) -> Result<()> {
    let class_id = class_id(conn, class)?;
    conn.execute(
        "INSERT INTO budgets (class_id, value) VALUES (?1, ?2) \
         ON CONFLICT (class_id) DO UPDATE SET value = excluded.value",
        rusqlite::params![class_id, value],
    )?;
    Ok(())
}

pub fn clear_budget(conn: &Connection, class: TransactionClass) -> Result<bool> {
    let class_id = class_id(conn, class)?;
    Ok(conn.execute("DELETE FROM budgets WHERE class_id = ?1", [class_id])? > 0)
}
