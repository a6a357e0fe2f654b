use std::fmt;
use std::str::FromStr;

use crate::error::SimplefiError;

/// A bank account together with the column layout of its CSV export.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub holder: Option<String>,
    pub date_col: String,
    pub amount_col: String,
    pub desc_col: String,
    /// chrono format string, e.g. `%d/%m/%Y`. `None` tries the common layouts.
    pub date_format: Option<String>,
}

/// Top level of the category hierarchy. Seeded at init, never user-defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransactionClass {
    Income,
    Discretionary,
    Bills,
    Debt,
    Savings,
}

impl TransactionClass {
    pub const ALL: [TransactionClass; 5] = [
        Self::Income,
        Self::Discretionary,
        Self::Bills,
        Self::Debt,
        Self::Savings,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Discretionary => "discretionary",
            Self::Bills => "bills",
            Self::Debt => "debt",
            Self::Savings => "savings",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Income => "Income",
            Self::Discretionary => "Discretionary",
            Self::Bills => "Bills",
            Self::Debt => "Debt",
            Self::Savings => "Savings",
        }
    }
}

impl fmt::Display for TransactionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TransactionClass {
    type Err = SimplefiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| SimplefiError::UnknownClass(s.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub class: TransactionClass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    /// Case-insensitive regular expression, searched anywhere in the text.
    Regex,
    Contains,
    StartsWith,
}

impl MatchType {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Regex => "regex",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
        }
    }
}

impl FromStr for MatchType {
    type Err = SimplefiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "regex" => Ok(Self::Regex),
            "contains" => Ok(Self::Contains),
            "starts_with" => Ok(Self::StartsWith),
            other => Err(SimplefiError::Other(format!(
                "Unknown match type: {other} (expected regex, contains or starts_with)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: i64,
    pub pattern: String,
    pub match_type: MatchType,
    pub category_id: i64,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub priority: i64,
    pub hit_count: i64,
}

/// Intermediate representation from the CSV parser before DB insert.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub date: String,
    pub description: String,
    pub amount: f64,
}

/// A CSV row the importer refused, with the 1-based line number in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct CreditLine {
    pub id: i64,
    pub name: String,
    pub holder: Option<String>,
    pub statement_day: u32,
    pub date_opened: Option<String>,
    pub annual_fee: f64,
    pub interest_rate: f64,
    pub credit_limit: f64,
    pub min_pay_pct: f64,
    pub min_pay_dlr: f64,
    pub priority: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub year: i32,
    pub month: u32,
    pub balance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_parse_is_case_insensitive() {
        assert_eq!("Bills".parse::<TransactionClass>().unwrap(), TransactionClass::Bills);
        assert_eq!(" savings ".parse::<TransactionClass>().unwrap(), TransactionClass::Savings);
        assert!("groceries".parse::<TransactionClass>().is_err());
    }

    #[test]
    fn test_match_type_keys_roundtrip() {
        for mt in [MatchType::Regex, MatchType::Contains, MatchType::StartsWith] {
            assert_eq!(mt.key().parse::<MatchType>().unwrap(), mt);
        }
        assert!("fuzzy".parse::<MatchType>().is_err());
    }
}
