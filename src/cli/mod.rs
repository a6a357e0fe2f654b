pub mod accounts;
pub mod backup;
pub mod categories;
pub mod classify;
pub mod debt;
pub mod import;
pub mod init;
pub mod rules;
pub mod status;
pub mod summary;
pub mod transactions;
pub mod uploads;

use chrono::{Local, Months, NaiveDate};
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::db;
use crate::error::{Result, SimplefiError};
use crate::models::TransactionClass;
use crate::reports::DateRange;
use crate::settings::db_path;

pub(crate) fn open_db() -> Result<Connection> {
    db::open(&db_path())
}

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parse `YYYY-MM` into (year, month).
pub(crate) fn parse_month(value: &str) -> Result<(i32, u32)> {
    let invalid = || SimplefiError::InvalidDate(format!("{value} (expected YYYY-MM)"));
    let (y, m) = value.trim().split_once('-').ok_or_else(invalid)?;
    let year: i32 = y.parse().map_err(|_| invalid())?;
    let month: u32 = m.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}

/// Parse a range bound given as `YYYY-MM-DD` or `YYYY-MM`. A bare month
/// means its first day for a start bound and its last day for an end bound.
pub(crate) fn parse_bound(value: &str, end: bool) -> Result<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
        return Ok(d);
    }
    let (year, month) = parse_month(value)?;
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| SimplefiError::InvalidDate(value.to_string()))?;
    if !end {
        return Ok(first);
    }
    first
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| SimplefiError::InvalidDate(value.to_string()))
}

/// Resolve `--from` / `--to` against the default trailing window.
pub(crate) fn resolve_range(from: Option<&str>, to: Option<&str>, months: u32) -> Result<DateRange> {
    let default = DateRange::trailing_months(today(), months);
    let range = DateRange {
        from: from.map(|f| parse_bound(f, false)).transpose()?.unwrap_or(default.from),
        to: to.map(|t| parse_bound(t, true)).transpose()?.unwrap_or(default.to),
    };
    if range.from > range.to {
        return Err(SimplefiError::InvalidDate(format!(
            "range starts after it ends ({} > {})",
            range.from, range.to
        )));
    }
    Ok(range)
}

#[derive(Parser)]
#[command(
    name = "simplefi",
    version,
    about = "Personal finance from bank CSV exports: rule-based classification, monthly summaries and debt tracking."
)]
pub struct Cli {
    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for simplefi data (default: ~/Documents/simplefi)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Your name, shown by `status`
        #[arg(long)]
        name: Option<String>,
    },
    /// Manage bank accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// List the transaction classes.
    Classes,
    /// Manage categories.
    Categories {
        #[command(subcommand)]
        command: CategoriesCommands,
    },
    /// Manage classification rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Import a bank CSV export and classify the new transactions.
    Import {
        /// Path to the CSV file
        file: String,
        /// Account name to import into
        #[arg(long)]
        account: String,
    },
    /// Run the rules over unclassified transactions.
    Classify {
        /// Drop every rule-assigned category first and classify the whole history
        #[arg(long)]
        all: bool,
    },
    /// Browse transactions and override their categories.
    Transactions {
        #[command(subcommand)]
        command: TransactionsCommands,
    },
    /// Monthly totals per category or per class.
    Summary {
        /// Only categories of this class
        #[arg(long)]
        class: Option<String>,
        /// One row per class instead of per category
        #[arg(long = "by-class", conflicts_with = "class")]
        by_class: bool,
        /// Start: YYYY-MM or YYYY-MM-DD
        #[arg(long)]
        from: Option<String>,
        /// End: YYYY-MM or YYYY-MM-DD
        #[arg(long)]
        to: Option<String>,
        /// Length of the default window in months
        #[arg(long)]
        months: Option<u32>,
    },
    /// List transactions no rule has classified.
    Unclassified {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// Monthly budgets per class.
    Budget {
        #[command(subcommand)]
        command: BudgetCommands,
    },
    /// Credit lines, statements and the payoff table.
    Debt {
        #[command(subcommand)]
        command: DebtCommands,
    },
    /// Export the transaction history or the database.
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
    /// Restore transactions from a CSV history export.
    Restore {
        /// Path to a file written by `export csv`, or the name of a stored export
        file: String,
    },
    /// Delete every transaction and the upload history.
    Purge {
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Review or undo imports.
    Uploads {
        #[command(subcommand)]
        command: UploadsCommands,
    },
    /// Show the data directory and database statistics.
    Status,
    /// Print a shell completion script.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Add an account and describe its CSV layout.
    Add {
        /// Account name, e.g. 'Everyday Checking'
        name: String,
        /// Account holder
        #[arg(long)]
        holder: Option<String>,
        /// Header of the date column
        #[arg(long = "date-col", default_value = "Date")]
        date_col: String,
        /// Header of the amount column
        #[arg(long = "amount-col", default_value = "Amount")]
        amount_col: String,
        /// Header of the description column
        #[arg(long = "desc-col", default_value = "Description")]
        desc_col: String,
        /// chrono date format, e.g. %d/%m/%Y
        #[arg(long = "date-format")]
        date_format: Option<String>,
    },
    /// List all accounts.
    List,
    /// Delete an account with its uploads and transactions.
    Delete {
        name: String,
    },
}

#[derive(Subcommand)]
pub enum CategoriesCommands {
    /// Add a category to a class.
    Add {
        name: String,
        /// income, discretionary, bills, debt or savings
        #[arg(long)]
        class: String,
    },
    /// List categories by class.
    List,
    /// Delete a category and its rules; its transactions become unclassified.
    Delete {
        name: String,
        /// Disambiguates names used in several classes
        #[arg(long)]
        class: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Add a classification rule and re-apply the rule set.
    Add {
        /// Pattern matched against transaction descriptions
        pattern: String,
        /// Category to assign
        #[arg(long)]
        category: String,
        /// Class of the category, when the name is ambiguous
        #[arg(long)]
        class: Option<String>,
        /// Match type: regex, contains, starts_with
        #[arg(long = "match-type", default_value = "regex")]
        match_type: String,
        /// Rule priority (higher wins)
        #[arg(long, default_value = "0")]
        priority: i64,
        /// Smallest amount the rule accepts
        #[arg(long = "min-amount", allow_hyphen_values = true)]
        min_amount: Option<f64>,
        /// Largest amount the rule accepts
        #[arg(long = "max-amount", allow_hyphen_values = true)]
        max_amount: Option<f64>,
    },
    /// List rules in matching order.
    List,
    /// Delete a rule by ID; what it classified goes to the next matching rule.
    Delete {
        /// Rule ID (shown in `simplefi rules list`)
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum TransactionsCommands {
    /// List transactions, newest first.
    List {
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Only transactions in categories of this class
        #[arg(long)]
        class: Option<String>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Manually set the category of a transaction.
    SetCategory {
        /// Transaction ID
        id: i64,
        category: String,
        #[arg(long)]
        class: Option<String>,
    },
    /// Remove a category and let the rules decide again.
    ClearCategory {
        /// Transaction ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum BudgetCommands {
    /// Set the monthly budget of a class.
    Set {
        class: String,
        #[arg(allow_hyphen_values = true)]
        value: f64,
    },
    /// Remove the budget of a class.
    Clear {
        class: String,
    },
    /// Budgets next to the average monthly actuals.
    List {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum DebtCommands {
    /// Manage credit lines.
    Lines {
        #[command(subcommand)]
        command: CreditLinesCommands,
    },
    /// Record a monthly statement balance.
    Statement {
        /// Credit line name
        line: String,
        /// Statement month: YYYY-MM
        #[arg(long)]
        month: String,
        #[arg(long)]
        balance: f64,
    },
    /// Month-by-month balances of every credit line.
    Summary {
        /// Continue past today until every balance is paid off
        #[arg(long)]
        forecast: bool,
    },
}

#[derive(Subcommand)]
pub enum CreditLinesCommands {
    /// Add a credit line.
    Add {
        name: String,
        #[arg(long)]
        holder: Option<String>,
        /// Credit limit
        #[arg(long)]
        limit: f64,
        /// Annual interest rate in percent
        #[arg(long, default_value = "0")]
        rate: f64,
        /// Minimum payment as percent of the balance
        #[arg(long = "min-pct", default_value = "0")]
        min_pay_pct: f64,
        /// Minimum payment in dollars
        #[arg(long = "min-dollars", default_value = "0")]
        min_pay_dlr: f64,
        #[arg(long = "annual-fee", default_value = "0")]
        annual_fee: f64,
        /// Day of month the statement closes
        #[arg(long = "statement-day", default_value = "1")]
        statement_day: u32,
        /// YYYY-MM-DD
        #[arg(long)]
        opened: Option<String>,
        /// Payoff order (lower is paid first)
        #[arg(long, default_value = "0")]
        priority: i64,
    },
    /// List credit lines with their latest balance.
    List,
    /// Delete a credit line and its statements.
    Delete {
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ExportCommands {
    /// Write every transaction to a CSV file.
    Csv {
        /// Output path (default: <data_dir>/exports/simplefi-YYYYMMDD-HHMMSS.csv)
        #[arg(long)]
        output: Option<String>,
    },
    /// Copy the database file.
    Db {
        /// Output path (default: <data_dir>/backups/simplefi-YYYYMMDD-HHMMSS.db)
        #[arg(long)]
        output: Option<String>,
    },
    /// List CSV exports stored in <data_dir>/exports.
    List,
    /// Delete a stored CSV export.
    Delete {
        /// File name as shown by `export list`
        file: String,
    },
}

#[derive(Subcommand)]
pub enum UploadsCommands {
    /// List imports, newest first.
    List,
    /// Delete an import and the transactions it added.
    Delete {
        id: i64,
    },
}

/// Optional range bound as an ISO date string for SQL comparisons.
pub(crate) fn bound_opt(value: Option<&str>, end: bool) -> Result<Option<String>> {
    value.map(|v| parse_bound(v, end).map(|d| d.to_string())).transpose()
}

/// Parse an optional `--class` argument.
pub(crate) fn parse_class(class: Option<&str>) -> Result<Option<TransactionClass>> {
    class.map(str::parse).transpose()
}
