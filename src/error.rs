use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimplefiError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unknown class: {0}")]
    UnknownClass(String),

    #[error("Unknown credit line: {0}")]
    UnknownCreditLine(String),

    #[error("Missing columns: expected {expected:?}, found {found:?}")]
    MissingColumns {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, SimplefiError>;
