//! Error types for Ledger

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported analysis type: {0}")]
    UnsupportedAnalysisType(String),

    #[error("Schedule validation error: {0}")]
    ScheduleValidation(String),

    #[error("Schedule persistence error: {0}")]
    SchedulePersistence(String),

    #[error("Analysis failed: {0}")]
    Analysis(String),

    #[error("Bank sync error: {0}")]
    Sync(String),

    #[error("Scheduled task timed out after {0:?}")]
    TaskTimeout(std::time::Duration),
}

pub type Result<T> = std::result::Result<T, Error>;
