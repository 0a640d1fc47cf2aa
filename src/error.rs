// ⚠️ Error taxonomy for the ETL core
//
// Only file-level and run-level failures are errors. Cell-level problems
// (unparseable amounts, missing organizations) are plain `None`s upstream.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("TOML config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Invalid regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("Could not decode {path} as {encoding}")]
    Decode { path: PathBuf, encoding: &'static str },

    #[error("File has no header row: {0}")]
    EmptyFile(PathBuf),

    #[error("State '{0}' is not configured")]
    UnknownState(String),

    #[error("Year {0} is not in the supported set")]
    UnsupportedYear(i32),

    #[error("No source file found for {state} {year} (pattern: {pattern})")]
    FileNotFound {
        state: String,
        year: i32,
        pattern: String,
    },

    #[error("Required column '{column}' missing in {path}")]
    MissingColumn { column: String, path: PathBuf },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, EtlError>;
