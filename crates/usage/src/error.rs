//! Error types for the usage crate

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur reading usage telemetry
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The database file does not exist
    #[error("usage database not found: {}", .0.display())]
    Missing(PathBuf),

    /// A stored timestamp is out of range
    #[error("bad timestamp {value} for {path}")]
    BadTimestamp { path: String, value: i64 },
}

/// Result type for usage operations
pub type Result<T> = std::result::Result<T, Error>;
