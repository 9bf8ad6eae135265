//! Error types for host record access.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for host record operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur reading or writing the host record.
#[derive(Debug, Error)]
pub enum Error {
    /// The key is absent. Distinct from a key holding an empty value.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The stored value has a different type than requested.
    #[error("{key} holds a {found}, not a {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Text could not be converted to the requested type.
    #[error("invalid {kind} value '{value}': {message}")]
    InvalidValue {
        kind: &'static str,
        value: String,
        message: String,
    },

    /// The file parsed but its root isn't a dictionary.
    #[error("{path} holds a {found} at the root, expected a dictionary")]
    NotADictionary { path: PathBuf, found: &'static str },

    /// IO error with path context.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not a readable property list.
    #[error("invalid property list {path}: {source}")]
    Plist {
        path: PathBuf,
        #[source]
        source: plist::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn plist(path: impl Into<PathBuf>, source: plist::Error) -> Self {
        Self::Plist {
            path: path.into(),
            source,
        }
    }

    /// Whether this is a missing-key lookup failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound(_))
    }
}
