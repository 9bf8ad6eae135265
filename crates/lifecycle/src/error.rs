//! Error types for package lifecycle operations.
//!
//! Errors are categorized so callers can decide between skipping a single
//! package, self-healing local metadata, or aborting the whole run.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of lifecycle errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A pre-install or pre-uninstall script vetoed the action.
    Rejected,
    /// The installer or uninstaller itself failed.
    Payload,
    /// Local state references something the catalog no longer knows.
    Inconsistency,
    /// A catalog entry could not be evaluated.
    Malformed,
    /// The management API, distribution point or telemetry store is unavailable.
    Transient,
    /// A requested package, edition or entry does not exist.
    NotFound,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Rejected => "Rejected by preflight script",
            Self::Payload => "Package payload failed",
            Self::Inconsistency => "Catalog inconsistency",
            Self::Malformed => "Malformed catalog entry",
            Self::Transient => "Resource unavailable",
            Self::NotFound => "Not found",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Rejected => "The package's preflight script declined this machine; no action needed",
            Self::Payload => "Check the installer log and the package on the distribution point",
            Self::Inconsistency => "Local records were corrected automatically",
            Self::Malformed => "Fix the package definition on the management server",
            Self::Transient => "Check network access to the management server and distribution point",
            Self::NotFound => "Verify the package name and edition",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during lifecycle operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A preflight script exited non-zero.
    #[error("{basename}: preflight script {script} rejected the action (exit {code})")]
    PreflightRejected {
        /// Package basename.
        basename: String,
        /// Script reference that vetoed.
        script: String,
        /// Exit code of the script.
        code: i32,
    },

    /// The installer or uninstaller failed.
    #[error("{basename}: {message}")]
    PayloadFailure {
        /// Package basename.
        basename: String,
        /// What went wrong.
        message: String,
    },

    /// A receipt or queue entry references an edition the catalog does not have.
    #[error("{basename}: {message}")]
    CatalogInconsistency {
        /// Package basename.
        basename: String,
        /// Description of the mismatch.
        message: String,
    },

    /// A catalog entry could not be evaluated.
    #[error("malformed catalog entry for {basename}: {message}")]
    MalformedCatalog {
        /// Package basename.
        basename: String,
        /// Description of the problem.
        message: String,
    },

    /// A shared resource (API, mount, telemetry) is unavailable.
    #[error("{resource} unavailable: {message}")]
    TransientResource {
        /// Which resource failed.
        resource: String,
        /// Error message.
        message: String,
    },

    /// A requested package, edition or entry does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// IO error with path context.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A persisted file could not be parsed or serialized.
    #[error("invalid data in {path}: {message}")]
    Parse {
        /// File involved.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a parse error with path context.
    pub fn parse(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a transient resource error.
    pub fn transient(resource: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::TransientResource {
            resource: resource.into(),
            message: message.to_string(),
        }
    }

    /// Create a malformed catalog error.
    pub fn malformed(basename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedCatalog {
            basename: basename.into(),
            message: message.into(),
        }
    }

    /// Create a catalog inconsistency error.
    pub fn inconsistency(basename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CatalogInconsistency {
            basename: basename.into(),
            message: message.into(),
        }
    }

    /// Create a payload failure.
    pub fn payload(basename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PayloadFailure {
            basename: basename.into(),
            message: message.into(),
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::PreflightRejected { .. } => ErrorCategory::Rejected,
            Error::PayloadFailure { .. } => ErrorCategory::Payload,
            Error::CatalogInconsistency { .. } => ErrorCategory::Inconsistency,
            Error::MalformedCatalog { .. } => ErrorCategory::Malformed,
            Error::TransientResource { .. } => ErrorCategory::Transient,
            Error::NotFound(_) => ErrorCategory::NotFound,
            Error::Io { .. } | Error::Parse { .. } | Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::transient("management API", format!("HTTP {code}")),
            ureq::Error::Json(e) => Self::parse("management API response", e),
            other => Self::transient("management API", other),
        }
    }
}
