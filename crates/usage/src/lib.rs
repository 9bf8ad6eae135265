//! # usage
//!
//! Read-only view of the foreground-usage database written by the usage
//! daemon. The database holds one row per application path:
//!
//! ```sql
//! CREATE TABLE usage (path TEXT PRIMARY KEY, last_foreground INTEGER);
//! ```
//!
//! `last_foreground` is seconds since the Unix epoch.

mod error;

pub use error::{Error, Result};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::path::Path;

/// Handle to the usage database.
pub struct UsageDb {
    conn: Connection,
}

impl UsageDb {
    /// Open the database read-only. It is never created or modified here.
    pub fn open(db_path: &Path) -> Result<Self> {
        if !db_path.exists() {
            return Err(Error::Missing(db_path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        log::debug!("Opened usage database {}", db_path.display());
        Ok(Self { conn })
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// When `app_path` was last in the foreground, if ever recorded.
    pub fn last_foreground(&self, app_path: &str) -> Result<Option<DateTime<Utc>>> {
        let secs: Option<Option<i64>> = self
            .conn
            .query_row(
                "SELECT last_foreground FROM usage WHERE path = ?1",
                params![normalize(app_path)],
                |row| row.get(0),
            )
            .optional()?;

        match secs.flatten() {
            None => Ok(None),
            Some(secs) => DateTime::from_timestamp(secs, 0)
                .map(Some)
                .ok_or_else(|| Error::BadTimestamp {
                    path: app_path.to_string(),
                    value: secs,
                }),
        }
    }
}

impl lifecycle::backend::UsageSource for UsageDb {
    fn last_foreground(&self, path: &str) -> lifecycle::Result<Option<DateTime<Utc>>> {
        Self::last_foreground(self, path).map_err(|e| lifecycle::Error::transient("usage database", e))
    }
}

fn normalize(app_path: &str) -> &str {
    match app_path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}
