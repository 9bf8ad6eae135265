//! Centralized path resolution for kennel
//!
//! # Environment Variables
//!
//! - `KENNEL_CONFIG` - Override the config file (e.g., `/etc/kennel.toml`)
//! - `KENNEL_STATE_DIR` - Override the state directory (receipts, logout queue)
//!
//! # Path Resolution Priority
//!
//! For config_file():
//! 1. `KENNEL_CONFIG` environment variable
//! 2. `<support dir>/config.toml`
//!
//! For state_dir():
//! 1. `KENNEL_STATE_DIR` environment variable
//! 2. `[paths] state_dir` from the config file
//! 3. The support dir
//!
//! The support dir is `/Library/Application Support/kennel` on macOS and
//! the platform data dir (`~/.local/share/kennel`) elsewhere.

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Environment variable for config file override
pub const ENV_CONFIG: &str = "KENNEL_CONFIG";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "KENNEL_STATE_DIR";

const APP_DIR: &str = "kennel";

/// Machine-wide support directory.
pub fn support_dir() -> Result<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        Ok(PathBuf::from("/Library/Application Support").join(APP_DIR))
    }

    #[cfg(not(target_os = "macos"))]
    {
        use anyhow::Context;
        let data = dirs::data_dir().context("Could not determine data directory")?;
        Ok(data.join(APP_DIR))
    }
}

/// Get the config file path
pub fn config_file() -> Result<PathBuf> {
    if let Ok(file) = std::env::var(ENV_CONFIG) {
        let path = expand(&file);
        log::debug!("Using config file from {}: {}", ENV_CONFIG, path.display());
        return Ok(path);
    }
    Ok(support_dir()?.join("config.toml"))
}

/// Get the state directory path
///
/// `configured` is the `[paths] state_dir` value, if any.
pub fn state_dir(configured: Option<&Path>) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }
    resolve_state_dir(configured)
}

fn resolve_state_dir(configured: Option<&Path>) -> Result<PathBuf> {
    match configured {
        Some(dir) => Ok(expand(&dir.to_string_lossy())),
        None => support_dir(),
    }
}

/// Receipt store file inside the state dir
pub fn receipts_file(state_dir: &Path) -> PathBuf {
    state_dir.join("receipts.toml")
}

/// Default host-info record location
pub fn hostinfo_file(state_dir: &Path) -> PathBuf {
    state_dir.join("hostinfo.plist")
}

/// Default usage database location
pub fn usage_db(state_dir: &Path) -> PathBuf {
    state_dir.join("usage.db")
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
