//! TOML load/save helpers shared by the receipt store and the logout queue.

use crate::error::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Load a TOML file, or the default value if it doesn't exist.
pub(crate) fn load_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::debug!("{} does not exist, using defaults", path.display());
        return Ok(T::default());
    }

    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let value = toml::from_str(&content).map_err(|e| Error::parse(path, e))?;
    log::debug!("Loaded {}", path.display());
    Ok(value)
}

/// Write a TOML file through a temporary sibling and rename it into place.
pub(crate) fn save_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    }

    let content = toml::to_string_pretty(value).map_err(|e| Error::parse(path, e))?;
    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, content).map_err(|e| Error::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| Error::io(path, e))?;

    log::debug!("Saved {}", path.display());
    Ok(())
}
