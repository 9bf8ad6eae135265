//! # hostinfo
//!
//! A small typed key/value record about this machine, persisted as an XML
//! property list. Values are strings, integers, reals, dates or booleans.
//!
//! Looking up a missing key fails with [`Error::KeyNotFound`]; a key holding
//! an empty string is a successful read.
//!
//! ```no_run
//! use hostinfo::{HostInfo, Value};
//!
//! let mut info = HostInfo::open("/Library/Application Support/kennel/hostinfo.plist").unwrap();
//! info.set("asset_tag", Value::from("A-1042")).unwrap();
//! assert_eq!(info.get("asset_tag").unwrap(), Value::from("A-1042"));
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod value;

pub use error::{Error, Result};
pub use value::{Value, ValueKind};

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// Key stamped with the time of the last sync.
pub const LAST_SYNC: &str = "last_sync";
/// Key stamped with the outcome of the last sync.
pub const LAST_SYNC_RESULT: &str = "last_sync_result";

/// The persisted host record.
#[derive(Debug)]
pub struct HostInfo {
    path: PathBuf,
    entries: plist::Dictionary,
}

impl HostInfo {
    /// Open the record, starting empty if the file doesn't exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            log::debug!("{} does not exist, starting empty", path.display());
            return Ok(Self {
                path,
                entries: plist::Dictionary::new(),
            });
        }

        let entries = match plist::Value::from_file(&path).map_err(|e| Error::plist(&path, e))? {
            plist::Value::Dictionary(dict) => dict,
            other => {
                return Err(Error::NotADictionary {
                    path,
                    found: plist_kind(&other),
                });
            }
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Read a value.
    pub fn get(&self, key: &str) -> Result<Value> {
        let raw = self
            .entries
            .get(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))?;
        Value::from_plist(raw).ok_or_else(|| Error::TypeMismatch {
            key: key.to_string(),
            expected: "string, integer, real, date or bool",
            found: plist_kind(raw),
        })
    }

    /// Read a value that must be a string.
    pub fn get_string(&self, key: &str) -> Result<String> {
        match self.get(key)? {
            Value::String(s) => Ok(s),
            other => Err(Error::TypeMismatch {
                key: key.to_string(),
                expected: "string",
                found: other.kind().name(),
            }),
        }
    }

    /// Read a value that must be a date.
    pub fn get_date(&self, key: &str) -> Result<DateTime<Utc>> {
        match self.get(key)? {
            Value::Date(d) => Ok(d),
            other => Err(Error::TypeMismatch {
                key: key.to_string(),
                expected: "date",
                found: other.kind().name(),
            }),
        }
    }

    /// Write a value and persist the record.
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        log::debug!("hostinfo: {key} = {value}");
        self.entries.insert(key.to_string(), value.to_plist());
        self.save()
    }

    /// Remove a key and persist the record. Returns the old value.
    pub fn delete(&mut self, key: &str) -> Result<Value> {
        let old = self.get(key)?;
        self.entries.remove(key);
        self.save()?;
        Ok(old)
    }

    /// All readable entries, sorted by key. Unsupported plist types are skipped.
    pub fn list(&self) -> Vec<(String, Value)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .filter_map(|(k, v)| Value::from_plist(v).map(|v| (k.clone(), v)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Record when a sync ran and how it ended.
    pub fn stamp_sync(&mut self, at: DateTime<Utc>, result: &str) -> Result<()> {
        self.entries
            .insert(LAST_SYNC.to_string(), Value::Date(at).to_plist());
        self.entries.insert(
            LAST_SYNC_RESULT.to_string(),
            Value::from(result).to_plist(),
        );
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        let tmp = self.path.with_extension("plist.tmp");
        plist::Value::Dictionary(self.entries.clone())
            .to_file_xml(&tmp)
            .map_err(|e| Error::plist(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| Error::io(&self.path, e))?;
        Ok(())
    }
}

fn plist_kind(value: &plist::Value) -> &'static str {
    match value {
        plist::Value::Array(_) => "array",
        plist::Value::Dictionary(_) => "dictionary",
        plist::Value::Data(_) => "data",
        plist::Value::Uid(_) => "uid",
        plist::Value::String(_) => "string",
        plist::Value::Integer(_) => "integer",
        plist::Value::Real(_) => "real",
        plist::Value::Date(_) => "date",
        plist::Value::Boolean(_) => "bool",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> HostInfo {
        HostInfo::open(dir.path().join("hostinfo.plist")).unwrap()
    }

    #[test]
    fn test_missing_key_is_distinct_from_empty_value() {
        let dir = TempDir::new().unwrap();
        let mut info = open(&dir);
        info.set("note", Value::from("")).unwrap();

        assert_eq!(info.get("note").unwrap(), Value::from(""));
        let err = info.get("absent").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_values_persist_with_types() {
        let dir = TempDir::new().unwrap();
        let mut info = open(&dir);
        info.set("building", Value::from("North")).unwrap();
        info.set("floor", Value::from(3_i64)).unwrap();
        info.set("loaner", Value::from(true)).unwrap();
        info.set("ratio", Value::Real(0.25)).unwrap();

        let reopened = open(&dir);
        assert_eq!(reopened.get("building").unwrap(), Value::from("North"));
        assert_eq!(reopened.get("floor").unwrap(), Value::Integer(3));
        assert_eq!(reopened.get("loaner").unwrap(), Value::Bool(true));
        assert_eq!(reopened.get("ratio").unwrap(), Value::Real(0.25));
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let mut info = open(&dir);
        info.set("tmp", Value::from("x")).unwrap();

        assert_eq!(info.delete("tmp").unwrap(), Value::from("x"));
        assert!(info.delete("tmp").unwrap_err().is_not_found());
        assert!(!open(&dir).contains("tmp"));
    }

    #[test]
    fn test_list_sorted() {
        let dir = TempDir::new().unwrap();
        let mut info = open(&dir);
        info.set("b", Value::from("2")).unwrap();
        info.set("a", Value::from("1")).unwrap();

        let keys: Vec<_> = info.list().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_stamp_sync() {
        let dir = TempDir::new().unwrap();
        let mut info = open(&dir);
        let now = Utc::now();
        info.stamp_sync(now, "ok").unwrap();

        let reopened = open(&dir);
        let stamped = reopened.get_date(LAST_SYNC).unwrap();
        assert!((stamped - now).num_seconds().abs() <= 1);
        assert_eq!(reopened.get_string(LAST_SYNC_RESULT).unwrap(), "ok");
    }

    #[test]
    fn test_typed_getter_mismatch() {
        let dir = TempDir::new().unwrap();
        let mut info = open(&dir);
        info.set("floor", Value::from(3_i64)).unwrap();
        let err = info.get_string("floor").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { found: "integer", .. }));
    }

    #[test]
    fn test_non_dictionary_root_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hostinfo.plist");
        plist::Value::Array(Vec::new()).to_file_xml(&path).unwrap();
        assert!(HostInfo::open(&path).is_err());
    }
}
