//! Local receipt store: one record per installed basename.

use crate::error::Result;
use crate::persist;
use crate::types::{Edition, InstallType, Receipt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct ReceiptFile {
    #[serde(default)]
    receipts: BTreeMap<String, Receipt>,
}

/// Receipts keyed by basename, optionally backed by a TOML file.
#[derive(Debug, Default)]
pub struct ReceiptStore {
    path: Option<PathBuf>,
    receipts: BTreeMap<String, Receipt>,
}

impl ReceiptStore {
    /// An unpersisted store, used for previews and tests.
    pub fn in_memory(receipts: impl IntoIterator<Item = Receipt>) -> Self {
        Self {
            path: None,
            receipts: receipts
                .into_iter()
                .map(|r| (r.basename.clone(), r))
                .collect(),
        }
    }

    /// Load receipts from disk, or start empty if the file doesn't exist.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file: ReceiptFile = persist::load_or_default(&path)?;
        Ok(Self {
            path: Some(path),
            receipts: file.receipts,
        })
    }

    /// Write receipts back to disk. No-op for in-memory stores.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = ReceiptFile {
            receipts: self.receipts.clone(),
        };
        persist::save_atomic(path, &file)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, basename: &str) -> Option<&Receipt> {
        self.receipts.get(basename)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Receipt> {
        self.receipts.values()
    }

    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }

    /// Record an install, replacing any previous receipt for the basename.
    pub fn record(
        &mut self,
        basename: &str,
        edition: Edition,
        install_type: InstallType,
        installed_at: DateTime<Utc>,
    ) {
        self.receipts.insert(
            basename.to_string(),
            Receipt {
                basename: basename.to_string(),
                edition,
                install_type,
                installed_at,
            },
        );
    }

    /// Upgrade a pilot receipt to live in place. Returns whether it changed.
    pub fn promote(&mut self, basename: &str, edition: Edition) -> bool {
        match self.receipts.get_mut(basename) {
            Some(receipt)
                if receipt.edition == edition && receipt.install_type == InstallType::Pilot =>
            {
                receipt.install_type = InstallType::Live;
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, basename: &str) -> Option<Receipt> {
        self.receipts.remove(basename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_replaces_existing() {
        let mut store = ReceiptStore::default();
        store.record("app", Edition::new(1, 0), InstallType::Live, Utc::now());
        store.record("app", Edition::new(2, 0), InstallType::Live, Utc::now());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("app").unwrap().edition, Edition::new(2, 0));
    }

    #[test]
    fn test_promote_only_matching_pilot() {
        let mut store = ReceiptStore::default();
        store.record("app", Edition::new(2, 0), InstallType::Pilot, Utc::now());

        assert!(!store.promote("app", Edition::new(1, 0)));
        assert_eq!(store.get("app").unwrap().install_type, InstallType::Pilot);

        assert!(store.promote("app", Edition::new(2, 0)));
        assert_eq!(store.get("app").unwrap().install_type, InstallType::Live);

        // Already live
        assert!(!store.promote("app", Edition::new(2, 0)));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = ReceiptStore::load(dir.path().join("receipts.toml")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("receipts.toml");

        let mut store = ReceiptStore::load(&path).unwrap();
        store.record("app", Edition::new(2, 1), InstallType::Live, Utc::now());
        store.record("tool", Edition::new(1, 0), InstallType::Pilot, Utc::now());
        store.save().unwrap();

        let reloaded = ReceiptStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        let app = reloaded.get("app").unwrap();
        assert_eq!(app.edition, Edition::new(2, 1));
        assert_eq!(app.install_type, InstallType::Live);
        assert_eq!(
            reloaded.get("tool").unwrap().install_type,
            InstallType::Pilot
        );
    }

    #[test]
    fn test_remove() {
        let mut store = ReceiptStore::in_memory(Vec::new());
        store.record("app", Edition::new(1, 0), InstallType::Live, Utc::now());
        assert!(store.remove("app").is_some());
        assert!(store.remove("app").is_none());
        assert!(store.save().is_ok());
    }
}
