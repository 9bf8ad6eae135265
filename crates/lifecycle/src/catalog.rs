//! Server package catalog, indexed by basename.

use crate::error::{Error, Result};
use crate::types::{Edition, Package};
use serde_json::Value;
use std::collections::BTreeMap;

/// A served catalog entry that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    /// `None` when the entry has no readable `basename`
    pub basename: Option<String>,
    pub reason: String,
}

/// All known packages grouped by basename, editions sorted ascending.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    packages: BTreeMap<String, Vec<Package>>,
    rejected: Vec<RejectedEntry>,
}

impl Catalog {
    pub fn new(packages: impl IntoIterator<Item = Package>) -> Self {
        let mut by_basename: BTreeMap<String, Vec<Package>> = BTreeMap::new();
        for package in packages {
            by_basename
                .entry(package.basename.clone())
                .or_default()
                .push(package);
        }
        for editions in by_basename.values_mut() {
            editions.sort_by(|a, b| a.edition.cmp(&b.edition));
        }
        Self {
            packages: by_basename,
            rejected: Vec::new(),
        }
    }

    /// Decode a served catalog one entry at a time.
    ///
    /// Entries that don't decode are kept aside as [`RejectedEntry`] so the
    /// rest of the catalog stays usable.
    pub fn from_json(entries: Vec<Value>) -> Self {
        let mut packages = Vec::with_capacity(entries.len());
        let mut rejected = Vec::new();
        for entry in entries {
            let basename = entry
                .get("basename")
                .and_then(Value::as_str)
                .map(str::to_string);
            match serde_json::from_value::<Package>(entry) {
                Ok(package) => packages.push(package),
                Err(e) => {
                    let err = Error::malformed(basename.as_deref().unwrap_or("<unnamed>"), e.to_string());
                    log::warn!("{err}");
                    rejected.push(RejectedEntry {
                        basename,
                        reason: err.to_string(),
                    });
                }
            }
        }
        let mut catalog = Self::new(packages);
        catalog.rejected = rejected;
        catalog
    }

    /// Entries dropped while decoding, in served order.
    pub fn rejected(&self) -> &[RejectedEntry] {
        &self.rejected
    }

    fn rejection(&self, basename: &str) -> Option<&RejectedEntry> {
        self.rejected
            .iter()
            .find(|r| r.basename.as_deref() == Some(basename))
    }

    /// Whether any served entry for `basename` failed to decode.
    pub fn has_rejected(&self, basename: &str) -> bool {
        self.rejection(basename).is_some()
    }

    pub fn basenames(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    /// Basenames named by entries that failed to decode.
    pub fn rejected_basenames(&self) -> impl Iterator<Item = &str> {
        self.rejected.iter().filter_map(|r| r.basename.as_deref())
    }

    pub fn has_basename(&self, basename: &str) -> bool {
        self.packages.contains_key(basename)
    }

    /// All editions of a basename, oldest first.
    pub fn editions(&self, basename: &str) -> &[Package] {
        self.packages.get(basename).map_or(&[], Vec::as_slice)
    }

    pub fn find(&self, basename: &str, edition: Edition) -> Option<&Package> {
        self.editions(basename).iter().find(|p| p.edition == edition)
    }

    pub fn contains(&self, basename: &str, edition: Edition) -> bool {
        self.find(basename, edition).is_some()
    }

    /// The live edition of a basename, if any.
    ///
    /// More than one live edition is a malformed catalog.
    pub fn live(&self, basename: &str) -> Result<Option<&Package>> {
        let mut live = self.editions(basename).iter().filter(|p| p.is_live());
        let first = live.next();
        if let Some(second) = live.next() {
            return Err(Error::malformed(
                basename,
                format!(
                    "multiple live editions ({} and {})",
                    first.map(|p| p.edition.to_string()).unwrap_or_default(),
                    second.edition
                ),
            ));
        }
        Ok(first)
    }

    /// Check the invariants reconciliation relies on for one basename.
    pub fn validate(&self, basename: &str) -> Result<()> {
        if let Some(rejected) = self.rejection(basename) {
            return Err(Error::malformed(
                basename,
                format!("an edition could not be read ({})", rejected.reason),
            ));
        }

        let editions = self.editions(basename);

        for pair in editions.windows(2) {
            if pair[0].edition == pair[1].edition {
                return Err(Error::malformed(
                    basename,
                    format!("edition {} listed twice", pair[0].edition),
                ));
            }
        }

        for package in editions {
            if package.file_name.trim().is_empty() {
                return Err(Error::malformed(
                    basename,
                    format!("edition {} has no installer file", package.edition),
                ));
            }
            if package.expiration_days.is_some() && package.expiration_path.is_none() {
                return Err(Error::malformed(
                    basename,
                    format!(
                        "edition {} sets expiration_days without expiration_path",
                        package.edition
                    ),
                ));
            }
        }

        self.live(basename)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.packages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
