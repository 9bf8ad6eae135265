//! Builders and in-memory collaborators shared by unit tests.

use crate::backend::{ManagementApi, PayloadInstaller, ScriptContext, ScriptRunner};
use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::scope::GroupMembership;
use crate::types::{Edition, InstallType, Package, PackageStatus, Receipt, Scripts};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn pkg(basename: &str, version: u32, revision: u32, status: PackageStatus) -> Package {
    Package {
        basename: basename.to_string(),
        edition: Edition::new(version, revision),
        status,
        file_name: format!("{basename}-{version}.{revision}.pkg"),
        needs_reboot: false,
        uninstallable: false,
        auto_install_groups: BTreeSet::new(),
        excluded_groups: BTreeSet::new(),
        expiration_days: None,
        expiration_path: None,
        receipt_ids: Vec::new(),
        scripts: Scripts::default(),
    }
}

fn receipt(basename: &str, version: u32, revision: u32, install_type: InstallType) -> Receipt {
    Receipt {
        basename: basename.to_string(),
        edition: Edition::new(version, revision),
        install_type,
        installed_at: Utc::now(),
    }
}

pub fn live_receipt(basename: &str, version: u32, revision: u32) -> Receipt {
    receipt(basename, version, revision, InstallType::Live)
}

pub fn pilot_receipt(basename: &str, version: u32, revision: u32) -> Receipt {
    receipt(basename, version, revision, InstallType::Pilot)
}

/// Records installs and removals; fails for basenames marked broken.
#[derive(Default)]
pub struct FakeInstaller {
    pub installed: Mutex<Vec<String>>,
    pub removed: Mutex<Vec<String>>,
    broken: BTreeSet<String>,
}

impl FakeInstaller {
    pub fn failing(basenames: &[&str]) -> Self {
        Self {
            broken: basenames.iter().map(ToString::to_string).collect(),
            ..Default::default()
        }
    }

    pub fn installed(&self) -> Vec<String> {
        self.installed.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

impl PayloadInstaller for FakeInstaller {
    fn install(&self, package: &Package, _source: &Path, _target: &Path) -> Result<()> {
        if self.broken.contains(&package.basename) {
            return Err(Error::payload(&package.basename, "installer exited with 1"));
        }
        self.installed.lock().unwrap().push(package.label());
        Ok(())
    }

    fn remove(&self, package: &Package, _target: &Path) -> Result<()> {
        if self.broken.contains(&package.basename) {
            return Err(Error::payload(&package.basename, "pkgutil exited with 1"));
        }
        self.removed.lock().unwrap().push(package.label());
        Ok(())
    }
}

/// Scripts answer with a fixed exit code; unknown scripts succeed.
#[derive(Default)]
pub struct FakeScripts {
    codes: BTreeMap<String, i32>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeScripts {
    pub fn with_codes(codes: &[(&str, i32)]) -> Self {
        Self {
            codes: codes.iter().map(|(s, c)| ((*s).to_string(), *c)).collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ScriptRunner for FakeScripts {
    fn run(&self, script: &str, _ctx: &ScriptContext) -> Result<i32> {
        self.calls.lock().unwrap().push(script.to_string());
        Ok(self.codes.get(script).copied().unwrap_or(0))
    }
}

/// Serves a fixed catalog and membership.
#[derive(Default)]
pub struct FakeApi {
    pub catalog: Vec<Package>,
    pub groups: Vec<String>,
    pub policy_succeeds: bool,
    pub policies: Mutex<Vec<String>>,
    pub disconnects: AtomicUsize,
}

impl FakeApi {
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl ManagementApi for FakeApi {
    fn fetch_catalog(&self) -> Result<Catalog> {
        Ok(Catalog::new(self.catalog.clone()))
    }

    fn fetch_group_membership(&self, _machine: &str) -> Result<GroupMembership> {
        Ok(GroupMembership::new(self.groups.clone()))
    }

    fn run_policy(&self, policy: &str) -> Result<bool> {
        self.policies.lock().unwrap().push(policy.to_string());
        Ok(self.policy_succeeds)
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}
