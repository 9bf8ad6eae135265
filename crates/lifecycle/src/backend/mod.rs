//! Collaborator interfaces and their real implementations.
//!
//! Everything outside the lifecycle core sits behind one of these traits:
//! - [`ManagementApi`]: catalog, group membership and policy execution
//! - [`UsageSource`]: last-foreground timestamps from usage telemetry
//! - [`PayloadInstaller`]: the OS package installer
//! - [`ScriptRunner`]: pre/post install and uninstall scripts
//! - [`DistributionPoint`]: where installers and scripts live
//!
//! Tests swap in in-memory fakes for each of them.

pub mod http;
pub mod macos;
pub mod share;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::scope::GroupMembership;
use crate::types::Package;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use http::HttpApi;
pub use macos::{PkgInstaller, ShellScripts};
pub use share::{DistributionPoint, LocalShare, MountedShare, SmbShare};

/// Device-management API client.
pub trait ManagementApi: Send + Sync {
    /// All packages known to the server.
    ///
    /// Entries that can't be decoded are reported through
    /// [`Catalog::rejected`] instead of failing the fetch.
    fn fetch_catalog(&self) -> Result<Catalog>;

    /// Groups the named machine currently belongs to.
    fn fetch_group_membership(&self, machine: &str) -> Result<GroupMembership>;

    /// Run a policy by reference. `Ok(false)` means it ran and failed.
    fn run_policy(&self, policy: &str) -> Result<bool>;

    /// Release the API session.
    fn disconnect(&self) {}
}

/// Read-only view of foreground-usage telemetry.
pub trait UsageSource {
    /// When `path` was last in the foreground, if ever recorded.
    fn last_foreground(&self, path: &str) -> Result<Option<DateTime<Utc>>>;
}

impl UsageSource for BTreeMap<String, DateTime<Utc>> {
    fn last_foreground(&self, path: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.get(path).copied())
    }
}

/// The OS package installer.
pub trait PayloadInstaller: Send + Sync {
    /// Install `package` from the installer file at `source` onto `target`.
    fn install(&self, package: &Package, source: &Path, target: &Path) -> Result<()>;

    /// Remove `package`'s payload from `target`.
    fn remove(&self, package: &Package, target: &Path) -> Result<()>;
}

/// Arguments every package script receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptContext {
    pub target_drive: PathBuf,
    pub computer_name: String,
    pub user: String,
}

impl Default for ScriptContext {
    fn default() -> Self {
        Self {
            target_drive: PathBuf::from("/"),
            computer_name: String::new(),
            user: String::new(),
        }
    }
}

/// Runs package scripts by reference.
pub trait ScriptRunner: Send + Sync {
    /// Run `script` and return its exit code.
    fn run(&self, script: &str, ctx: &ScriptContext) -> Result<i32>;
}
