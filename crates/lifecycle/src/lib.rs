//! # lifecycle
//!
//! Package lifecycle engine for managed macOS fleets.
//!
//! This crate provides:
//! - Reconciliation of the server catalog against local receipts
//!   (pilot freeze, live promotion, auto-update, scoped auto-install, expiration)
//! - An executor that runs preflight/postflight scripts around payload
//!   installs and owns all receipt writes
//! - A file-locked logout queue for reboot-requiring actions
//! - The logout installer that drains the queue behind a slideshow and reboots
//!
//! ## Example
//!
//! ```no_run
//! use lifecycle::backend::{HttpApi, PkgInstaller, ShellScripts};
//! use lifecycle::sync::{NoProgress, SyncJob, apply_plan};
//! use lifecycle::{Executor, LogoutQueue, ReceiptStore, Reconciler};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! let api = HttpApi::new("https://mdm.example.com/api", Duration::from_secs(30));
//! let queue = LogoutQueue::in_dir(Path::new("/var/lib/kennel"));
//! let reconciler = Reconciler::default();
//! let mut receipts = ReceiptStore::load("/var/lib/kennel/receipts.toml").unwrap();
//!
//! let job = SyncJob { api: &api, usage: None, queue: &queue, reconciler: &reconciler, machine: "lab-01" };
//! let (_, plan) = job.plan(&receipts).unwrap();
//!
//! let installer = PkgInstaller::new();
//! let scripts = ShellScripts::new("/Volumes/share/Scripts");
//! let mut executor = Executor::new(&installer, &scripts, &mut receipts, "/Volumes/share/Packages");
//! let report = apply_plan(&plan, &mut executor, &queue, &mut NoProgress).unwrap();
//! println!("{} installed", report.summary.installed);
//! ```

#![warn(clippy::all)]

pub mod backend;
pub mod catalog;
pub mod error;
pub mod executor;
pub mod puppy;
pub mod queue;
pub mod receipts;
pub mod reconcile;
pub mod scope;
pub mod sync;
pub mod types;

mod persist;
#[cfg(test)]
mod testing;

pub use catalog::{Catalog, RejectedEntry};
pub use error::{Error, ErrorCategory, Result};
pub use executor::{ApplyResult, ExecuteSummary, Executor};
pub use queue::{LogoutQueue, QueueState};
pub use receipts::ReceiptStore;
pub use reconcile::{Action, Plan, ReceiptFix, ReconcileConfig, Reconciler};
pub use scope::{GroupMembership, in_scope};
pub use types::{
    Edition, GroupId, InstallType, LogoutQueueEntry, Package, PackageStatus, QueueAction, Receipt,
};
