//! Full sync and logout runs against in-memory collaborators.

use chrono::Utc;
use lifecycle::backend::{ManagementApi, PayloadInstaller, ScriptContext, ScriptRunner};
use lifecycle::puppy::{
    OptOutPrompt, PromptAnswer, Puppy, PuppyConfig, PuppyOutcome, Rebooter, SlideRenderer,
};
use lifecycle::sync::{NoProgress, SyncJob, apply_plan};
use lifecycle::{
    Catalog, Edition, Error, Executor, GroupMembership, InstallType, LogoutQueue,
    LogoutQueueEntry, Package, PackageStatus, QueueAction, Receipt, ReceiptStore, Reconciler,
    Result,
};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn package(basename: &str, version: u32, revision: u32, status: PackageStatus) -> Package {
    Package {
        basename: basename.to_string(),
        edition: Edition::new(version, revision),
        status,
        file_name: format!("{basename}.pkg"),
        needs_reboot: false,
        uninstallable: false,
        auto_install_groups: BTreeSet::new(),
        excluded_groups: BTreeSet::new(),
        expiration_days: None,
        expiration_path: None,
        receipt_ids: Vec::new(),
        scripts: Default::default(),
    }
}

struct Server {
    catalog: Vec<Package>,
    groups: Vec<String>,
}

impl ManagementApi for Server {
    fn fetch_catalog(&self) -> Result<Catalog> {
        Ok(Catalog::new(self.catalog.clone()))
    }

    fn fetch_group_membership(&self, _machine: &str) -> Result<GroupMembership> {
        Ok(GroupMembership::new(self.groups.clone()))
    }

    fn run_policy(&self, _policy: &str) -> Result<bool> {
        Ok(true)
    }
}

#[derive(Default)]
struct Installer {
    log: Mutex<Vec<String>>,
    broken: Vec<String>,
}

impl PayloadInstaller for Installer {
    fn install(&self, package: &Package, _source: &Path, _target: &Path) -> Result<()> {
        self.log.lock().unwrap().push(package.label());
        if self.broken.contains(&package.basename) {
            return Err(Error::payload(&package.basename, "installer failed"));
        }
        Ok(())
    }

    fn remove(&self, package: &Package, _target: &Path) -> Result<()> {
        self.log.lock().unwrap().push(format!("-{}", package.label()));
        Ok(())
    }
}

struct NoScripts;

impl ScriptRunner for NoScripts {
    fn run(&self, _script: &str, _ctx: &ScriptContext) -> Result<i32> {
        Ok(0)
    }
}

struct NeverCancel;

impl OptOutPrompt for NeverCancel {
    fn ask(&self, _queued: &[LogoutQueueEntry], _timeout: Duration) -> Result<PromptAnswer> {
        Ok(PromptAnswer::TimedOut)
    }
}

struct Blank;

impl SlideRenderer for Blank {
    fn show(&self, _slide: Option<&Path>, _caption: &str) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct Reboots(AtomicUsize);

impl Rebooter for Reboots {
    fn reboot(&self) -> Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn sync(server: &Server, queue: &LogoutQueue, receipts: &mut ReceiptStore, installer: &Installer) {
    let reconciler = Reconciler::default();
    let job = SyncJob {
        api: server,
        usage: None,
        queue,
        reconciler: &reconciler,
        machine: "lab-01",
    };
    let (_, plan) = job.plan(receipts).unwrap();
    let mut executor = Executor::new(installer, &NoScripts, receipts, "/share/Packages");
    apply_plan(&plan, &mut executor, queue, &mut NoProgress).unwrap();
}

#[test]
fn test_live_update_then_idempotent() {
    let dir = TempDir::new().unwrap();
    let queue = LogoutQueue::in_dir(dir.path());
    let server = Server {
        catalog: vec![
            package("app", 1, 5, PackageStatus::Deprecated),
            package("app", 2, 1, PackageStatus::Live),
        ],
        groups: Vec::new(),
    };
    let mut receipts = ReceiptStore::load(dir.path().join("receipts.toml")).unwrap();
    receipts.record("app", Edition::new(1, 5), InstallType::Live, Utc::now());
    let installer = Installer::default();

    sync(&server, &queue, &mut receipts, &installer);

    assert_eq!(*installer.log.lock().unwrap(), vec!["app@2.1"]);
    let receipt = ReceiptStore::load(dir.path().join("receipts.toml"))
        .unwrap()
        .get("app")
        .cloned()
        .unwrap();
    assert_eq!(receipt.edition, Edition::new(2, 1));
    assert_eq!(receipt.install_type, InstallType::Live);

    // Nothing left to do on the next run
    let reconciler = Reconciler::default();
    let (_, plan) = SyncJob {
        api: &server,
        usage: None,
        queue: &queue,
        reconciler: &reconciler,
        machine: "lab-01",
    }
    .plan(&receipts)
    .unwrap();
    assert!(plan.is_empty());
}

#[test]
fn test_reboot_required_install_goes_to_logout_queue() {
    let dir = TempDir::new().unwrap();
    let queue = LogoutQueue::in_dir(dir.path());
    let mut app = package("app", 3, 0, PackageStatus::Live);
    app.needs_reboot = true;
    app.auto_install_groups.insert("engineering".to_string());
    let server = Server {
        catalog: vec![app],
        groups: vec!["engineering".to_string()],
    };
    let mut receipts = ReceiptStore::default();
    let installer = Installer::default();

    sync(&server, &queue, &mut receipts, &installer);

    assert!(installer.log.lock().unwrap().is_empty());
    assert!(receipts.is_empty());
    let entries = queue.snapshot().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].basename, "app");
    assert_eq!(entries[0].edition, Edition::new(3, 0));
    assert_eq!(entries[0].action, QueueAction::Install);

    // Syncing again leaves a single entry
    sync(&server, &queue, &mut receipts, &installer);
    assert_eq!(queue.snapshot().unwrap().len(), 1);
}

#[test]
fn test_logout_drains_in_order_and_reboots_despite_failure() {
    let dir = TempDir::new().unwrap();
    let queue = LogoutQueue::in_dir(dir.path());
    let mut first = package("first", 1, 0, PackageStatus::Live);
    first.needs_reboot = true;
    let mut second = package("second", 4, 2, PackageStatus::Live);
    second.needs_reboot = true;
    queue
        .enqueue(LogoutQueueEntry::new("first", first.edition, QueueAction::Install))
        .unwrap();
    queue
        .enqueue(LogoutQueueEntry::new("second", second.edition, QueueAction::Install))
        .unwrap();

    let catalog = Catalog::new(vec![first, second]);
    let installer = Installer {
        broken: vec!["first".to_string()],
        ..Default::default()
    };
    let mut receipts = ReceiptStore::default();
    let reboots = Reboots::default();
    let config = PuppyConfig {
        opt_out_timeout_secs: 0,
        slide_interval_secs: 0,
        finish_hold_secs: 0,
        ..Default::default()
    };

    let outcome = {
        let mut executor = Executor::new(&installer, &NoScripts, &mut receipts, "/share/Packages");
        Puppy::new(&config, &queue, &NeverCancel, Arc::new(Blank), &reboots)
            .run(&catalog, &mut executor)
            .unwrap()
    };

    let PuppyOutcome::Rebooted(report) = outcome else {
        panic!("expected a reboot");
    };
    assert_eq!(
        *installer.log.lock().unwrap(),
        vec!["first@1.0", "second@4.2"]
    );
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.installed, 1);
    assert_eq!(reboots.0.load(Ordering::SeqCst), 1);
    assert!(receipts.get("first").is_none());
    assert_eq!(
        receipts.get("second").map(|r: &Receipt| r.edition),
        Some(Edition::new(4, 2))
    );
    assert!(queue.snapshot().unwrap().is_empty());
}

#[test]
fn test_pilot_receipts_only_ever_promote() {
    let dir = TempDir::new().unwrap();
    let queue = LogoutQueue::in_dir(dir.path());
    let server = Server {
        catalog: vec![
            package("app", 1, 0, PackageStatus::Live),
            package("app", 2, 0, PackageStatus::Pilot),
        ],
        groups: Vec::new(),
    };
    let mut receipts = ReceiptStore::default();
    receipts.record("app", Edition::new(2, 0), InstallType::Pilot, Utc::now());
    let installer = Installer::default();

    sync(&server, &queue, &mut receipts, &installer);
    assert!(installer.log.lock().unwrap().is_empty());
    assert_eq!(receipts.get("app").unwrap().install_type, InstallType::Pilot);

    // The pilot edition goes live on the server
    let server = Server {
        catalog: vec![
            package("app", 1, 0, PackageStatus::Deprecated),
            package("app", 2, 0, PackageStatus::Live),
        ],
        groups: Vec::new(),
    };
    sync(&server, &queue, &mut receipts, &installer);
    assert!(installer.log.lock().unwrap().is_empty());
    assert_eq!(receipts.get("app").unwrap().install_type, InstallType::Live);
}
