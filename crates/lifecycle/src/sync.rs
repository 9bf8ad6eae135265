//! One sync run: gather inputs, plan, then apply.
//!
//! Receipt fixes go first, then the logout queue is updated in a single
//! locked transaction, then immediate actions run one at a time in plan
//! order.

use crate::backend::{ManagementApi, UsageSource};
use crate::catalog::Catalog;
use crate::error::Result;
use crate::executor::{ApplyResult, ExecuteSummary, Executor};
use crate::queue::{LogoutQueue, QueueState};
use crate::receipts::ReceiptStore;
use crate::reconcile::{Plan, ReconcileInput, Reconciler, Skipped};
use crate::types::LogoutQueueEntry;
use chrono::Utc;

/// Progress hooks for the apply phase.
pub trait ProgressCallback {
    /// Called once before the first immediate action
    fn on_start(&mut self, count: usize);

    fn on_action_start(&mut self, label: &str);

    fn on_action_complete(&mut self, label: &str, result: &ApplyResult);

    fn on_finish(&mut self);
}

/// No-op progress callback.
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_start(&mut self, _count: usize) {}
    fn on_action_start(&mut self, _label: &str) {}
    fn on_action_complete(&mut self, _label: &str, _result: &ApplyResult) {}
    fn on_finish(&mut self) {}
}

/// What a sync did.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub receipt_fixes: usize,
    /// Queue entries removed because their edition left the catalog
    pub pruned: Vec<LogoutQueueEntry>,
    /// Entries added to the logout queue
    pub queued: Vec<LogoutQueueEntry>,
    /// Immediate actions and their outcomes, in order
    pub results: Vec<(String, ApplyResult)>,
    pub skipped: Vec<Skipped>,
    pub summary: ExecuteSummary,
}

impl SyncReport {
    pub fn has_failures(&self) -> bool {
        self.summary.has_failures()
    }

    pub fn is_noop(&self) -> bool {
        self.receipt_fixes == 0
            && self.pruned.is_empty()
            && self.queued.is_empty()
            && self.results.is_empty()
    }
}

/// Inputs gathered from collaborators for one run.
pub struct SyncJob<'a> {
    pub api: &'a dyn ManagementApi,
    pub usage: Option<&'a dyn UsageSource>,
    pub queue: &'a LogoutQueue,
    pub reconciler: &'a Reconciler,
    pub machine: &'a str,
}

impl SyncJob<'_> {
    /// Fetch the catalog and membership and compute the plan.
    pub fn plan(&self, receipts: &ReceiptStore) -> Result<(Catalog, Plan)> {
        let catalog = self.api.fetch_catalog()?;
        let membership = self.api.fetch_group_membership(self.machine)?;
        log::info!(
            "Reconciling {} catalog editions against {} receipts",
            catalog.len(),
            receipts.len()
        );

        let queued = self.queue.read(QueueState::clone)?;
        let plan = self.reconciler.plan(&ReconcileInput {
            catalog: &catalog,
            receipts,
            membership: &membership,
            usage: self.usage,
            queue: &queued,
            now: Utc::now(),
        });
        Ok((catalog, plan))
    }
}

/// Carry out a plan.
///
/// Per-action failures land in the report. Only run-level failures (receipt
/// or queue persistence) return `Err`.
pub fn apply_plan<P: ProgressCallback>(
    plan: &Plan,
    executor: &mut Executor<'_>,
    queue: &LogoutQueue,
    progress: &mut P,
) -> Result<SyncReport> {
    let mut report = SyncReport {
        skipped: plan.skipped.clone(),
        ..Default::default()
    };

    for fix in &plan.receipt_fixes {
        executor.apply_fix(fix)?;
        report.receipt_fixes += 1;
    }

    let deferred: Vec<LogoutQueueEntry> = plan.deferred().map(|a| a.to_queue_entry()).collect();
    if !plan.queue_prunes.is_empty() || !deferred.is_empty() {
        let (pruned, queued) = queue.update(|state| {
            let pruned: Vec<_> = plan
                .queue_prunes
                .iter()
                .filter(|e| state.remove_matching(e))
                .cloned()
                .collect();
            for entry in &deferred {
                log::info!("Queueing {} for logout", entry.label());
                state.enqueue(entry.clone());
            }
            (pruned, deferred.clone())
        })?;
        report.pruned = pruned;
        report.queued = queued;
    }

    let immediate: Vec<_> = plan.immediate().collect();
    progress.on_start(immediate.len());
    for action in immediate {
        let label = action.label();
        progress.on_action_start(&label);
        let result = executor.apply(action.kind, &action.package);
        progress.on_action_complete(&label, &result);
        report.summary.add_result(&result);
        report.results.push((label, result));
    }
    progress.on_finish();

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::ReconcileConfig;
    use crate::testing::{FakeApi, FakeInstaller, FakeScripts, live_receipt, pkg};
    use crate::types::{Edition, PackageStatus, QueueAction};
    use tempfile::TempDir;

    struct Recorder(Vec<String>);

    impl ProgressCallback for Recorder {
        fn on_start(&mut self, count: usize) {
            self.0.push(format!("start {count}"));
        }
        fn on_action_start(&mut self, label: &str) {
            self.0.push(format!("begin {label}"));
        }
        fn on_action_complete(&mut self, label: &str, result: &ApplyResult) {
            self.0.push(format!("end {label} {}", result.is_success()));
        }
        fn on_finish(&mut self) {
            self.0.push("finish".to_string());
        }
    }

    #[test]
    fn test_sync_applies_then_converges() {
        let dir = TempDir::new().unwrap();
        let queue = LogoutQueue::in_dir(dir.path());
        let mut app = pkg("app", 1, 0, PackageStatus::Live);
        app.auto_install_groups.insert("staff".to_string());
        let api = FakeApi {
            catalog: vec![app],
            groups: vec!["staff".to_string()],
            ..Default::default()
        };
        let reconciler = Reconciler::new(ReconcileConfig::default());
        let job = SyncJob {
            api: &api,
            usage: None,
            queue: &queue,
            reconciler: &reconciler,
            machine: "lab-01",
        };
        let installer = FakeInstaller::default();
        let scripts = FakeScripts::default();
        let mut receipts = ReceiptStore::default();

        let (_, plan) = job.plan(&receipts).unwrap();
        let mut recorder = Recorder(Vec::new());
        let report = {
            let mut executor = Executor::new(&installer, &scripts, &mut receipts, dir.path());
            apply_plan(&plan, &mut executor, &queue, &mut recorder).unwrap()
        };
        assert_eq!(report.summary.installed, 1);
        assert_eq!(
            recorder.0,
            vec!["start 1", "begin install app@1.0", "end install app@1.0 true", "finish"]
        );

        let (_, second) = job.plan(&receipts).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_deferred_actions_queued_and_stale_entries_pruned() {
        let dir = TempDir::new().unwrap();
        let queue = LogoutQueue::in_dir(dir.path());
        queue
            .enqueue(LogoutQueueEntry::new(
                "old",
                Edition::new(1, 0),
                QueueAction::Install,
            ))
            .unwrap();

        let mut kext = pkg("kext", 2, 0, PackageStatus::Live);
        kext.needs_reboot = true;
        let api = FakeApi {
            catalog: vec![
                pkg("kext", 1, 0, PackageStatus::Deprecated),
                kext,
                pkg("old", 2, 0, PackageStatus::Live),
            ],
            ..Default::default()
        };
        let reconciler = Reconciler::default();
        let job = SyncJob {
            api: &api,
            usage: None,
            queue: &queue,
            reconciler: &reconciler,
            machine: "lab-01",
        };
        let mut receipts = ReceiptStore::in_memory([live_receipt("kext", 1, 0)]);
        let installer = FakeInstaller::default();
        let scripts = FakeScripts::default();

        let (_, plan) = job.plan(&receipts).unwrap();
        let report = {
            let mut executor = Executor::new(&installer, &scripts, &mut receipts, dir.path());
            apply_plan(&plan, &mut executor, &queue, &mut NoProgress).unwrap()
        };

        assert!(installer.installed().is_empty());
        assert_eq!(report.pruned.len(), 1);
        assert_eq!(report.queued.len(), 1);
        let entries = queue.snapshot().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].basename, "kext");
        assert_eq!(entries[0].edition, Edition::new(2, 0));

        // A second sync finds it already queued
        let (_, again) = job.plan(&receipts).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_failed_action_does_not_stop_others() {
        let dir = TempDir::new().unwrap();
        let queue = LogoutQueue::in_dir(dir.path());
        let mut broken = pkg("broken", 1, 0, PackageStatus::Live);
        broken.auto_install_groups.insert("all".to_string());
        let mut fine = pkg("fine", 1, 0, PackageStatus::Live);
        fine.auto_install_groups.insert("all".to_string());
        let api = FakeApi {
            catalog: vec![broken, fine],
            groups: vec!["all".to_string()],
            ..Default::default()
        };
        let reconciler = Reconciler::default();
        let job = SyncJob {
            api: &api,
            usage: None,
            queue: &queue,
            reconciler: &reconciler,
            machine: "lab-01",
        };
        let installer = FakeInstaller::failing(&["broken"]);
        let scripts = FakeScripts::default();
        let mut receipts = ReceiptStore::default();

        let (_, plan) = job.plan(&receipts).unwrap();
        let report = {
            let mut executor = Executor::new(&installer, &scripts, &mut receipts, dir.path());
            apply_plan(&plan, &mut executor, &queue, &mut NoProgress).unwrap()
        };

        assert!(report.has_failures());
        assert_eq!(report.summary.installed, 1);
        assert!(receipts.get("broken").is_none());
        assert!(receipts.get("fine").is_some());
    }
}
