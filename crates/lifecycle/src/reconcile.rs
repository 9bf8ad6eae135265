//! Reconciliation engine.
//!
//! Given the server catalog, local receipts, group membership and usage
//! telemetry, decide what should happen to every basename on this machine.
//! Planning has no side effects: the returned [`Plan`] is applied later by
//! the sync step through the executor and the logout queue.
//!
//! Per basename, in priority order:
//! 1. A receipt for an edition the catalog no longer lists is dropped
//!    (metadata only, nothing is uninstalled).
//! 2. A pilot receipt is frozen, except that it becomes live in place when
//!    its edition is now the live edition.
//! 3. A live receipt older than the live edition is updated.
//! 4. A basename with no receipt is installed when the live edition is in scope.
//! 5. A live, uninstallable receipt unused past its threshold is expired.
//!
//! Steps 3 and 5 never both fire for one basename; update wins.

use crate::backend::UsageSource;
use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::queue::QueueState;
use crate::receipts::ReceiptStore;
use crate::scope::{GroupMembership, in_scope};
use crate::types::{Edition, InstallType, LogoutQueueEntry, Package, QueueAction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Tunables for reconciliation, loaded from the `[sync]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Update live receipts to newer live editions
    pub auto_update: bool,
    /// Install in-scope live editions that aren't installed yet
    pub auto_install: bool,
    /// Expire unused uninstallable packages
    pub expiration: bool,
    /// Threshold for packages that track a path but set no threshold of their own
    pub default_expiration_days: Option<u32>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            auto_update: true,
            auto_install: true,
            expiration: true,
            default_expiration_days: None,
        }
    }
}

/// Why an action was planned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// Live receipt behind the live edition
    Update { from: Edition },
    /// In scope and not installed
    AutoInstall,
    /// Unused for longer than the threshold; `None` means never used
    Expired { idle_days: Option<i64> },
    /// Asked for explicitly
    Requested,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Update { from } => write!(f, "update from {from}"),
            Self::AutoInstall => write!(f, "auto-install"),
            Self::Expired { idle_days: Some(days) } => write!(f, "unused for {days} days"),
            Self::Expired { idle_days: None } => write!(f, "never used"),
            Self::Requested => write!(f, "requested"),
        }
    }
}

/// Where an action is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Applied during this sync
    Immediate,
    /// Deferred to logout because the package needs a reboot
    LogoutQueue,
}

/// One planned install or uninstall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub package: Package,
    pub kind: QueueAction,
    pub reason: Reason,
    pub route: Route,
}

impl Action {
    pub fn new(package: Package, kind: QueueAction, reason: Reason) -> Self {
        let route = if package.needs_reboot {
            Route::LogoutQueue
        } else {
            Route::Immediate
        };
        Self {
            package,
            kind,
            reason,
            route,
        }
    }

    pub fn basename(&self) -> &str {
        &self.package.basename
    }

    pub fn edition(&self) -> Edition {
        self.package.edition
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.kind, self.package.label())
    }

    pub fn to_queue_entry(&self) -> LogoutQueueEntry {
        LogoutQueueEntry::new(self.package.basename.clone(), self.package.edition, self.kind)
    }

    fn matches_entry(&self, entry: &LogoutQueueEntry) -> bool {
        entry.basename == self.package.basename
            && entry.edition == self.package.edition
            && entry.action == self.kind
    }
}

/// Metadata-only receipt corrections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptFix {
    /// The receipt's edition is gone from the catalog
    Drop { basename: String, edition: Edition },
    /// The pilot edition became the live edition
    Promote { basename: String, edition: Edition },
}

impl ReceiptFix {
    pub fn basename(&self) -> &str {
        match self {
            Self::Drop { basename, .. } | Self::Promote { basename, .. } => basename,
        }
    }
}

impl fmt::Display for ReceiptFix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drop { basename, edition } => {
                write!(f, "forget {basename}@{edition} (not in catalog)")
            }
            Self::Promote { basename, edition } => {
                write!(f, "promote {basename}@{edition} to live")
            }
        }
    }
}

/// A basename that could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub basename: String,
    pub reason: String,
}

/// Everything a sync should do, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub receipt_fixes: Vec<ReceiptFix>,
    /// Queue entries whose edition the catalog no longer lists
    pub queue_prunes: Vec<LogoutQueueEntry>,
    pub actions: Vec<Action>,
    pub skipped: Vec<Skipped>,
}

impl Plan {
    /// No corrections and no actions. Skipped basenames don't count.
    pub fn is_empty(&self) -> bool {
        self.receipt_fixes.is_empty() && self.queue_prunes.is_empty() && self.actions.is_empty()
    }

    pub fn immediate(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter().filter(|a| a.route == Route::Immediate)
    }

    pub fn deferred(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter().filter(|a| a.route == Route::LogoutQueue)
    }
}

/// Snapshot of everything reconciliation reads.
pub struct ReconcileInput<'a> {
    pub catalog: &'a Catalog,
    pub receipts: &'a ReceiptStore,
    pub membership: &'a GroupMembership,
    /// `None` when telemetry is unavailable; expiration is skipped then
    pub usage: Option<&'a dyn UsageSource>,
    pub queue: &'a QueueState,
    pub now: DateTime<Utc>,
}

/// The decision loop.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Build the plan. Deterministic for identical input.
    pub fn plan(&self, input: &ReconcileInput<'_>) -> Plan {
        let mut plan = Plan::default();

        let basenames: BTreeSet<&str> = input
            .catalog
            .basenames()
            .chain(input.catalog.rejected_basenames())
            .chain(input.receipts.iter().map(|r| r.basename.as_str()))
            .collect();

        for basename in basenames {
            let mut decided = Plan::default();
            match self.evaluate(basename, input, &mut decided) {
                Ok(()) => {
                    plan.receipt_fixes.append(&mut decided.receipt_fixes);
                    plan.actions.append(&mut decided.actions);
                }
                Err(e) => {
                    // Fixes are only decided after validation, so they stand.
                    plan.receipt_fixes.append(&mut decided.receipt_fixes);
                    log::warn!("Skipping {basename}: {e}");
                    plan.skipped.push(Skipped {
                        basename: basename.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        for rejected in input.catalog.rejected() {
            if rejected.basename.is_none() {
                plan.skipped.push(Skipped {
                    basename: "<unnamed>".to_string(),
                    reason: rejected.reason.clone(),
                });
            }
        }

        for entry in input.queue.entries() {
            if input.catalog.has_rejected(&entry.basename) {
                log::debug!("Keeping queued {}: its catalog entry is unreadable", entry.label());
                continue;
            }
            if !input.catalog.contains(&entry.basename, entry.edition) {
                let stale = Error::inconsistency(
                    &entry.basename,
                    format!("queued {} edition {} is not in the catalog", entry.action, entry.edition),
                );
                log::warn!("{stale}");
                plan.queue_prunes.push(entry.clone());
            }
        }

        plan
    }

    fn evaluate(&self, basename: &str, input: &ReconcileInput<'_>, plan: &mut Plan) -> Result<()> {
        let catalog = input.catalog;
        catalog.validate(basename)?;
        let live = catalog.live(basename)?;

        let mut receipt = input.receipts.get(basename).cloned();

        if let Some(r) = &receipt
            && !catalog.contains(basename, r.edition)
        {
            let stale = Error::inconsistency(
                basename,
                format!("receipt edition {} is not in the catalog; forgetting it", r.edition),
            );
            log::warn!("{stale}");
            plan.receipt_fixes.push(ReceiptFix::Drop {
                basename: basename.to_string(),
                edition: r.edition,
            });
            receipt = None;
        }

        if let Some(r) = receipt.as_mut()
            && r.install_type == InstallType::Pilot
        {
            if !live.is_some_and(|l| l.edition == r.edition) {
                log::debug!("{} is a pilot install; leaving it alone", r.label());
                return Ok(());
            }
            log::info!("{} is now the live edition", r.label());
            plan.receipt_fixes.push(ReceiptFix::Promote {
                basename: basename.to_string(),
                edition: r.edition,
            });
            r.install_type = InstallType::Live;
        }

        match receipt {
            Some(receipt) => {
                if let Some(live) = live
                    && live.edition > receipt.edition
                {
                    if self.config.auto_update {
                        self.emit(
                            plan,
                            input,
                            Action::new(
                                live.clone(),
                                QueueAction::Install,
                                Reason::Update {
                                    from: receipt.edition,
                                },
                            ),
                        );
                        return Ok(());
                    }
                    log::debug!("Auto-update disabled; {basename} stays at {}", receipt.edition);
                }

                if self.config.expiration
                    && let Some(idle_days) = self.expired(basename, receipt.edition, input)?
                {
                    let package = catalog
                        .find(basename, receipt.edition)
                        .cloned()
                        .ok_or_else(|| Error::NotFound(receipt.label()))?;
                    self.emit(
                        plan,
                        input,
                        Action::new(package, QueueAction::Uninstall, Reason::Expired { idle_days }),
                    );
                }
            }
            None => {
                if let Some(live) = live
                    && self.config.auto_install
                    && in_scope(live, input.membership)
                {
                    self.emit(
                        plan,
                        input,
                        Action::new(live.clone(), QueueAction::Install, Reason::AutoInstall),
                    );
                }
            }
        }

        Ok(())
    }

    /// `Some(idle_days)` when the installed edition should expire.
    ///
    /// A tracked path with no usage record counts as never used.
    fn expired(
        &self,
        basename: &str,
        edition: Edition,
        input: &ReconcileInput<'_>,
    ) -> Result<Option<Option<i64>>> {
        let Some(usage) = input.usage else {
            return Ok(None);
        };
        let Some(package) = input.catalog.find(basename, edition) else {
            return Ok(None);
        };
        if !package.uninstallable {
            return Ok(None);
        }
        let Some(path) = package.expiration_path.as_deref() else {
            return Ok(None);
        };
        let Some(threshold) = package
            .expiration_days
            .or(self.config.default_expiration_days)
        else {
            return Ok(None);
        };

        match usage.last_foreground(path)? {
            None => {
                log::info!("{} has no usage record for {path}", package.label());
                Ok(Some(None))
            }
            Some(last_used) => {
                let idle_days = (input.now - last_used).num_days();
                if idle_days > i64::from(threshold) {
                    Ok(Some(Some(idle_days)))
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn emit(&self, plan: &mut Plan, input: &ReconcileInput<'_>, action: Action) {
        if action.route == Route::LogoutQueue
            && input
                .queue
                .get(action.basename())
                .is_some_and(|e| action.matches_entry(e))
        {
            log::debug!("{} is already queued for logout", action.label());
            return;
        }
        log::debug!("Planned {} ({})", action.label(), action.reason);
        plan.actions.push(action);
    }
}
