//! Install/uninstall executor.
//!
//! Applies one action at a time: preflight script, payload, best-effort
//! postflight script, receipt update. This is the only place receipts are
//! written.

use crate::backend::{PayloadInstaller, ScriptContext, ScriptRunner};
use crate::error::{Error, Result};
use crate::receipts::ReceiptStore;
use crate::reconcile::ReceiptFix;
use crate::types::{InstallType, Package, QueueAction};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Outcome of applying one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// Payload installed and receipt written
    Installed,
    /// Payload removed and receipt deleted
    Removed,
    /// A preflight script declined the action
    Rejected { reason: String },
    /// The action failed; the receipt is unchanged
    Failed { error: String },
}

impl ApplyResult {
    /// Rejections are expected outcomes, not failures.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    pub fn is_change(&self) -> bool {
        matches!(self, Self::Installed | Self::Removed)
    }
}

/// Counts of apply outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub installed: usize,
    pub removed: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl ExecuteSummary {
    pub fn total_changes(&self) -> usize {
        self.installed + self.removed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::Installed => self.installed += 1,
            ApplyResult::Removed => self.removed += 1,
            ApplyResult::Rejected { .. } => self.rejected += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
        }
    }
}

/// Applies actions against the OS and the receipt store.
pub struct Executor<'a> {
    installer: &'a dyn PayloadInstaller,
    scripts: &'a dyn ScriptRunner,
    receipts: &'a mut ReceiptStore,
    packages_dir: PathBuf,
    context: ScriptContext,
}

impl<'a> Executor<'a> {
    pub fn new(
        installer: &'a dyn PayloadInstaller,
        scripts: &'a dyn ScriptRunner,
        receipts: &'a mut ReceiptStore,
        packages_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            installer,
            scripts,
            receipts,
            packages_dir: packages_dir.into(),
            context: ScriptContext::default(),
        }
    }

    /// Target volume and identity passed to scripts.
    #[must_use]
    pub fn with_context(mut self, context: ScriptContext) -> Self {
        self.context = context;
        self
    }

    pub fn receipts(&self) -> &ReceiptStore {
        &*self.receipts
    }

    pub fn target(&self) -> &Path {
        &self.context.target_drive
    }

    /// Apply one action, folding errors into the result.
    pub fn apply(&mut self, kind: QueueAction, package: &Package) -> ApplyResult {
        let outcome = match kind {
            QueueAction::Install => self.install(package).map(|()| ApplyResult::Installed),
            QueueAction::Uninstall => self.uninstall(package).map(|()| ApplyResult::Removed),
        };

        match outcome {
            Ok(result) => {
                log::info!("{kind} {} succeeded", package.label());
                result
            }
            Err(e @ Error::PreflightRejected { .. }) => {
                log::info!("{kind} {} skipped: {e}", package.label());
                ApplyResult::Rejected {
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                log::error!("{kind} {} failed: {e}", package.label());
                ApplyResult::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    pub fn install(&mut self, package: &Package) -> Result<()> {
        self.preflight(package, package.scripts.preinstall.as_deref())?;

        let source = self.packages_dir.join(&package.file_name);
        log::info!("Installing {} from {}", package.label(), source.display());
        self.installer
            .install(package, &source, &self.context.target_drive)?;

        self.postflight(package, package.scripts.postinstall.as_deref());

        self.receipts.record(
            &package.basename,
            package.edition,
            InstallType::for_status(package.status),
            Utc::now(),
        );
        self.receipts.save()
    }

    pub fn uninstall(&mut self, package: &Package) -> Result<()> {
        self.preflight(package, package.scripts.preuninstall.as_deref())?;

        log::info!("Removing {}", package.label());
        self.installer.remove(package, &self.context.target_drive)?;

        self.postflight(package, package.scripts.postuninstall.as_deref());

        self.receipts.remove(&package.basename);
        self.receipts.save()
    }

    /// Apply a metadata-only receipt correction.
    pub fn apply_fix(&mut self, fix: &ReceiptFix) -> Result<()> {
        let changed = match fix {
            ReceiptFix::Drop { basename, edition } => {
                let matches = self
                    .receipts
                    .get(basename)
                    .is_some_and(|r| r.edition == *edition);
                matches && self.receipts.remove(basename).is_some()
            }
            ReceiptFix::Promote { basename, edition } => self.receipts.promote(basename, *edition),
        };

        if changed {
            log::info!("Receipt fix: {fix}");
            self.receipts.save()?;
        }
        Ok(())
    }

    fn preflight(&self, package: &Package, script: Option<&str>) -> Result<()> {
        let Some(script) = script else {
            return Ok(());
        };
        let code = self.scripts.run(script, &self.context)?;
        if code != 0 {
            return Err(Error::PreflightRejected {
                basename: package.basename.clone(),
                script: script.to_string(),
                code,
            });
        }
        Ok(())
    }

    fn postflight(&self, package: &Package, script: Option<&str>) {
        let Some(script) = script else {
            return;
        };
        match self.scripts.run(script, &self.context) {
            Ok(0) => {}
            Ok(code) => log::warn!("{}: {script} exited with {code}", package.label()),
            Err(e) => log::warn!("{}: {script} failed: {e}", package.label()),
        }
    }
}
