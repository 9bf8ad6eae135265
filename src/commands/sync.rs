use anyhow::{Context as _, Result, bail};
use chrono::Utc;
use colored::Colorize;
use hostinfo::HostInfo;
use lifecycle::backend::{PkgInstaller, ShellScripts, UsageSource};
use lifecycle::sync::{NoProgress, SyncJob, SyncReport, apply_plan};
use lifecycle::{Executor, Plan, Reconciler};
use std::path::{Path, PathBuf};
use usage::UsageDb;

use super::{LocalState, script_context};
use crate::Context;
use crate::cli::SyncArgs;
use crate::config::Config;
use crate::progress::SyncProgress;
use crate::session::Session;
use crate::ui;

pub fn run(ctx: &Context, config: &Config, args: SyncArgs) -> Result<()> {
    let state = LocalState::open(config)?;

    let outcome = execute(ctx, config, &state, args.dry_run);
    if args.dry_run {
        return outcome.map(|_| ());
    }

    let result = match &outcome {
        Ok(Some(report)) if report.has_failures() => "failed".to_string(),
        Ok(_) => "ok".to_string(),
        Err(e) => format!("error: {e}"),
    };
    stamp(config, &state.dir, &result);

    let Some(report) = outcome? else {
        return Ok(());
    };
    if !ctx.quiet {
        print_report(&report);
    }
    if report.has_failures() {
        bail!("{} action(s) failed", report.summary.failed);
    }
    Ok(())
}

/// Plan and, unless this is a dry run, apply. `None` for a dry run.
fn execute(
    ctx: &Context,
    config: &Config,
    state: &LocalState,
    dry_run: bool,
) -> Result<Option<SyncReport>> {
    let mut receipts = state.receipts()?;
    let machine = config.machine_name()?;
    let usage = open_usage(config, &state.dir);
    let reconciler = Reconciler::new(config.sync.clone());
    let mut session = Session::connect(config)?;

    let (_, plan) = SyncJob {
        api: session.api(),
        usage: usage.as_ref().map(|db| db as &dyn UsageSource),
        queue: &state.queue,
        reconciler: &reconciler,
        machine: &machine,
    }
    .plan(&receipts)
    .context("Could not compute the sync plan")?;

    if dry_run {
        print_plan(&plan);
        return Ok(None);
    }

    let installer = PkgInstaller::new();
    let (packages_dir, scripts_dir) = if plan.immediate().next().is_some() {
        let share = session.mount(config)?;
        (share.packages_dir(), share.scripts_dir())
    } else {
        (PathBuf::new(), PathBuf::new())
    };
    let scripts = ShellScripts::new(scripts_dir);
    let mut executor = Executor::new(&installer, &scripts, &mut receipts, packages_dir)
        .with_context(script_context(config, &machine));

    let report = if ctx.quiet {
        apply_plan(&plan, &mut executor, &state.queue, &mut NoProgress)?
    } else {
        apply_plan(&plan, &mut executor, &state.queue, &mut SyncProgress::new())?
    };
    Ok(Some(report))
}

/// Usage data for expiration. Without it expiration is skipped for this run.
fn open_usage(config: &Config, state_dir: &Path) -> Option<UsageDb> {
    if !config.sync.expiration {
        return None;
    }
    let path = config.usage_db(state_dir);
    match UsageDb::open(&path) {
        Ok(db) => Some(db),
        Err(e) => {
            log::warn!("Usage data unavailable ({e}); skipping expiration this run");
            None
        }
    }
}

fn stamp(config: &Config, state_dir: &Path, result: &str) {
    let path = config.hostinfo_file(state_dir);
    let stamped = HostInfo::open(&path).and_then(|mut info| info.stamp_sync(Utc::now(), result));
    if let Err(e) = stamped {
        log::warn!("Could not record the sync in {}: {e}", path.display());
    }
}

fn print_plan(plan: &Plan) {
    if plan.is_empty() && plan.skipped.is_empty() {
        ui::success("Up to date; nothing to do");
        return;
    }

    ui::header("Sync plan");

    if !plan.receipt_fixes.is_empty() {
        ui::section("Receipt corrections");
        for fix in &plan.receipt_fixes {
            ui::dim(&fix.to_string());
        }
    }

    if !plan.queue_prunes.is_empty() {
        ui::section("Logout queue entries to drop");
        for entry in &plan.queue_prunes {
            ui::dim(&entry.label());
        }
    }

    let immediate: Vec<_> = plan.immediate().collect();
    if !immediate.is_empty() {
        ui::section("Apply now");
        for action in immediate {
            println!("  {} {}", action.label(), format!("({})", action.reason).dimmed());
        }
    }

    let deferred: Vec<_> = plan.deferred().collect();
    if !deferred.is_empty() {
        ui::section("Queue for logout");
        for action in deferred {
            println!("  {} {}", action.label(), format!("({})", action.reason).dimmed());
        }
    }

    if !plan.skipped.is_empty() {
        ui::section("Skipped");
        for skipped in &plan.skipped {
            ui::warn(&format!("{}: {}", skipped.basename, skipped.reason));
        }
    }
    println!();
}

fn print_report(report: &SyncReport) {
    if report.is_noop() {
        ui::success("Up to date");
        return;
    }

    for entry in &report.queued {
        ui::info(&format!("Queued {} for logout", entry.label()));
    }
    for entry in &report.pruned {
        ui::dim(&format!("Dropped queued {} (no longer in the catalog)", entry.label()));
    }
    for skipped in &report.skipped {
        ui::warn(&format!("Skipped {}: {}", skipped.basename, skipped.reason));
    }

    let summary = &report.summary;
    let line = format!(
        "{} installed, {} removed, {} queued, {} rejected, {} failed, {} corrected",
        summary.installed,
        summary.removed,
        report.queued.len(),
        summary.rejected,
        summary.failed,
        report.receipt_fixes
    );
    if report.has_failures() {
        ui::error(&line);
    } else {
        ui::success(&line);
    }
}
