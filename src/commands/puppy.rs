use anyhow::{Context as _, Result, bail};
use lifecycle::backend::{ManagementApi, PkgInstaller, ScriptContext, ShellScripts};
use lifecycle::puppy::{
    DrainReport, OptOutPrompt, PolicyRebooter, Puppy, PuppyOutcome, SlideRenderer, StopStatus,
};
use lifecycle::Executor;
use std::sync::Arc;

use super::LocalState;
use crate::Context;
use crate::cli::PuppyArgs;
use crate::config::Config;
use crate::display::{HelperRenderer, LogRenderer};
use crate::prompt::{ConsolePrompt, HelperPrompt};
use crate::session::Session;
use crate::ui;

pub fn run(ctx: &Context, config: &Config, args: PuppyArgs) -> Result<()> {
    let state = LocalState::open(config)?;

    // Checked before touching the network so an empty queue costs nothing
    if state.queue.snapshot()?.is_empty() {
        if !ctx.quiet {
            ui::info("Logout queue is empty; nothing to do");
        }
        return Ok(());
    }

    let mut session = Session::connect(config)?;
    let catalog = session.api().fetch_catalog().context("Could not fetch the catalog")?;
    let share = session.mount(config)?;
    let packages_dir = share.packages_dir();
    let scripts = ShellScripts::new(share.scripts_dir());

    let mut receipts = state.receipts()?;
    let installer = PkgInstaller::new();
    let mut executor = Executor::new(&installer, &scripts, &mut receipts, packages_dir).with_context(
        ScriptContext {
            target_drive: args.target_drive,
            computer_name: args.computer_name,
            user: args.user,
        },
    );

    let prompt: Box<dyn OptOutPrompt> = match &config.puppy.prompt_helper {
        Some(helper) => Box::new(HelperPrompt::new(helper)),
        None => Box::new(ConsolePrompt),
    };
    let renderer: Arc<dyn SlideRenderer> = match &config.puppy.display_helper {
        Some(helper) => Arc::new(HelperRenderer::new(helper)),
        None => Arc::new(LogRenderer::default()),
    };
    let rebooter = PolicyRebooter::new(session.api(), config.puppy.reboot_policy.clone());

    let mut puppy = Puppy::new(
        &config.puppy,
        &state.queue,
        prompt.as_ref(),
        renderer,
        &rebooter,
    );
    let outcome = puppy.run(&catalog, &mut executor);
    log::debug!(
        "Logout run went through: {}",
        puppy
            .history()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    match outcome? {
        PuppyOutcome::NothingQueued => {
            if !ctx.quiet {
                ui::info("Logout queue is empty; nothing to do");
            }
            Ok(())
        }
        PuppyOutcome::Cancelled => {
            ui::warn("Postponed by the user; queued items will run at the next logout");
            Ok(())
        }
        PuppyOutcome::Rebooted(report) => {
            if !ctx.quiet {
                print_report(&report);
            }
            if report.summary.has_failures() {
                bail!("{} queued action(s) failed", report.summary.failed);
            }
            Ok(())
        }
    }
}

fn print_report(report: &DrainReport) {
    for (entry, result) in &report.results {
        ui::apply_result(&entry.label(), result);
    }
    for entry in &report.dropped {
        ui::dim(&format!("Dropped {} (no longer in the catalog)", entry.label()));
    }
    if report.slideshow == Some(StopStatus::Abandoned) {
        ui::warn("Slideshow did not exit in time");
    }
    ui::info("Restarting");
}
