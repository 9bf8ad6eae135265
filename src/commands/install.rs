//! Manual install and uninstall.
//!
//! Packages that need a restart go to the logout queue instead of being
//! applied now.

use anyhow::{Context as _, Result, bail};
use lifecycle::backend::{ManagementApi, PkgInstaller, ShellScripts};
use lifecycle::{
    ApplyResult, Catalog, Edition, Error, Executor, LogoutQueueEntry, Package, PackageStatus,
    QueueAction,
};

use super::{LocalState, script_context};
use crate::Context;
use crate::cli::{InstallArgs, UninstallArgs};
use crate::config::Config;
use crate::session::Session;
use crate::ui;

pub fn install(ctx: &Context, config: &Config, args: InstallArgs) -> Result<()> {
    let state = LocalState::open(config)?;
    let mut session = Session::connect(config)?;
    let catalog = session.api().fetch_catalog().context("Could not fetch the catalog")?;

    let package = choose_edition(&catalog, &args.basename, args.edition)?.clone();
    apply(ctx, config, &state, &mut session, QueueAction::Install, &package)
}

pub fn uninstall(ctx: &Context, config: &Config, args: UninstallArgs) -> Result<()> {
    let state = LocalState::open(config)?;
    let receipts = state.receipts()?;
    let receipt = receipts
        .get(&args.basename)
        .ok_or_else(|| Error::NotFound(format!("{} is not installed", args.basename)))?
        .clone();

    let mut session = Session::connect(config)?;
    let catalog = session.api().fetch_catalog().context("Could not fetch the catalog")?;
    let package = catalog
        .find(&receipt.basename, receipt.edition)
        .ok_or_else(|| {
            Error::NotFound(format!("{} is no longer in the catalog", receipt.label()))
        })?
        .clone();
    if !package.uninstallable {
        bail!("{} is not marked uninstallable", package.label());
    }

    apply(ctx, config, &state, &mut session, QueueAction::Uninstall, &package)
}

/// The named edition, or the live one. Deprecated editions are refused.
fn choose_edition<'c>(
    catalog: &'c Catalog,
    basename: &str,
    edition: Option<Edition>,
) -> Result<&'c Package> {
    let package = match edition {
        Some(edition) => catalog
            .find(basename, edition)
            .ok_or_else(|| Error::NotFound(format!("{basename}@{edition}")))?,
        None => catalog
            .live(basename)?
            .ok_or_else(|| Error::NotFound(format!("no live edition of {basename}")))?,
    };
    if package.status == PackageStatus::Deprecated {
        bail!("{} is deprecated and can't be installed", package.label());
    }
    Ok(package)
}

fn apply(
    ctx: &Context,
    config: &Config,
    state: &LocalState,
    session: &mut Session,
    kind: QueueAction,
    package: &Package,
) -> Result<()> {
    if package.needs_reboot {
        let entry = LogoutQueueEntry::new(package.basename.clone(), package.edition, kind);
        let label = entry.label();
        state.queue.enqueue(entry)?;
        if !ctx.quiet {
            ui::info(&format!("{label} needs a restart; queued for logout"));
        }
        return Ok(());
    }

    let machine = config.machine_name()?;
    let share = session.mount(config)?;
    let packages_dir = share.packages_dir();
    let scripts = ShellScripts::new(share.scripts_dir());
    let installer = PkgInstaller::new();
    let mut receipts = state.receipts()?;
    let mut executor = Executor::new(&installer, &scripts, &mut receipts, packages_dir)
        .with_context(script_context(config, &machine));

    let label = format!("{kind} {}", package.label());
    let result = executor.apply(kind, package);
    ui::apply_result(&label, &result);
    match result {
        ApplyResult::Failed { error } => bail!("{label} failed: {error}"),
        _ => Ok(()),
    }
}
