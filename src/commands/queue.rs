use anyhow::Result;
use colored::Colorize;
use lifecycle::Error;

use super::LocalState;
use crate::Context;
use crate::cli::QueueCommand;
use crate::config::Config;
use crate::ui;

pub fn run(ctx: &Context, config: &Config, cmd: QueueCommand) -> Result<()> {
    let state = LocalState::open(config)?;
    match cmd {
        QueueCommand::List => list(ctx, &state),
        QueueCommand::Remove { basename } => remove(ctx, &state, &basename),
    }
}

fn list(ctx: &Context, state: &LocalState) -> Result<()> {
    let entries = state.queue.snapshot()?;
    if entries.is_empty() {
        if !ctx.quiet {
            ui::info("Logout queue is empty");
        }
        return Ok(());
    }

    for (i, entry) in entries.iter().enumerate() {
        println!(
            "{:>3}. {} {}",
            i + 1,
            entry.label(),
            format!("(queued {})", entry.enqueued_at.format("%Y-%m-%d %H:%M")).dimmed()
        );
    }
    Ok(())
}

fn remove(ctx: &Context, state: &LocalState, basename: &str) -> Result<()> {
    match state.queue.dequeue(basename)? {
        Some(entry) => {
            if !ctx.quiet {
                ui::success(&format!("Removed {} from the logout queue", entry.label()));
            }
            Ok(())
        }
        None => Err(Error::NotFound(format!("{basename} is not in the logout queue")).into()),
    }
}
