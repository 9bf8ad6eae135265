use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use hostinfo::{HostInfo, LAST_SYNC, LAST_SYNC_RESULT};
use lifecycle::{InstallType, LogoutQueueEntry, Receipt};
use serde::Serialize;

use super::LocalState;
use crate::Context;
use crate::cli::StatusArgs;
use crate::config::Config;
use crate::ui;

#[derive(Serialize)]
struct Status {
    receipts: Vec<Receipt>,
    logout_queue: Vec<LogoutQueueEntry>,
    last_sync: Option<DateTime<Utc>>,
    last_sync_result: Option<String>,
}

pub fn run(_ctx: &Context, config: &Config, args: StatusArgs) -> Result<()> {
    let state = LocalState::open(config)?;
    let receipts = state.receipts()?;
    let logout_queue = state.queue.snapshot()?;

    let (last_sync, last_sync_result) = match HostInfo::open(config.hostinfo_file(&state.dir)) {
        Ok(info) => (
            info.get_date(LAST_SYNC).ok(),
            info.get_string(LAST_SYNC_RESULT).ok(),
        ),
        Err(e) => {
            log::warn!("Could not read host info: {e}");
            (None, None)
        }
    };

    let status = Status {
        receipts: receipts.iter().cloned().collect(),
        logout_queue,
        last_sync,
        last_sync_result,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    print_status(&status);
    Ok(())
}

fn print_status(status: &Status) {
    ui::header("kennel status");

    ui::section("Installed");
    if status.receipts.is_empty() {
        ui::dim("No receipts");
    }
    for receipt in &status.receipts {
        let kind = match receipt.install_type {
            InstallType::Live => "live".green(),
            InstallType::Pilot => "pilot".yellow(),
        };
        println!(
            "  {:<24} {:<10} {:<6} {}",
            receipt.basename,
            receipt.edition.to_string(),
            kind,
            receipt.installed_at.format("%Y-%m-%d").to_string().dimmed()
        );
    }

    ui::section("Logout queue");
    if status.logout_queue.is_empty() {
        ui::dim("Empty");
    }
    for (i, entry) in status.logout_queue.iter().enumerate() {
        println!("  {}. {}", i + 1, entry.label());
    }

    ui::section("Last sync");
    match &status.last_sync {
        Some(at) => ui::kv("When", &at.format("%Y-%m-%d %H:%M UTC").to_string()),
        None => ui::kv("When", &"never".yellow().to_string()),
    }
    if let Some(result) = &status.last_sync_result {
        let colored = if result == "ok" {
            result.green()
        } else {
            result.red()
        };
        ui::kv("Result", &colored.to_string());
    }
    println!();
}
