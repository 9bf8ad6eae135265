mod cli;
mod commands;
mod config;
mod display;
mod paths;
mod progress;
mod prompt;
mod session;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::Config;
use lifecycle::ErrorCategory;
use std::io;
use std::process::ExitCode;

/// Exit code for lookups of things that don't exist.
const EXIT_NOT_FOUND: u8 = 2;
/// Exit code for any other failed run.
const EXIT_FAILURE: u8 = 12;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.debug {
            log::LevelFilter::Debug.max(log_level)
        } else if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match run(&ctx, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            if let Some(advice) = advice(&e) {
                ui::dim(advice);
            }
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(ctx: &Context, command: Command) -> Result<()> {
    if let Command::Completions { shell } = command {
        generate(shell, &mut Cli::command(), "kennel", &mut io::stdout());
        return Ok(());
    }

    let config = Config::load()?;
    log::debug!("verbosity {}", ctx.verbose);

    match command {
        Command::Sync(args) => commands::sync::run(ctx, &config, args),
        Command::Puppy(args) => commands::puppy::run(ctx, &config, args),
        Command::Status(args) => commands::status::run(ctx, &config, args),
        Command::Queue(cmd) => commands::queue::run(ctx, &config, cmd),
        Command::Install(args) => commands::install::install(ctx, &config, args),
        Command::Uninstall(args) => commands::install::uninstall(ctx, &config, args),
        Command::Info(cmd) => commands::info::run(ctx, &config, cmd),
        Command::Completions { .. } => Ok(()),
    }
}

/// `2` when anything in the chain is a not-found failure, else `12`.
fn exit_code(err: &anyhow::Error) -> u8 {
    let not_found = err.chain().any(|cause| {
        cause
            .downcast_ref::<hostinfo::Error>()
            .is_some_and(hostinfo::Error::is_not_found)
            || cause
                .downcast_ref::<lifecycle::Error>()
                .is_some_and(|e| e.category() == ErrorCategory::NotFound)
    });
    if not_found {
        EXIT_NOT_FOUND
    } else {
        EXIT_FAILURE
    }
}

/// Hint for the first lifecycle error in the chain.
fn advice(err: &anyhow::Error) -> Option<&'static str> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<lifecycle::Error>())
        .map(|e| e.category().advice())
}
