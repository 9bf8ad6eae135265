use anyhow::{Result, bail};
use colored::Colorize;
use hostinfo::{HostInfo, Value};

use super::LocalState;
use crate::Context;
use crate::cli::InfoCommand;
use crate::config::Config;
use crate::ui;

pub fn run(ctx: &Context, config: &Config, cmd: InfoCommand) -> Result<()> {
    let state = LocalState::open(config)?;
    let mut info = HostInfo::open(config.hostinfo_file(&state.dir))?;

    match cmd {
        InfoCommand::Set { key, value, kind } => {
            let value = Value::parse(kind, &value)?;
            info.set(&key, value)?;
            if !ctx.quiet {
                ui::success(&format!("Set {key}"));
            }
        }
        InfoCommand::Delete { key } => {
            let old = info.delete(&key)?;
            if !ctx.quiet {
                ui::success(&format!("Deleted {key} (was {old})"));
            }
        }
        InfoCommand::List => {
            for (key, value) in info.list() {
                println!("{} = {} {}", key, value, format!("({})", value.kind()).dimmed());
            }
        }
        InfoCommand::Get(args) => {
            let key = lookup_key(&args)?;
            println!("{}", info.get(key)?);
        }
    }
    Ok(())
}

/// The fallback branch takes exactly one token: the key.
fn lookup_key(args: &[String]) -> Result<&str> {
    match args {
        [key] => Ok(key),
        [] => bail!("Missing key"),
        [key, ..] => bail!("Unknown info action '{key}'. Valid: set, delete, list, or a single KEY"),
    }
}
