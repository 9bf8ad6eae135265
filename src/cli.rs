use clap::{Parser, Subcommand};
use clap_complete::Shell;
use hostinfo::ValueKind;
use lifecycle::Edition;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kennel")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Keeps this machine's packages in line with the fleet catalog", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Reconcile installed packages against the server catalog
    Sync(SyncArgs),

    /// Apply queued logout installs, then restart
    Puppy(PuppyArgs),

    /// Show receipts, queued logout actions and the last sync
    Status(StatusArgs),

    /// Inspect or edit the logout queue
    #[command(subcommand)]
    Queue(QueueCommand),

    /// Install a package now (or at logout if it needs a restart)
    Install(InstallArgs),

    /// Remove a package now (or at logout if it needs a restart)
    Uninstall(UninstallArgs),

    /// Read and write the host info record
    #[command(subcommand)]
    Info(InfoCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args)]
pub struct SyncArgs {
    /// Show the plan without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(clap::Args)]
pub struct PuppyArgs {
    /// Volume to install onto
    pub target_drive: PathBuf,

    /// Computer name passed to package scripts
    pub computer_name: String,

    /// User who is logging out
    pub user: String,
}

#[derive(clap::Args)]
pub struct StatusArgs {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum QueueCommand {
    /// List queued actions in the order they will run
    List,

    /// Drop a queued action
    Remove {
        /// Package basename
        basename: String,
    },
}

#[derive(clap::Args)]
pub struct InstallArgs {
    /// Package basename
    pub basename: String,

    /// Specific edition (e.g. 2.1) instead of the live one
    #[arg(long)]
    pub edition: Option<Edition>,
}

#[derive(clap::Args)]
pub struct UninstallArgs {
    /// Package basename
    pub basename: String,
}

/// `kennel info <set|delete|list> ...` or `kennel info <KEY>`.
///
/// Anything that isn't a known action is taken as a key to read.
#[derive(Subcommand)]
pub enum InfoCommand {
    /// Write a value
    Set {
        key: String,
        value: String,

        /// Value type: string, integer, real, date, bool
        #[arg(short = 't', long = "type", default_value = "string")]
        kind: ValueKind,
    },

    /// Remove a key
    Delete { key: String },

    /// List every key
    List,

    #[command(external_subcommand)]
    Get(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_puppy_positionals() {
        let cli = Cli::try_parse_from(["kennel", "--debug", "puppy", "/", "lab-01", "sam"]).unwrap();
        assert!(cli.debug);
        match cli.command {
            Command::Puppy(args) => {
                assert_eq!(args.target_drive, PathBuf::from("/"));
                assert_eq!(args.computer_name, "lab-01");
                assert_eq!(args.user, "sam");
            }
            _ => panic!("expected puppy"),
        }
    }

    #[test]
    fn test_info_known_action() {
        let cli = Cli::try_parse_from(["kennel", "info", "set", "floor", "3", "--type", "int"]).unwrap();
        match cli.command {
            Command::Info(InfoCommand::Set { key, value, kind }) => {
                assert_eq!(key, "floor");
                assert_eq!(value, "3");
                assert_eq!(kind, ValueKind::Integer);
            }
            _ => panic!("expected info set"),
        }
    }

    #[test]
    fn test_info_unknown_token_is_a_key() {
        let cli = Cli::try_parse_from(["kennel", "info", "asset_tag"]).unwrap();
        match cli.command {
            Command::Info(InfoCommand::Get(args)) => assert_eq!(args, vec!["asset_tag"]),
            _ => panic!("expected info lookup"),
        }
    }

    #[test]
    fn test_install_edition_parses() {
        let cli = Cli::try_parse_from(["kennel", "install", "office", "--edition", "16.2"]).unwrap();
        match cli.command {
            Command::Install(args) => assert_eq!(args.edition, Some(Edition::new(16, 2))),
            _ => panic!("expected install"),
        }
    }
}
