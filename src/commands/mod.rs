pub mod info;
pub mod install;
pub mod puppy;
pub mod queue;
pub mod status;
pub mod sync;

use anyhow::{Context, Result};
use lifecycle::backend::ScriptContext;
use lifecycle::{LogoutQueue, ReceiptStore};
use std::path::PathBuf;

use crate::config::Config;
use crate::paths;

/// Machine-local state: receipts and the logout queue.
pub struct LocalState {
    pub dir: PathBuf,
    pub queue: LogoutQueue,
}

impl LocalState {
    pub fn open(config: &Config) -> Result<Self> {
        let dir = config.state_dir()?;
        log::debug!("State dir: {}", dir.display());
        Ok(Self {
            queue: LogoutQueue::in_dir(&dir),
            dir,
        })
    }

    pub fn receipts(&self) -> Result<ReceiptStore> {
        let path = paths::receipts_file(&self.dir);
        ReceiptStore::load(&path).with_context(|| format!("Could not load receipts from {}", path.display()))
    }
}

/// Script arguments for runs started from the command line.
pub fn script_context(config: &Config, computer_name: &str) -> ScriptContext {
    ScriptContext {
        target_drive: config.target_drive(),
        computer_name: computer_name.to_string(),
        user: std::env::var("USER").unwrap_or_default(),
    }
}
