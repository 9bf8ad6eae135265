//! Logout queue: reboot-requiring actions deferred to logout time.
//!
//! The queue is a set keyed by basename, kept in enqueue order and persisted
//! as TOML. Every access goes through an advisory lock file so a sync running
//! during a drain can't interleave writes with it.

use crate::error::{Error, Result};
use crate::persist;
use crate::types::LogoutQueueEntry;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// In-memory contents of the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueState {
    #[serde(default)]
    entries: Vec<LogoutQueueEntry>,
}

impl QueueState {
    pub fn new(entries: Vec<LogoutQueueEntry>) -> Self {
        let mut state = Self::default();
        for entry in entries {
            state.enqueue(entry);
        }
        state
    }

    /// Add an entry, replacing any prior entry for the same basename.
    ///
    /// The new entry goes to the tail. Returns the replaced entry.
    pub fn enqueue(&mut self, entry: LogoutQueueEntry) -> Option<LogoutQueueEntry> {
        let replaced = self.remove(&entry.basename);
        self.entries.push(entry);
        replaced
    }

    pub fn remove(&mut self, basename: &str) -> Option<LogoutQueueEntry> {
        let idx = self.entries.iter().position(|e| e.basename == basename)?;
        Some(self.entries.remove(idx))
    }

    /// Remove `entry` only if the queue still holds that exact request.
    pub fn remove_matching(&mut self, entry: &LogoutQueueEntry) -> bool {
        match self.entries.iter().position(|e| e.same_request(entry)) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, basename: &str) -> Option<&LogoutQueueEntry> {
        self.entries.iter().find(|e| e.basename == basename)
    }

    /// Entries in enqueue order.
    pub fn entries(&self) -> &[LogoutQueueEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// File-backed logout queue.
#[derive(Debug, Clone)]
pub struct LogoutQueue {
    path: PathBuf,
    lock_path: PathBuf,
}

impl LogoutQueue {
    /// Queue stored as `logout-queue.toml` inside `state_dir`.
    pub fn in_dir(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join("logout-queue.toml"),
            lock_path: state_dir.join("logout-queue.lock"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the queue under a shared lock.
    pub fn read<T>(&self, operation: impl FnOnce(&QueueState) -> T) -> Result<T> {
        let lock_file = self.open_lock()?;
        FileExt::lock_shared(&lock_file).map_err(|e| Error::io(&self.lock_path, e))?;
        let state: QueueState = persist::load_or_default(&self.path)?;
        let result = operation(&state);
        drop(lock_file);
        Ok(result)
    }

    /// Current entries in enqueue order.
    pub fn snapshot(&self) -> Result<Vec<LogoutQueueEntry>> {
        self.read(|state| state.entries().to_vec())
    }

    /// Mutate the queue under an exclusive lock and persist the result.
    pub fn update<T>(&self, operation: impl FnOnce(&mut QueueState) -> T) -> Result<T> {
        let lock_file = self.open_lock()?;
        FileExt::lock_exclusive(&lock_file).map_err(|e| Error::io(&self.lock_path, e))?;
        let mut state: QueueState = persist::load_or_default(&self.path)?;
        let before = state.clone();
        let result = operation(&mut state);
        if state != before {
            persist::save_atomic(&self.path, &state)?;
        }
        drop(lock_file);
        Ok(result)
    }

    pub fn enqueue(&self, entry: LogoutQueueEntry) -> Result<Option<LogoutQueueEntry>> {
        log::info!("Queueing {} for logout", entry.label());
        self.update(|state| state.enqueue(entry))
    }

    /// Explicit dequeue by basename.
    pub fn dequeue(&self, basename: &str) -> Result<Option<LogoutQueueEntry>> {
        self.update(|state| state.remove(basename))
    }

    fn open_lock(&self) -> Result<File> {
        if let Some(dir) = self.lock_path.parent() {
            fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| Error::io(&self.lock_path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Edition, QueueAction};
    use tempfile::TempDir;

    fn entry(basename: &str, version: u32) -> LogoutQueueEntry {
        LogoutQueueEntry::new(basename, Edition::new(version, 0), QueueAction::Install)
    }

    #[test]
    fn test_enqueue_same_basename_keeps_latest() {
        let mut state = QueueState::default();
        state.enqueue(entry("app", 1));
        let replaced = state.enqueue(entry("app", 2));

        assert_eq!(replaced.unwrap().edition, Edition::new(1, 0));
        assert_eq!(state.len(), 1);
        assert_eq!(state.get("app").unwrap().edition, Edition::new(2, 0));
    }

    #[test]
    fn test_reenqueue_moves_to_tail() {
        let mut state = QueueState::default();
        state.enqueue(entry("a", 1));
        state.enqueue(entry("b", 1));
        state.enqueue(entry("a", 2));

        let order: Vec<_> = state.entries().iter().map(|e| e.basename.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn test_last_requested_action_wins() {
        let mut state = QueueState::default();
        state.enqueue(entry("app", 1));
        state.enqueue(LogoutQueueEntry::new(
            "app",
            Edition::new(1, 0),
            QueueAction::Uninstall,
        ));
        assert_eq!(state.len(), 1);
        assert_eq!(state.get("app").unwrap().action, QueueAction::Uninstall);
    }

    #[test]
    fn test_remove_matching_ignores_replaced_entry() {
        let mut state = QueueState::default();
        let old = entry("app", 1);
        state.enqueue(old.clone());
        state.enqueue(entry("app", 2));

        assert!(!state.remove_matching(&old));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_file_queue_persists_order() {
        let dir = TempDir::new().unwrap();
        let queue = LogoutQueue::in_dir(dir.path());

        queue.enqueue(entry("first", 1)).unwrap();
        queue.enqueue(entry("second", 3)).unwrap();

        let reopened = LogoutQueue::in_dir(dir.path());
        let entries = reopened.snapshot().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].basename, "first");
        assert_eq!(entries[1].basename, "second");
        assert_eq!(entries[1].edition, Edition::new(3, 0));
    }

    #[test]
    fn test_file_queue_enqueue_twice_leaves_one_entry() {
        let dir = TempDir::new().unwrap();
        let queue = LogoutQueue::in_dir(dir.path());

        queue.enqueue(entry("x", 1)).unwrap();
        queue.enqueue(entry("x", 2)).unwrap();

        let entries = queue.snapshot().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].edition, Edition::new(2, 0));
    }

    #[test]
    fn test_dequeue() {
        let dir = TempDir::new().unwrap();
        let queue = LogoutQueue::in_dir(dir.path());
        queue.enqueue(entry("x", 1)).unwrap();

        assert!(queue.dequeue("x").unwrap().is_some());
        assert!(queue.dequeue("x").unwrap().is_none());
        assert!(queue.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_empty_queue_without_file() {
        let dir = TempDir::new().unwrap();
        let queue = LogoutQueue::in_dir(&dir.path().join("nested"));
        assert!(queue.read(QueueState::is_empty).unwrap());
        assert!(!queue.path().exists());
    }
}
