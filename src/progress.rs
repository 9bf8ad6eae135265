//! Terminal progress for sync runs.

use indicatif::{ProgressBar, ProgressStyle};
use lifecycle::ApplyResult;
use lifecycle::sync::ProgressCallback;

use crate::ui;

/// Progress bar over the immediate actions of a sync.
pub struct SyncProgress {
    bar: Option<ProgressBar>,
}

impl SyncProgress {
    pub fn new() -> Self {
        Self { bar: None }
    }
}

impl ProgressCallback for SyncProgress {
    fn on_start(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        let bar = ProgressBar::new(count as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        self.bar = Some(bar);
    }

    fn on_action_start(&mut self, label: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(label.to_string());
        }
    }

    fn on_action_complete(&mut self, label: &str, result: &ApplyResult) {
        match &self.bar {
            Some(bar) => {
                bar.suspend(|| ui::apply_result(label, result));
                bar.inc(1);
            }
            None => ui::apply_result(label, result),
        }
    }

    fn on_finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
