//! Logout installer.
//!
//! Drains the logout queue while a slideshow covers the screen, then reboots.
//!
//! ```text
//! Idle -> OptOutPrompt -> SlideshowRunning -> Draining -> Finishing -> Rebooting
//! ```
//!
//! An empty queue ends the run at `Idle`; a cancel at the prompt ends it at
//! `OptOutPrompt`. Once `Draining` is entered the machine always reboots.

mod reboot;
mod slideshow;

pub use reboot::{PolicyRebooter, Rebooter};
pub use slideshow::{SlideRenderer, Slideshow, StopStatus, discover_slides};

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::executor::{ApplyResult, ExecuteSummary, Executor};
use crate::queue::LogoutQueue;
use crate::types::{LogoutQueueEntry, Package};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Logout installer settings, loaded from the `[puppy]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PuppyConfig {
    /// How long the user has to cancel
    pub opt_out_timeout_secs: u64,
    /// Time each slide stays up
    pub slide_interval_secs: u64,
    /// How long the final message stays up before rebooting
    pub finish_hold_secs: u64,
    /// How long to wait for the slideshow to exit
    pub stop_grace_secs: u64,
    pub slides_dir: Option<PathBuf>,
    pub default_caption: String,
    /// `{name}` is replaced with the package label
    pub installing_caption: String,
    pub done_caption: String,
    /// Policy that performs the reboot; restart directly if unset or failing
    pub reboot_policy: Option<String>,
    /// External prompt program; the terminal is used when unset
    pub prompt_helper: Option<PathBuf>,
    /// External slide display program; captions are logged when unset
    pub display_helper: Option<PathBuf>,
}

impl Default for PuppyConfig {
    fn default() -> Self {
        Self {
            opt_out_timeout_secs: 60,
            slide_interval_secs: 8,
            finish_hold_secs: 10,
            stop_grace_secs: 5,
            slides_dir: None,
            default_caption: "Installing updates. Please don't turn off your computer.".to_string(),
            installing_caption: "Now installing {name}".to_string(),
            done_caption: "All done. Restarting...".to_string(),
            reboot_policy: None,
            prompt_helper: None,
            display_helper: None,
        }
    }
}

impl PuppyConfig {
    pub fn opt_out_timeout(&self) -> Duration {
        Duration::from_secs(self.opt_out_timeout_secs)
    }

    pub fn slide_interval(&self) -> Duration {
        Duration::from_secs(self.slide_interval_secs)
    }

    pub fn finish_hold(&self) -> Duration {
        Duration::from_secs(self.finish_hold_secs)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    pub fn installing(&self, package: &Package) -> String {
        self.installing_caption.replace("{name}", &package.label())
    }
}

/// Run states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PuppyState {
    Idle,
    OptOutPrompt,
    SlideshowRunning,
    Draining,
    Finishing,
    Rebooting,
}

impl fmt::Display for PuppyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::OptOutPrompt => "opt-out prompt",
            Self::SlideshowRunning => "slideshow running",
            Self::Draining => "draining",
            Self::Finishing => "finishing",
            Self::Rebooting => "rebooting",
        };
        f.write_str(name)
    }
}

/// The user's response to the opt-out prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAnswer {
    Proceed,
    Cancel,
    TimedOut,
}

/// Timed cancel prompt shown before anything is installed.
pub trait OptOutPrompt {
    fn ask(&self, queued: &[LogoutQueueEntry], timeout: Duration) -> Result<PromptAnswer>;
}

/// What happened during the drain.
#[derive(Debug, Clone, Default)]
pub struct DrainReport {
    /// Each applied entry and its outcome, in queue order
    pub results: Vec<(LogoutQueueEntry, ApplyResult)>,
    /// Entries whose edition left the catalog
    pub dropped: Vec<LogoutQueueEntry>,
    pub summary: ExecuteSummary,
    pub slideshow: Option<StopStatus>,
}

/// How a run ended.
#[derive(Debug, Clone)]
pub enum PuppyOutcome {
    NothingQueued,
    Cancelled,
    Rebooted(DrainReport),
}

/// The logout queue runner.
pub struct Puppy<'a> {
    config: &'a PuppyConfig,
    queue: &'a LogoutQueue,
    prompt: &'a dyn OptOutPrompt,
    renderer: Arc<dyn SlideRenderer>,
    rebooter: &'a dyn Rebooter,
    history: Vec<PuppyState>,
}

impl<'a> Puppy<'a> {
    pub fn new(
        config: &'a PuppyConfig,
        queue: &'a LogoutQueue,
        prompt: &'a dyn OptOutPrompt,
        renderer: Arc<dyn SlideRenderer>,
        rebooter: &'a dyn Rebooter,
    ) -> Self {
        Self {
            config,
            queue,
            prompt,
            renderer,
            rebooter,
            history: vec![PuppyState::Idle],
        }
    }

    /// States visited so far, starting at `Idle`.
    pub fn history(&self) -> &[PuppyState] {
        &self.history
    }

    pub fn state(&self) -> PuppyState {
        self.history.last().copied().unwrap_or(PuppyState::Idle)
    }

    /// Run to completion.
    ///
    /// Errors before `Draining` end the run without a reboot. Errors and
    /// panics during the drain are returned only after the reboot has been
    /// issued.
    pub fn run(&mut self, catalog: &Catalog, executor: &mut Executor<'_>) -> Result<PuppyOutcome> {
        let queued = self.queue.snapshot()?;
        if queued.is_empty() {
            log::info!("Logout queue is empty; nothing to do");
            return Ok(PuppyOutcome::NothingQueued);
        }
        log::info!("{} item(s) queued for logout", queued.len());

        self.enter(PuppyState::OptOutPrompt);
        let answer = match self.prompt.ask(&queued, self.config.opt_out_timeout()) {
            Ok(answer) => answer,
            Err(e) => {
                log::warn!("Opt-out prompt failed ({e}); proceeding");
                PromptAnswer::TimedOut
            }
        };
        if answer == PromptAnswer::Cancel {
            log::info!("User cancelled the logout install");
            return Ok(PuppyOutcome::Cancelled);
        }

        self.enter(PuppyState::SlideshowRunning);
        let slides = self
            .config
            .slides_dir
            .as_deref()
            .map(discover_slides)
            .unwrap_or_default();
        let slideshow = Slideshow::start(
            Arc::clone(&self.renderer),
            slides,
            self.config.slide_interval(),
            self.config.default_caption.clone(),
        );

        self.enter(PuppyState::Draining);
        let drained = panic::catch_unwind(AssertUnwindSafe(|| {
            self.drain(catalog, executor, &slideshow)
        }))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            log::error!("Drain aborted: {message}");
            Err(Error::Other(format!("drain aborted: {message}")))
        });

        self.enter(PuppyState::Finishing);
        slideshow.post(self.config.done_caption.clone());
        thread::sleep(self.config.finish_hold());
        let stopped = slideshow.stop(self.config.stop_grace());

        self.enter(PuppyState::Rebooting);
        let rebooted = self.rebooter.reboot();

        let mut report = drained?;
        rebooted?;
        report.slideshow = Some(stopped);
        Ok(PuppyOutcome::Rebooted(report))
    }

    fn enter(&mut self, state: PuppyState) {
        log::debug!("{} -> {state}", self.state());
        self.history.push(state);
    }

    fn drain(
        &self,
        catalog: &Catalog,
        executor: &mut Executor<'_>,
        slideshow: &Slideshow,
    ) -> Result<DrainReport> {
        let mut report = DrainReport::default();

        for entry in self.queue.snapshot()? {
            if catalog.has_rejected(&entry.basename) {
                log::warn!(
                    "Leaving {} queued: its catalog entry is unreadable",
                    entry.label()
                );
                continue;
            }
            let Some(package) = catalog.find(&entry.basename, entry.edition) else {
                log::info!(
                    "Dropping queued {}: edition no longer in the catalog",
                    entry.label()
                );
                self.dequeue(&entry);
                report.dropped.push(entry);
                continue;
            };

            slideshow.post(self.config.installing(package));
            let result = executor.apply(entry.action, package);
            report.summary.add_result(&result);
            self.dequeue(&entry);
            report.results.push((entry, result));
        }

        Ok(report)
    }

    fn dequeue(&self, entry: &LogoutQueueEntry) {
        if let Err(e) = self.queue.update(|state| state.remove_matching(entry)) {
            log::error!("Could not dequeue {}: {e}", entry.label());
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
