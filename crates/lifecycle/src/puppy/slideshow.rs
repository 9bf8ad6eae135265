//! Slideshow worker.
//!
//! A background thread loops over a shuffled slide set until told to stop.
//! The installer pushes captions into a single-slot cell; the worker checks
//! it without blocking each time it advances, so a caption may be replaced
//! before it is ever shown. Nothing flows back to the installer.

use crate::error::Result;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use walkdir::WalkDir;

const SLIDE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "tiff", "heic"];

/// Draws one slide with its caption.
pub trait SlideRenderer: Send + Sync {
    /// `slide` is `None` when there are no images to show.
    fn show(&self, slide: Option<&Path>, caption: &str) -> Result<()>;

    /// Tear down the display.
    fn close(&self) {}
}

/// How the worker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStatus {
    /// Exited within the grace period
    Stopped,
    /// Did not exit in time and was detached
    Abandoned,
}

#[derive(Default)]
struct Mailbox {
    pending: Option<String>,
    stop: bool,
}

#[derive(Default)]
struct Shared {
    mailbox: Mutex<Mailbox>,
    wake: Condvar,
}

/// Handle to a running slideshow.
pub struct Slideshow {
    shared: Arc<Shared>,
    done: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl Slideshow {
    /// Start the worker. `default_caption` shows until the first post.
    pub fn start(
        renderer: Arc<dyn SlideRenderer>,
        slides: Vec<PathBuf>,
        interval: Duration,
        default_caption: impl Into<String>,
    ) -> Self {
        let shared = Arc::new(Shared::default());
        let (done_tx, done) = mpsc::channel();
        let worker = Arc::clone(&shared);
        let caption = default_caption.into();

        let handle = thread::Builder::new()
            .name("slideshow".to_string())
            .spawn(move || {
                run(&worker, renderer.as_ref(), slides, interval, caption);
                renderer.close();
                let _ = done_tx.send(());
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("Could not start slideshow: {e}");
                None
            }
        };

        Self {
            shared,
            done,
            handle,
        }
    }

    /// Replace the pending caption. Never blocks on the worker.
    pub fn post(&self, caption: impl Into<String>) {
        let caption = caption.into();
        log::debug!("Slideshow caption: {caption}");
        match self.shared.mailbox.lock() {
            Ok(mut mailbox) => mailbox.pending = Some(caption),
            Err(poisoned) => poisoned.into_inner().pending = Some(caption),
        }
    }

    /// Ask the worker to exit and wait up to `grace` for it.
    pub fn stop(mut self, grace: Duration) -> StopStatus {
        self.request_stop();
        let Some(handle) = self.handle.take() else {
            return StopStatus::Stopped;
        };

        match self.done.recv_timeout(grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    log::warn!("Slideshow worker exited abnormally");
                }
                StopStatus::Stopped
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Slideshow did not stop within {}s; detaching it",
                    grace.as_secs()
                );
                StopStatus::Abandoned
            }
        }
    }

    fn request_stop(&self) {
        match self.shared.mailbox.lock() {
            Ok(mut mailbox) => mailbox.stop = true,
            Err(poisoned) => poisoned.into_inner().stop = true,
        }
        self.shared.wake.notify_all();
    }
}

impl Drop for Slideshow {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.request_stop();
        }
    }
}

fn run(
    shared: &Shared,
    renderer: &dyn SlideRenderer,
    mut slides: Vec<PathBuf>,
    interval: Duration,
    mut caption: String,
) {
    let mut rng = rand::rng();
    loop {
        slides.shuffle(&mut rng);
        let deck: Vec<Option<&Path>> = if slides.is_empty() {
            vec![None]
        } else {
            slides.iter().map(|s| Some(s.as_path())).collect()
        };

        for slide in deck {
            // A busy mailbox means the installer is posting; keep the old caption
            if let Ok(mut mailbox) = shared.mailbox.try_lock() {
                if mailbox.stop {
                    return;
                }
                if let Some(next) = mailbox.pending.take() {
                    caption = next;
                }
            }

            if let Err(e) = renderer.show(slide, &caption) {
                log::debug!("Slide render failed: {e}");
            }

            let Ok(mailbox) = shared.mailbox.lock() else {
                return;
            };
            let Ok((mailbox, _)) = shared
                .wake
                .wait_timeout_while(mailbox, interval, |m| !m.stop)
            else {
                return;
            };
            if mailbox.stop {
                return;
            }
        }
    }
}

/// Image files directly inside `dir`, sorted by name.
pub fn discover_slides(dir: &Path) -> Vec<PathBuf> {
    let mut slides: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SLIDE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        })
        .collect();
    slides.sort();
    slides
}
