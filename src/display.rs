//! Slide renderers for the logout installer.

use lifecycle::puppy::SlideRenderer;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::Mutex;

/// Writes captions to the log. Used when no display helper is configured.
#[derive(Default)]
pub struct LogRenderer {
    last: Mutex<Option<String>>,
}

impl SlideRenderer for LogRenderer {
    fn show(&self, slide: Option<&Path>, caption: &str) -> lifecycle::Result<()> {
        if let Some(slide) = slide {
            log::debug!("slide {}", slide.display());
        }
        let mut last = self
            .last
            .lock()
            .map_err(|_| lifecycle::Error::Other("caption lock poisoned".to_string()))?;
        if last.as_deref() != Some(caption) {
            log::info!("{caption}");
            *last = Some(caption.to_string());
        }
        Ok(())
    }
}

/// Hands each slide to an external viewer.
///
/// The viewer is started as `<program> <caption> [image]` and replaced by
/// the next slide's process. `close` stops the last one.
pub struct HelperRenderer {
    program: PathBuf,
    current: Mutex<Option<Child>>,
}

impl HelperRenderer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            current: Mutex::new(None),
        }
    }
}

fn stop(child: &mut Child) {
    if let Ok(None) = child.try_wait() {
        let _ = child.kill();
    }
    let _ = child.wait();
}

impl SlideRenderer for HelperRenderer {
    fn show(&self, slide: Option<&Path>, caption: &str) -> lifecycle::Result<()> {
        let mut command = Command::new(&self.program);
        command.arg(caption);
        if let Some(slide) = slide {
            command.arg(slide);
        }
        let next = command
            .spawn()
            .map_err(|e| lifecycle::Error::io(&self.program, e))?;

        let mut current = self
            .current
            .lock()
            .map_err(|_| lifecycle::Error::Other("viewer lock poisoned".to_string()))?;
        if let Some(mut previous) = current.replace(next) {
            stop(&mut previous);
        }
        Ok(())
    }

    fn close(&self) {
        if let Ok(mut current) = self.current.lock()
            && let Some(mut child) = current.take()
        {
            stop(&mut child);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
