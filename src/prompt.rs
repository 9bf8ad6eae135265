//! Opt-out prompts shown before a logout install starts.

use lifecycle::LogoutQueueEntry;
use lifecycle::puppy::{OptOutPrompt, PromptAnswer};
use std::path::PathBuf;
use std::process::Command;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Text shown to the user.
pub fn message(queued: &[LogoutQueueEntry], timeout: Duration) -> String {
    let mut text = format!(
        "{} will be applied and this computer will restart in {} seconds:",
        if queued.len() == 1 {
            "1 update".to_string()
        } else {
            format!("{} updates", queued.len())
        },
        timeout.as_secs()
    );
    for entry in queued {
        text.push_str("\n  ");
        text.push_str(&entry.label());
    }
    text
}

/// Asks on the controlling terminal.
///
/// With nobody at the terminal the prompt counts as timed out straight away.
pub struct ConsolePrompt;

impl OptOutPrompt for ConsolePrompt {
    fn ask(&self, queued: &[LogoutQueueEntry], timeout: Duration) -> lifecycle::Result<PromptAnswer> {
        if !console::user_attended() {
            log::info!("No terminal attached; not waiting for an answer");
            return Ok(PromptAnswer::TimedOut);
        }

        println!("{}", message(queued, timeout));
        let (tx, rx) = mpsc::channel();
        // The reader stays blocked on stdin after a timeout; the process
        // reboots shortly after so it is never joined.
        thread::spawn(move || {
            let answer = dialoguer::Confirm::new()
                .with_prompt("Install now?")
                .default(true)
                .interact();
            let _ = tx.send(answer);
        });

        match rx.recv_timeout(timeout) {
            Ok(Ok(true)) => Ok(PromptAnswer::Proceed),
            Ok(Ok(false)) => Ok(PromptAnswer::Cancel),
            Ok(Err(e)) => Err(lifecycle::Error::Other(format!("prompt failed: {e}"))),
            Err(_) => Ok(PromptAnswer::TimedOut),
        }
    }
}

/// Asks through an external dialog program.
///
/// The program is called as `<program> <timeout-secs> <message>`. Exit 0
/// proceeds, exit 1 cancels, anything else counts as no answer. It is
/// killed if it outlives the timeout.
pub struct HelperPrompt {
    program: PathBuf,
}

impl HelperPrompt {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl OptOutPrompt for HelperPrompt {
    fn ask(&self, queued: &[LogoutQueueEntry], timeout: Duration) -> lifecycle::Result<PromptAnswer> {
        let mut child = Command::new(&self.program)
            .arg(timeout.as_secs().to_string())
            .arg(message(queued, timeout))
            .spawn()
            .map_err(|e| lifecycle::Error::io(&self.program, e))?;

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|e| lifecycle::Error::io(&self.program, e))?
            {
                return Ok(match status.code() {
                    Some(0) => PromptAnswer::Proceed,
                    Some(1) => PromptAnswer::Cancel,
                    _ => PromptAnswer::TimedOut,
                });
            }
            if Instant::now() >= deadline {
                log::info!("Prompt helper did not answer in {}s", timeout.as_secs());
                if let Err(e) = child.kill() {
                    log::warn!("Could not stop prompt helper: {e}");
                }
                let _ = child.wait();
                return Ok(PromptAnswer::TimedOut);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
