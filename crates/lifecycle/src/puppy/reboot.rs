use crate::backend::ManagementApi;
use crate::error::{Error, Result};
use std::path::PathBuf;
use std::process::Command;

/// Restarts the machine at the end of a logout run.
pub trait Rebooter {
    fn reboot(&self) -> Result<()>;
}

/// Runs the configured reboot policy, falling back to an immediate restart.
pub struct PolicyRebooter<'a> {
    api: &'a dyn ManagementApi,
    policy: Option<String>,
    shutdown: PathBuf,
}

impl<'a> PolicyRebooter<'a> {
    pub fn new(api: &'a dyn ManagementApi, policy: Option<String>) -> Self {
        Self {
            api,
            policy,
            shutdown: PathBuf::from("/sbin/shutdown"),
        }
    }

    fn restart_now(&self) -> Result<()> {
        log::warn!("Restarting now");
        let status = Command::new(&self.shutdown)
            .args(["-r", "now"])
            .status()
            .map_err(|e| Error::io(&self.shutdown, e))?;
        if !status.success() {
            return Err(Error::Other(format!("shutdown exited with {status}")));
        }
        Ok(())
    }
}

impl Rebooter for PolicyRebooter<'_> {
    fn reboot(&self) -> Result<()> {
        if let Some(policy) = &self.policy {
            match self.api.run_policy(policy) {
                Ok(true) => {
                    log::info!("Reboot handed to policy {policy}");
                    return Ok(());
                }
                Ok(false) => log::warn!("Reboot policy {policy} failed"),
                Err(e) => log::warn!("Reboot policy {policy} could not run: {e}"),
            }
        }
        self.restart_now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeApi;

    #[test]
    fn test_successful_policy_skips_shutdown() {
        let api = FakeApi {
            policy_succeeds: true,
            ..Default::default()
        };
        let mut rebooter = PolicyRebooter::new(&api, Some("restart".to_string()));
        rebooter.shutdown = PathBuf::from("/nonexistent/shutdown");

        assert!(rebooter.reboot().is_ok());
        assert_eq!(api.policies.lock().unwrap().as_slice(), ["restart"]);
    }

    #[test]
    fn test_failed_policy_falls_back_to_shutdown() {
        let api = FakeApi::default();
        let mut rebooter = PolicyRebooter::new(&api, Some("restart".to_string()));
        rebooter.shutdown = PathBuf::from("/nonexistent/shutdown");

        // Reaching the shutdown binary proves the fallback ran
        let err = rebooter.reboot().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/shutdown"));
    }

    #[test]
    fn test_no_policy_goes_straight_to_shutdown() {
        let api = FakeApi {
            policy_succeeds: true,
            ..Default::default()
        };
        let mut rebooter = PolicyRebooter::new(&api, None);
        rebooter.shutdown = PathBuf::from("/nonexistent/shutdown");

        assert!(rebooter.reboot().is_err());
        assert!(api.policies.lock().unwrap().is_empty());
    }
}
