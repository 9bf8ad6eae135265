//! Shared resources for one run.
//!
//! A session owns the management API client and, once mounted, the
//! distribution point. Dropping it unmounts the share and then disconnects
//! the API, on every exit path.

use anyhow::{Context, Result};
use lifecycle::backend::{HttpApi, ManagementApi, MountedShare};

use crate::config::Config;

pub struct Session {
    api: HttpApi,
    share: Option<MountedShare>,
}

impl Session {
    pub fn connect(config: &Config) -> Result<Self> {
        let api = config.api_client()?;
        log::debug!("Using management API at {}", api.base_url());
        Ok(Self { api, share: None })
    }

    pub fn api(&self) -> &HttpApi {
        &self.api
    }

    /// Mount the configured distribution point, once.
    pub fn mount(&mut self, config: &Config) -> Result<&MountedShare> {
        if self.share.is_none() {
            let point = config.distribution_point()?;
            let share = MountedShare::mount(point).context("Could not mount the distribution point")?;
            self.share = Some(share);
        }
        self.share
            .as_ref()
            .context("distribution point is not mounted")
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        drop(self.share.take());
        self.api.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DistributionPointConfig, ShareKind};
    use std::fs;
    use tempfile::TempDir;

    fn config(share: &TempDir) -> Config {
        let mut config = Config::default();
        config.api.base_url = "http://127.0.0.1:9/api".to_string();
        config.distribution_point = DistributionPointConfig {
            kind: ShareKind::Local,
            path: Some(share.path().to_path_buf()),
            ..Default::default()
        };
        config
    }

    #[test]
    fn test_mount_local_share_once() {
        let share = TempDir::new().unwrap();
        fs::create_dir(share.path().join("Packages")).unwrap();
        let config = config(&share);

        let mut session = Session::connect(&config).unwrap();
        let packages = session.mount(&config).unwrap().packages_dir();
        assert_eq!(packages, share.path().join("Packages"));
        let again = session.mount(&config).unwrap().root().to_path_buf();
        assert_eq!(again, share.path());
    }

    #[test]
    fn test_missing_local_share_fails_to_mount() {
        let share = TempDir::new().unwrap();
        let mut config = config(&share);
        config.distribution_point.path = Some(share.path().join("absent"));

        let mut session = Session::connect(&config).unwrap();
        assert!(session.mount(&config).is_err());
    }
}
