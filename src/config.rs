//! Agent configuration, loaded from a TOML file.
//!
//! ```toml
//! machine_name = "lab-01"
//!
//! [api]
//! base_url = "https://mdm.example.com/api"
//! token_env = "KENNEL_API_TOKEN"
//!
//! [distribution_point]
//! kind = "smb"
//! url = "//svc@files.example.com/packages"
//! mount_point = "/Volumes/kennel"
//!
//! [sync]
//! default_expiration_days = 90
//!
//! [puppy]
//! reboot_policy = "restart"
//! ```

use anyhow::{Context, Result, bail};
use lifecycle::ReconcileConfig;
use lifecycle::backend::{DistributionPoint, HttpApi, LocalShare, SmbShare};
use lifecycle::puppy::PuppyConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Name the management server knows this machine by
    pub machine_name: Option<String>,
    /// Volume packages are installed onto
    pub target_drive: Option<PathBuf>,
    pub api: ApiConfig,
    pub distribution_point: DistributionPointConfig,
    pub paths: PathsConfig,
    pub sync: ReconcileConfig,
    pub puppy: PuppyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: String,
    /// Environment variable holding the bearer token
    pub token_env: Option<String>,
    pub timeout_secs: u64,
    /// Local management agent used to run policies
    pub policy_agent: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token_env: None,
            timeout_secs: 30,
            policy_agent: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareKind {
    #[default]
    Local,
    Smb,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DistributionPointConfig {
    pub kind: ShareKind,
    /// Directory holding `Packages/` and `Scripts/` (local)
    pub path: Option<PathBuf>,
    /// `//user@host/share` (smb)
    pub url: Option<String>,
    pub mount_point: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub state_dir: Option<PathBuf>,
    pub usage_db: Option<PathBuf>,
    pub hostinfo: Option<PathBuf>,
}

impl Config {
    /// Load from the resolved config file. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn state_dir(&self) -> Result<PathBuf> {
        paths::state_dir(self.paths.state_dir.as_deref())
    }

    pub fn usage_db(&self, state_dir: &Path) -> PathBuf {
        self.paths
            .usage_db
            .as_ref()
            .map(|p| paths::expand(&p.to_string_lossy()))
            .unwrap_or_else(|| paths::usage_db(state_dir))
    }

    pub fn hostinfo_file(&self, state_dir: &Path) -> PathBuf {
        self.paths
            .hostinfo
            .as_ref()
            .map(|p| paths::expand(&p.to_string_lossy()))
            .unwrap_or_else(|| paths::hostinfo_file(state_dir))
    }

    pub fn target_drive(&self) -> PathBuf {
        self.target_drive
            .clone()
            .unwrap_or_else(|| PathBuf::from("/"))
    }

    /// Configured machine name, else the system computer name.
    pub fn machine_name(&self) -> Result<String> {
        if let Some(name) = &self.machine_name {
            return Ok(name.clone());
        }
        computer_name()
    }

    /// Build the management API client.
    pub fn api_client(&self) -> Result<HttpApi> {
        if self.api.base_url.is_empty() {
            bail!("[api] base_url is not configured");
        }
        let token = match &self.api.token_env {
            Some(var) => Some(
                std::env::var(var).with_context(|| format!("API token variable {var} is not set"))?,
            ),
            None => None,
        };
        let mut api = HttpApi::new(&self.api.base_url, Duration::from_secs(self.api.timeout_secs))
            .with_token(token);
        if let Some(agent) = &self.api.policy_agent {
            api = api.with_policy_agent(agent);
        }
        Ok(api)
    }

    /// Build the configured distribution point (not yet mounted).
    pub fn distribution_point(&self) -> Result<Box<dyn DistributionPoint>> {
        let dp = &self.distribution_point;
        match dp.kind {
            ShareKind::Local => {
                let path = dp
                    .path
                    .as_ref()
                    .context("[distribution_point] path is required for a local share")?;
                Ok(Box::new(LocalShare::new(paths::expand(&path.to_string_lossy()))))
            }
            ShareKind::Smb => {
                let url = dp
                    .url
                    .as_ref()
                    .context("[distribution_point] url is required for an smb share")?;
                let mount_point = dp
                    .mount_point
                    .clone()
                    .unwrap_or_else(|| PathBuf::from("/Volumes/kennel"));
                Ok(Box::new(SmbShare::new(url, mount_point)))
            }
        }
    }
}

fn computer_name() -> Result<String> {
    #[cfg(target_os = "macos")]
    let output = std::process::Command::new("/usr/sbin/scutil")
        .args(["--get", "ComputerName"])
        .output();
    #[cfg(not(target_os = "macos"))]
    let output = std::process::Command::new("hostname").output();

    let output = output.context("Could not determine the computer name")?;
    let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !output.status.success() || name.is_empty() {
        bail!("Could not determine the computer name; set machine_name in the config");
    }
    Ok(name)
}

// ============================================================================
// Tests
// ============================================================================
