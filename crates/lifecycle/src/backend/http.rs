//! HTTP management API client.
//!
//! Catalog and group membership come from the server's JSON endpoints.
//! Policies run through the local policy agent, which talks to the server
//! on its own.

use crate::backend::ManagementApi;
use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::scope::GroupMembership;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

const USER_AGENT: &str = concat!("kennel/", env!("CARGO_PKG_VERSION"));

/// Management API reached over HTTPS.
pub struct HttpApi {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
    policy_agent: PathBuf,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: config.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            policy_agent: PathBuf::from("/usr/local/bin/jamf"),
        }
    }

    /// Send `Authorization: Bearer <token>` with every request.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Binary used for `run_policy`.
    #[must_use]
    pub fn with_policy_agent(mut self, path: impl Into<PathBuf>) -> Self {
        self.policy_agent = path.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn get(&self, endpoint: &str) -> ureq::RequestBuilder<ureq::typestate::WithoutBody> {
        let request = self
            .agent
            .get(&self.url(endpoint))
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT);
        match &self.token {
            Some(token) => request.header("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }
}

impl ManagementApi for HttpApi {
    fn fetch_catalog(&self) -> Result<Catalog> {
        log::debug!("Fetching catalog from {}", self.base_url);
        let entries: Vec<serde_json::Value> = self.get("packages").call()?.body_mut().read_json()?;
        let catalog = Catalog::from_json(entries);
        log::debug!(
            "Catalog has {} editions, {} unreadable",
            catalog.len(),
            catalog.rejected().len()
        );
        Ok(catalog)
    }

    fn fetch_group_membership(&self, machine: &str) -> Result<GroupMembership> {
        let groups: Vec<String> = self
            .get("groups")
            .query("computer", machine)
            .call()?
            .body_mut()
            .read_json()?;
        log::debug!("{machine} belongs to {} groups", groups.len());
        Ok(GroupMembership::new(groups))
    }

    fn run_policy(&self, policy: &str) -> Result<bool> {
        log::info!("Running policy {policy}");
        let status = Command::new(&self.policy_agent)
            .args(["policy", "-event", policy])
            .status()
            .map_err(|e| Error::transient("policy agent", e))?;
        if !status.success() {
            log::warn!("Policy {policy} exited with {status}");
        }
        Ok(status.success())
    }

    fn disconnect(&self) {
        log::debug!("Closing API session to {}", self.base_url);
    }
}
