use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_ENDPOINT: &str = "DGRAPH_ENDPOINT";
pub const ENV_AUTH_TOKEN: &str = "DGRAPH_AUTH_TOKEN";
pub const ENV_TIMEOUT_SECS: &str = "DGRAPH_TIMEOUT_SECS";

/// Connection settings for the graph store.
///
/// Layered as defaults, then an optional TOML file, then `DGRAPH_*`
/// environment variables, then whatever the caller sets explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the store's HTTP API
    pub endpoint: String,
    /// Sent as `X-Dgraph-AccessToken` when set
    pub auth_token: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Refuse every mutation issued through this client
    pub read_only: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            auth_token: None,
            timeout_secs: 30,
            read_only: false,
        }
    }
}

impl StoreConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, StoreError> {
        toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Applies `DGRAPH_ENDPOINT`, `DGRAPH_AUTH_TOKEN` and `DGRAPH_TIMEOUT_SECS`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::with_env_overrides`] with an explicit lookup.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|v| !v.trim().is_empty()) {
            self.endpoint = endpoint.trim().to_string();
        }
        if let Some(token) = lookup(ENV_AUTH_TOKEN).filter(|v| !v.is_empty()) {
            self.auth_token = Some(token);
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse() {
                Ok(secs) => self.timeout_secs = secs,
                Err(_) => tracing::warn!(
                    value = %raw,
                    "ignoring unparseable {ENV_TIMEOUT_SECS}"
                ),
            }
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Endpoint without a trailing slash, with `path` appended.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}
