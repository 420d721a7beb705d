//! Sync configuration: defaults, optional JSON file, then environment.

use crate::channel::ReconnectPolicy;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const ENV_SERVER: &str = "TABLECAST_SERVER";
pub const ENV_RECONNECT_MS: &str = "TABLECAST_RECONNECT_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// HTTP base URL of the session server.
    pub server: String,
    pub reconnect_after_close_ms: u64,
    pub reconnect_after_failure_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            server: "http://localhost:8000".to_string(),
            reconnect_after_close_ms: policy.after_close.as_millis() as u64,
            reconnect_after_failure_ms: policy.after_failure.as_millis() as u64,
        }
    }
}

impl SyncConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Apply `TABLECAST_SERVER` / `TABLECAST_RECONNECT_MS` overrides.
    pub fn with_env(self) -> Self {
        self.with_overrides(
            std::env::var(ENV_SERVER).ok(),
            std::env::var(ENV_RECONNECT_MS).ok(),
        )
    }

    fn with_overrides(mut self, server: Option<String>, reconnect_ms: Option<String>) -> Self {
        if let Some(server) = server.filter(|s| !s.trim().is_empty()) {
            self.server = server;
        }
        if let Some(raw) = reconnect_ms {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.reconnect_after_close_ms = ms,
                Err(e) => log::warn!("ignoring {ENV_RECONNECT_MS}={raw:?}: {e}"),
            }
        }
        self
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            after_close: Duration::from_millis(self.reconnect_after_close_ms),
            after_failure: Duration::from_millis(self.reconnect_after_failure_ms),
        }
    }
}
