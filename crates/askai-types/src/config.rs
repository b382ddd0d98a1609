//! Client configuration types for askai.
//!
//! `ClientConfig` represents the `config.toml` that points the client at an
//! answer service and tunes its cache, timeout, and debounce behaviour.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Route of the retrieval-augmented primary endpoint.
pub const PRIMARY_PATH: &str = "/api/rag/query";

/// Route of the general-purpose secondary endpoint.
pub const SECONDARY_PATH: &str = "/api/askai";

/// Top-level configuration for the query client.
///
/// Loaded from `~/.askai/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the answer service (scheme + host, no trailing slash).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_primary_path")]
    pub primary_path: String,

    #[serde(default = "default_secondary_path")]
    pub secondary_path: String,

    /// Maximum silence between two chunks before an attempt is abandoned.
    #[serde(default = "default_inactivity_timeout_ms")]
    pub inactivity_timeout_ms: u64,

    /// How long a cached answer may be reused.
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Maximum number of cached answers.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Delay before a triggered ask actually runs.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Size of the in-memory conversation window.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_primary_path() -> String {
    PRIMARY_PATH.to_string()
}

fn default_secondary_path() -> String {
    SECONDARY_PATH.to_string()
}

fn default_inactivity_timeout_ms() -> u64 {
    15_000
}

fn default_cache_ttl_ms() -> u64 {
    10_000
}

fn default_cache_capacity() -> usize {
    50
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_max_messages() -> usize {
    20
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            primary_path: default_primary_path(),
            secondary_path: default_secondary_path(),
            inactivity_timeout_ms: default_inactivity_timeout_ms(),
            cache_ttl_ms: default_cache_ttl_ms(),
            cache_capacity: default_cache_capacity(),
            debounce_ms: default_debounce_ms(),
            max_messages: default_max_messages(),
        }
    }
}

impl ClientConfig {
    /// Full URL of the primary endpoint.
    pub fn primary_url(&self) -> String {
        join_url(&self.base_url, &self.primary_path)
    }

    /// Full URL of the secondary endpoint.
    pub fn secondary_url(&self) -> String {
        join_url(&self.base_url, &self.secondary_path)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_millis(self.inactivity_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Reject settings that would make the client unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".into()));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid("cache_capacity must be at least 1".into()));
        }
        if self.max_messages == 0 {
            return Err(ConfigError::Invalid("max_messages must be at least 1".into()));
        }
        if self.inactivity_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "inactivity_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
