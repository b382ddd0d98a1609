//! Application state: effective configuration plus the wired ask session.

use std::path::PathBuf;

use askai_core::session::AskSession;
use askai_infra::config::{config_path, load_client_config, resolve_config_dir};
use askai_infra::http::fallback_from_config;
use askai_types::config::ClientConfig;

/// Shared state for every command.
pub struct AppState {
    pub config: ClientConfig,
    pub config_dir: PathBuf,
}

impl AppState {
    /// Load `config.toml` and apply command-line overrides.
    pub async fn init(
        config_dir: Option<PathBuf>,
        base_url: Option<String>,
    ) -> anyhow::Result<Self> {
        let config_dir = config_dir.unwrap_or_else(resolve_config_dir);
        let mut config = load_client_config(&config_dir).await;

        if let Some(base_url) = base_url {
            config.base_url = base_url;
        }
        config.validate()?;

        tracing::debug!(
            config_dir = %config_dir.display(),
            base_url = %config.base_url,
            "configuration loaded"
        );

        Ok(Self { config, config_dir })
    }

    pub fn config_file(&self) -> PathBuf {
        config_path(&self.config_dir)
    }

    /// Build a fresh session against the configured service.
    pub fn session(&self) -> anyhow::Result<AskSession> {
        let fallback = fallback_from_config(&self.config)?;
        Ok(AskSession::from_config(fallback, &self.config))
    }
}
