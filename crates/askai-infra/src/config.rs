//! Configuration loader for askai.
//!
//! Reads `config.toml` from the config directory (`~/.askai/` unless
//! `ASKAI_CONFIG_DIR` is set) and deserializes it into [`ClientConfig`].
//! Falls back to defaults when the file is missing, malformed, or invalid.

use std::path::{Path, PathBuf};

use askai_types::config::ClientConfig;
use askai_types::error::ConfigError;

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "ASKAI_CONFIG_DIR";

const CONFIG_FILE: &str = "config.toml";

/// Resolve the config directory: `$ASKAI_CONFIG_DIR`, else `~/.askai`.
pub fn resolve_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".askai")
}

/// Path of the config file inside `config_dir`.
pub fn config_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE)
}

/// Read and validate `{config_dir}/config.toml`.
///
/// Returns `Ok(None)` when the file does not exist.
pub async fn read_client_config(config_dir: &Path) -> Result<Option<ClientConfig>, ConfigError> {
    let path = config_path(config_dir);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(ConfigError::Io(format!("{}: {err}", path.display()))),
    };

    let config = toml::from_str::<ClientConfig>(&content)
        .map_err(|err| ConfigError::Parse(format!("{}: {err}", path.display())))?;
    config.validate()?;
    Ok(Some(config))
}

/// Load configuration from `{config_dir}/config.toml`.
///
/// - Missing file: returns [`ClientConfig::default()`].
/// - Unreadable, unparseable, or invalid file: logs a warning and returns the default.
pub async fn load_client_config(config_dir: &Path) -> ClientConfig {
    match read_client_config(config_dir).await {
        Ok(Some(config)) => config,
        Ok(None) => {
            tracing::debug!(
                "No config.toml found in {}, using defaults",
                config_dir.display()
            );
            ClientConfig::default()
        }
        Err(err) => {
            tracing::warn!("{err}, using defaults");
            ClientConfig::default()
        }
    }
}
