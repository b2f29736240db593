//! Application configuration: `quill.toml` plus `.env` and `QUILL_*` overrides

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use quill_orm::DatabaseConfig;
use quill_web::ServerConfig;
use serde::Deserialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load from `path`, or from the default location when `path` is None.
    ///
    /// An explicit path must exist; a missing default file yields defaults,
    /// leaving the environment to supply the database settings.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    debug!("No config at {}, using defaults", default_path.display());
                    Self::default()
                }
            }
        };

        config
            .database
            .apply_env_overrides()
            .context("Invalid QUILL_* environment override")?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {} (invalid TOML)", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Get config file path: ~/.quill/config.toml
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".quill/config.toml")
    }
}

/// Load `.env` from the current directory, then `~/.quill/.env`.
/// Variables already set are never overwritten.
pub fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded .env from current directory: {}", path.display());
    }

    if let Some(home) = dirs::home_dir() {
        let env_file = home.join(".quill").join(".env");
        if env_file.exists() {
            match dotenvy::from_path(&env_file) {
                Ok(()) => debug!("Loaded .env from {}", env_file.display()),
                Err(e) => debug!("Failed to load {}: {}", env_file.display(), e),
            }
        }
    }
}
