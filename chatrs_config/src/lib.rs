#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

mod schema;

pub use schema::{Config, ProviderConfig, RetryConfig, StoreConfig, UserConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found at: {0}. Please run 'chatrs init' to create config.")]
    NotFound(PathBuf),

    #[error("Config file already exists at: {0}. Please edit it directly.")]
    AlreadyExists(PathBuf),

    #[error("Cannot find home directory")]
    NoHomeDir,

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

const CONFIG_TEMPLATE: &str = r#"{
  "provider": {
    "base_url": "https://api.openai.com/v1",
    "model": "gpt-4o-mini",
    "api_keys": ["your-api-key-here"],
    "max_tokens": 4000,
    "temperature": 0.5,
    "system_prompt": "You are a helpful AI assistant."
  },
  "retry": {
    "attempts": 3,
    "backoff_ms": 1000,
    "timeout_ms": 5000,
    "idle_timeout_ms": 60000
  },
  "user": {
    "id": "local"
  }
}"#;

impl Config {
    /// `~/chatrs`
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        Ok(dirs::home_dir().ok_or(ConfigError::NoHomeDir)?.join("chatrs"))
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load `~/chatrs/config.json`, apply environment overrides and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::default_path()?)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without overrides or validation.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    /// Write the template to `~/chatrs/config.json`.
    pub fn create_config() -> Result<PathBuf, ConfigError> {
        Self::ensure_config_dir()?;
        let path = Self::default_path()?;
        Self::create_config_at(&path)?;
        Ok(path)
    }

    pub fn create_config_at(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }
        std::fs::write(path, CONFIG_TEMPLATE)?;
        info!("Created config file at {}", path.display());
        Ok(())
    }
}
