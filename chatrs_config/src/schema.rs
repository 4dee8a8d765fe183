use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ConfigError;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub user: UserConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "ProviderConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "ProviderConfig::default_model")]
    pub model: String,
    /// Credential pool; one key is picked per call attempt.
    pub api_keys: Vec<String>,
    #[serde(default = "ProviderConfig::default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "ProviderConfig::default_temperature")]
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl ProviderConfig {
    fn default_base_url() -> String {
        "https://api.openai.com/v1".to_string()
    }

    fn default_model() -> String {
        "gpt-4o-mini".to_string()
    }

    const fn default_max_tokens() -> u32 {
        4000
    }

    const fn default_temperature() -> f32 {
        0.5
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    #[serde(default = "RetryConfig::default_attempts")]
    pub attempts: u32,
    #[serde(default = "RetryConfig::default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "RetryConfig::default_timeout_ms")]
    pub timeout_ms: u64,
    /// Longest wait between two chunks of a reply that is already streaming.
    #[serde(default = "RetryConfig::default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: Self::default_attempts(),
            backoff_ms: Self::default_backoff_ms(),
            timeout_ms: Self::default_timeout_ms(),
            idle_timeout_ms: Self::default_idle_timeout_ms(),
        }
    }
}

impl RetryConfig {
    const fn default_attempts() -> u32 {
        3
    }

    const fn default_backoff_ms() -> u64 {
        1000
    }

    const fn default_timeout_ms() -> u64 {
        5000
    }

    const fn default_idle_timeout_ms() -> u64 {
        60_000
    }

    #[must_use]
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "StoreConfig::default_url")]
    pub url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
        }
    }
}

impl StoreConfig {
    fn default_url() -> String {
        dirs::home_dir().map_or_else(
            || "sqlite://chats.db?mode=rwc".to_string(),
            |home| {
                format!(
                    "sqlite://{}?mode=rwc",
                    home.join("chatrs").join("chats.db").display()
                )
            },
        )
    }
}

/// Owner identity. Without one, conversations are not persisted.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct UserConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Config {
    /// Override file values from environment variables.
    ///
    /// `CHATRS_API_KEYS` is a comma-separated credential list.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(keys) = lookup("CHATRS_API_KEYS") {
            self.provider.api_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(ToString::to_string)
                .collect();
        }
        if let Some(url) = lookup("CHATRS_BASE_URL") {
            self.provider.base_url = url;
        }
        if let Some(model) = lookup("CHATRS_MODEL") {
            self.provider.model = model;
        }
        if let Some(user) = lookup("CHATRS_USER_ID") {
            self.user.id = Some(user);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let provider = &self.provider;
        if provider.api_keys.iter().all(|k| k.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "provider.api_keys must contain at least one key".to_string(),
            ));
        }
        if provider.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.base_url is empty".to_string()));
        }
        if provider.model.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.model is empty".to_string()));
        }
        if !(0.0..=2.0).contains(&provider.temperature) {
            return Err(ConfigError::Invalid(format!(
                "provider.temperature must be within 0..=2, got {}",
                provider.temperature
            )));
        }
        if self.retry.attempts == 0 {
            return Err(ConfigError::Invalid("retry.attempts must be at least 1".to_string()));
        }
        if self.retry.timeout_ms == 0 {
            return Err(ConfigError::Invalid("retry.timeout_ms must be positive".to_string()));
        }
        if self.retry.idle_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "retry.idle_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Non-empty keys from the credential pool.
    #[must_use]
    pub fn api_keys(&self) -> Vec<String> {
        self.provider
            .api_keys
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn minimal() -> Config {
        serde_json::from_str(r#"{ "provider": { "api_keys": ["k1", "k2"] } }"#).unwrap()
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let config = minimal();
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.retry.backoff(), Duration::from_secs(1));
        assert_eq!(config.retry.timeout(), Duration::from_secs(5));
        assert_eq!(config.retry.idle_timeout(), Duration::from_secs(60));
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert!(config.user.id.is_none());
        assert!(config.store.url.starts_with("sqlite://"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let env: HashMap<&str, &str> = [
            ("CHATRS_API_KEYS", "a, b ,,c"),
            ("CHATRS_BASE_URL", "http://proxy.local/v1"),
            ("CHATRS_USER_ID", "user-7"),
        ]
        .into_iter()
        .collect();

        let mut config = minimal();
        config.apply_overrides_from(|name| env.get(name).map(ToString::to_string));

        assert_eq!(config.provider.api_keys, vec!["a", "b", "c"]);
        assert_eq!(config.provider.base_url, "http://proxy.local/v1");
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.user.id.as_deref(), Some("user-7"));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = minimal();
        config.provider.api_keys = vec![" ".to_string()];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = minimal();
        config.retry.attempts = 0;
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.retry.timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.retry.idle_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.provider.temperature = 3.5;
        assert!(config.validate().is_err());
    }
}
