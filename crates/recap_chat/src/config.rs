//! Client configuration.
//!
//! Resolved from `<state_dir>/settings.json`, then environment overrides,
//! then built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ChatError, ChatResult};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_STATE_DIR: &str = ".recap";

pub const ENV_API_URL: &str = "RECAP_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "RECAP_TIMEOUT_SECS";
pub const ENV_STATE_DIR: &str = "RECAP_STATE_DIR";

/// Connection and storage settings for the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the content service API
    pub api_url: String,
    /// Per-request timeout enforced by the HTTP gateway
    pub request_timeout_secs: u64,
    /// Directory holding `settings.json` and the cached credential
    pub state_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
        }
    }
}

impl ClientConfig {
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.state_dir.join("settings.json")
    }

    pub fn credential_path(&self) -> PathBuf {
        self.state_dir.join("credential.json")
    }

    /// Load settings for a state directory and apply process environment overrides.
    pub fn load(state_dir: impl AsRef<Path>) -> ChatResult<Self> {
        Self::load_with(state_dir, |key| std::env::var(key).ok())
    }

    /// Like [`load`](Self::load) with an explicit variable lookup.
    pub fn load_with<F>(state_dir: impl AsRef<Path>, lookup: F) -> ChatResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default().state_dir(state_dir.as_ref());

        let settings_path = config.settings_path();
        if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            let settings: Settings = serde_json::from_str(&content).map_err(|e| {
                ChatError::Config(format!("Invalid {}: {}", settings_path.display(), e))
            })?;

            if let Some(url) = settings.api_url {
                config.api_url = url;
            }
            if let Some(secs) = settings.request_timeout_secs {
                config.request_timeout_secs = secs;
            }
        }

        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            config.api_url = url;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS).filter(|v| !v.is_empty()) {
            config.request_timeout_secs = secs
                .parse()
                .map_err(|_| ChatError::Config(format!("{} must be a number of seconds, got {:?}", ENV_TIMEOUT_SECS, secs)))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ChatResult<()> {
        let url = self.api_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ChatError::Config(format!(
                "API URL must start with http:// or https://, got {:?}",
                self.api_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ChatError::Config("Request timeout must be at least one second".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Settings {
    api_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let temp = tempdir().unwrap();
        let config = ClientConfig::load_with(temp.path(), no_env).unwrap();

        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.credential_path(), temp.path().join("credential.json"));
    }

    #[test]
    fn test_settings_file() {
        let temp = tempdir().unwrap();
        std::fs::write(
            temp.path().join("settings.json"),
            r#"{"apiUrl": "https://recap.example.com/api/v1", "requestTimeoutSecs": 30}"#,
        )
        .unwrap();

        let config = ClientConfig::load_with(temp.path(), no_env).unwrap();
        assert_eq!(config.api_url, "https://recap.example.com/api/v1");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_env_overrides_settings() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("settings.json"), r#"{"requestTimeoutSecs": 30}"#).unwrap();

        let config = ClientConfig::load_with(temp.path(), |key| match key {
            ENV_API_URL => Some("http://10.0.0.2:9000/api/v1".to_string()),
            ENV_TIMEOUT_SECS => Some("5".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.api_url, "http://10.0.0.2:9000/api/v1");
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_invalid_values() {
        let temp = tempdir().unwrap();
        let err = ClientConfig::load_with(temp.path(), |key| {
            (key == ENV_TIMEOUT_SECS).then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));

        std::fs::write(temp.path().join("settings.json"), "{not json").unwrap();
        assert!(matches!(
            ClientConfig::load_with(temp.path(), no_env),
            Err(ChatError::Config(_))
        ));

        assert!(ClientConfig::default().api_url("ftp://x").validate().is_err());
        assert!(ClientConfig::default().request_timeout_secs(0).validate().is_err());
    }
}
