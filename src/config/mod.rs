use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Client timeout for the suggestion fetch, in seconds. Step calls carry no
/// client timeout and rely on the transport default.
pub const DEFAULT_SUGGESTION_TIMEOUT_SECS: u64 = 120;

const DEFAULT_SERVICE_URL: &str = "http://localhost:8080";

fn default_service_url() -> String {
    DEFAULT_SERVICE_URL.to_string()
}

fn default_suggestion_timeout_secs() -> u64 {
    DEFAULT_SUGGESTION_TIMEOUT_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the redesign service.
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// Client-side timeout for the suggestion fetch.
    #[serde(default = "default_suggestion_timeout_secs")]
    pub suggestion_timeout_secs: u64,

    /// Override for the data directory (credentials, downloads). Supports `~`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    #[serde(skip)]
    config_path: PathBuf,

    #[serde(skip)]
    resolved_data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            suggestion_timeout_secs: default_suggestion_timeout_secs(),
            data_dir: None,
            config_path: PathBuf::new(),
            resolved_data_dir: PathBuf::new(),
        }
    }
}

impl Config {
    /// Load `~/.redesign/config.toml`, writing defaults on first run.
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let redesign_dir = home.join(".redesign");
        let config_path = redesign_dir.join("config.toml");

        if !redesign_dir.exists() {
            fs::create_dir_all(&redesign_dir).context("Failed to create .redesign directory")?;
        }

        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path.clone_from(&config_path);
            config
        } else {
            let config = Self {
                config_path: config_path.clone(),
                ..Self::default()
            };
            config.save()?;
            config
        };

        config.apply_env_overrides();
        config.resolve_data_dir(&redesign_dir);
        config.validate()?;
        fs::create_dir_all(&config.resolved_data_dir)
            .context("Failed to create data directory")?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("REDESIGN_SERVICE_URL")
            && !url.is_empty()
        {
            self.service_url = url;
        }

        if let Ok(dir) = std::env::var("REDESIGN_DATA_DIR")
            && !dir.is_empty()
        {
            self.data_dir = Some(dir);
        }

        if let Ok(timeout_str) = std::env::var("REDESIGN_SUGGESTION_TIMEOUT_SECS")
            && let Ok(timeout) = timeout_str.parse::<u64>()
            && timeout > 0
        {
            self.suggestion_timeout_secs = timeout;
        }
    }

    fn resolve_data_dir(&mut self, default_dir: &std::path::Path) {
        self.resolved_data_dir = match self.data_dir.as_deref() {
            Some(dir) => PathBuf::from(shellexpand::tilde(dir).to_string()),
            None => default_dir.to_path_buf(),
        };
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        let trimmed = self.service_url.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::Validation("service_url is empty".into()));
        }
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "service_url must be http(s): {trimmed}"
            )));
        }
        if self.suggestion_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "suggestion_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Service base URL without a trailing slash.
    #[must_use]
    pub fn service_url(&self) -> &str {
        self.service_url.trim_end_matches('/')
    }

    /// Where credentials and downloaded results live.
    #[must_use]
    pub fn data_dir(&self) -> &std::path::Path {
        &self.resolved_data_dir
    }

    /// Path of the persisted credential file.
    #[must_use]
    pub fn credentials_path(&self) -> PathBuf {
        self.resolved_data_dir.join("credentials.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_config() -> Config {
        let mut config = Config::default();
        config.resolve_data_dir(std::path::Path::new("/tmp/redesign-test"));
        config
    }

    #[test]
    fn defaults_are_valid() {
        let config = bare_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.suggestion_timeout_secs, 120);
        assert_eq!(config.service_url(), "http://localhost:8080");
    }

    #[test]
    fn service_url_trailing_slash_is_trimmed() {
        let mut config = bare_config();
        config.service_url = "https://redesign.example.com/".into();
        assert_eq!(config.service_url(), "https://redesign.example.com");
    }

    #[test]
    fn rejects_non_http_service_url() {
        let mut config = bare_config();
        config.service_url = "ftp://redesign.example.com".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut config = bare_config();
        config.suggestion_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn data_dir_override_expands_tilde() {
        let mut config = Config {
            data_dir: Some("~/redesign-data".into()),
            ..Config::default()
        };
        config.resolve_data_dir(std::path::Path::new("/tmp/default"));
        assert!(!config.data_dir().to_string_lossy().contains('~'));
    }

    #[test]
    fn credentials_path_lives_in_data_dir() {
        let config = bare_config();
        assert_eq!(
            config.credentials_path(),
            PathBuf::from("/tmp/redesign-test/credentials.json")
        );
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let config = bare_config();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.service_url, config.service_url);
        assert_eq!(
            parsed.suggestion_timeout_secs,
            config.suggestion_timeout_secs
        );
    }
}
