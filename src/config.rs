//! Client configuration loaded from TOML.
//!
//! Lookup order: `--config PATH`, then `<config dir>/autoguard/config.toml`,
//! then built-in defaults. `AUTOGUARD_API_BASE_URL` and
//! `AUTOGUARD_POLL_INTERVAL_MS` override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::api::DEFAULT_API_BASE_URL;
use crate::error::{AutoGuardError, Result};
use crate::poller::PollPolicy;

pub const APP_DIR_NAME: &str = "autoguard";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const ENV_API_BASE_URL: &str = "AUTOGUARD_API_BASE_URL";
pub const ENV_POLL_INTERVAL_MS: &str = "AUTOGUARD_POLL_INTERVAL_MS";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub data_dir: Option<PathBuf>,
    pub polling: PollingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: 30,
            data_dir: None,
            polling: PollingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    /// 0 = unbounded
    pub max_attempts: u32,
    pub backoff_factor: f64,
    pub max_interval_ms: u64,
    pub jitter_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 3000,
            max_attempts: 0,
            backoff_factor: 1.0,
            max_interval_ms: 30_000,
            jitter_ms: 0,
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, or from the default location when
    /// `path` is None. Only an explicitly given file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AutoGuardError::Config(format!("Failed to read config {:?}: {}", path, e))
        })?;
        let config = Self::from_toml_str(&content)
            .map_err(|e| AutoGuardError::Config(format!("{:?}: {}", path, e)))?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AutoGuardError::Config(e.to_string()))
    }

    /// Apply environment overrides. `lookup` is `std::env::var` outside tests.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_BASE_URL).filter(|v| !v.trim().is_empty()) {
            debug!("{} overrides api_base_url", ENV_API_BASE_URL);
            self.api_base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.polling.interval_ms = ms,
                _ => warn!("Ignoring invalid {}={}", ENV_POLL_INTERVAL_MS, raw),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api_base_url).map_err(|e| {
            AutoGuardError::Config(format!("Invalid api_base_url '{}': {}", self.api_base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AutoGuardError::Config(format!(
                "api_base_url must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.polling.interval_ms == 0 {
            return Err(AutoGuardError::Config(
                "polling.interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn poll_policy(&self) -> PollPolicy {
        let p = &self.polling;
        PollPolicy::fixed(Duration::from_millis(p.interval_ms))
            .with_max_attempts(Some(p.max_attempts))
            .with_backoff(p.backoff_factor, Duration::from_millis(p.max_interval_ms))
            .with_jitter(Duration::from_millis(p.jitter_ms))
    }

    /// Directory for the session file and claim ledger.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join(APP_DIR_NAME)))
            .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR_NAME))
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config =
            AppConfig::from_toml_str(include_str!("../config/autoguard.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            api_base_url = "https://claims.example.com/api/v1"

            [polling]
            max_attempts = 40
            "#,
        )
        .unwrap();
        assert_eq!(config.api_base_url, "https://claims.example.com/api/v1");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.polling.interval_ms, 3000);
        assert_eq!(config.polling.max_attempts, 40);
    }

    #[test]
    fn test_invalid_toml() {
        let err = AppConfig::from_toml_str("api_base_url = [").unwrap_err();
        assert!(matches!(err, AutoGuardError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| match key {
            ENV_API_BASE_URL => Some("http://backend:9000/api/v1".into()),
            ENV_POLL_INTERVAL_MS => Some("500".into()),
            _ => None,
        });
        assert_eq!(config.api_base_url, "http://backend:9000/api/v1");
        assert_eq!(config.polling.interval_ms, 500);
    }

    #[test]
    fn test_bad_env_interval_ignored() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| (key == ENV_POLL_INTERVAL_MS).then(|| "soon".into()));
        assert_eq!(config.polling.interval_ms, 3000);
    }

    #[test]
    fn test_validate() {
        assert!(AppConfig::default().validate().is_ok());

        let mut config = AppConfig::default();
        config.api_base_url = "localhost:8000".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.polling.interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_policy_from_config() {
        let mut config = AppConfig::default();
        let policy = config.poll_policy();
        assert_eq!(policy.interval, Duration::from_millis(3000));
        assert_eq!(policy.max_attempts, None);

        config.polling.max_attempts = 5;
        config.polling.backoff_factor = 2.0;
        let policy = config.poll_policy();
        assert_eq!(policy.max_attempts, Some(5));
        assert_eq!(policy.base_delay(2), Duration::from_millis(6000));
    }

    #[test]
    fn test_explicit_data_dir() {
        let mut config = AppConfig::default();
        config.data_dir = Some(PathBuf::from("/tmp/ag"));
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/ag"));
    }
}
