use serde::Deserialize;
use std::env;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::services::poller::PollConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_port: u16,
    pub gateway_base_url: String,
    pub request_timeout_ms: u64,
    pub poll_max_attempts: u32,
    pub poll_interval_ms: u64,
    pub session_ttl_secs: u64,
    pub diagnostics_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 9999,
            gateway_base_url: "http://localhost:8000/api/payments".to_string(),
            request_timeout_ms: 5000,
            poll_max_attempts: 30,
            poll_interval_ms: 2000,
            session_ttl_secs: 900,
            diagnostics_enabled: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| env::var(key).ok());
        config
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, then the optional TOML file, then environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::from_env());
        };

        info!("Loading configuration from {}", path.display());
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        override_parsed(&lookup, "PORT", &mut self.server_port);
        override_parsed(&lookup, "PAYMENT_GATEWAY_URL", &mut self.gateway_base_url);
        override_parsed(&lookup, "GATEWAY_TIMEOUT_MS", &mut self.request_timeout_ms);
        override_parsed(&lookup, "POLL_MAX_ATTEMPTS", &mut self.poll_max_attempts);
        override_parsed(&lookup, "POLL_INTERVAL_MS", &mut self.poll_interval_ms);
        override_parsed(&lookup, "SESSION_TTL_SECS", &mut self.session_ttl_secs);
        override_parsed(&lookup, "DIAGNOSTICS_ENABLED", &mut self.diagnostics_enabled);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_max_attempts == 0 {
            return Err(ConfigError::Invalid("poll_max_attempts must be at least 1".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be positive".into()));
        }
        if self.session_ttl_secs == 0 {
            return Err(ConfigError::Invalid("session_ttl_secs must be positive".into()));
        }
        // An idle session must outlive a full poll
        let window = self.poll_config().window();
        if self.session_ttl() <= window {
            return Err(ConfigError::Invalid(format!(
                "session_ttl_secs ({}) must exceed the polling window of {:?}",
                self.session_ttl_secs, window
            )));
        }
        self.gateway_url().map(|_| ())
    }

    pub fn gateway_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.gateway_base_url).map_err(|e| {
            ConfigError::Invalid(format!("gateway_base_url {:?}: {}", self.gateway_base_url, e))
        })?;

        match url.scheme() {
            "http" | "https" if !url.cannot_be_a_base() => Ok(url),
            _ => Err(ConfigError::Invalid(format!(
                "gateway_base_url {:?} must be an absolute http(s) URL",
                self.gateway_base_url
            ))),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig::new(self.poll_max_attempts, Duration::from_millis(self.poll_interval_ms))
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        return;
    };

    match raw.trim().parse() {
        Ok(value) => {
            info!("{key} set from environment");
            *slot = value;
        }
        Err(e) => warn!("Invalid {key} value {raw:?}: {e}, keeping current setting"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tokio_test::{assert_err, assert_ok};

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_polling_window() {
        let config = Config::default();
        assert_eq!(config.poll_max_attempts, 30);
        assert_eq!(config.poll_interval_ms, 2000);
        assert_ok!(config.validate());

        let poll = config.poll_config();
        assert_eq!(poll.max_attempts(), 30);
        assert_eq!(poll.window(), Duration::from_secs(60));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(lookup_from(&[
            ("PORT", "8080"),
            ("PAYMENT_GATEWAY_URL", "https://pay.example.com/v1"),
            ("POLL_MAX_ATTEMPTS", "3"),
            ("DIAGNOSTICS_ENABLED", "true"),
        ]));

        assert_eq!(config.server_port, 8080);
        assert_eq!(config.gateway_base_url, "https://pay.example.com/v1");
        assert_eq!(config.poll_max_attempts, 3);
        assert!(config.diagnostics_enabled);
        assert_eq!(config.poll_interval_ms, 2000);
    }

    #[test]
    fn test_invalid_env_value_keeps_current() {
        let mut config = Config::default();
        config.apply_overrides(lookup_from(&[("POLL_INTERVAL_MS", "soon"), ("PORT", "-1")]));

        assert_eq!(config.poll_interval_ms, 2000);
        assert_eq!(config.server_port, 9999);
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "gateway_base_url = \"http://gateway.internal:9000\"\npoll_interval_ms = 500"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.gateway_base_url, "http://gateway.internal:9000");
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.poll_max_attempts, 30);
    }

    #[test]
    fn test_from_file_errors() {
        let missing = Config::from_file(Path::new("/definitely/not/here.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "poll_max_attempts = \"many\"").unwrap();
        let bad = Config::from_file(file.path());
        assert!(matches!(bad, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.poll_max_attempts = 0;
        assert_err!(config.validate());

        let mut config = Config::default();
        config.poll_interval_ms = 0;
        assert_err!(config.validate());

        let mut config = Config::default();
        config.gateway_base_url = "mailto:pay@example.com".into();
        assert_err!(config.validate());

        let mut config = Config::default();
        config.gateway_base_url = "not a url".into();
        assert_err!(config.validate());
    }

    #[test]
    fn test_validate_session_ttl_outlives_poll() {
        let mut config = Config::default();
        config.session_ttl_secs = 0;
        assert_err!(config.validate());

        // 30 x 2s gives a 60s window
        config.session_ttl_secs = 60;
        assert_err!(config.validate());

        config.session_ttl_secs = 61;
        assert_ok!(config.validate());

        config.poll_interval_ms = 5000;
        assert_err!(config.validate());
    }
}
