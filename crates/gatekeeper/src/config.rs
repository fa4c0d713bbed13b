//! Gatekeeper configuration
//!
//! Storage and retry tuning. Loaded from a JSON file, then overridden by
//! `OPTGATE_*` environment variables. The unsubscribe threshold is a constant,
//! not a setting.

use optgate_persistence::StoreOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const ENV_DATABASE_URL: &str = "OPTGATE_DATABASE_URL";
pub const ENV_MAX_CONNECTIONS: &str = "OPTGATE_MAX_CONNECTIONS";
pub const ENV_BUSY_TIMEOUT_MS: &str = "OPTGATE_BUSY_TIMEOUT_MS";
pub const ENV_MAX_CONFLICT_ATTEMPTS: &str = "OPTGATE_MAX_CONFLICT_ATTEMPTS";
pub const ENV_RETRY_BACKOFF_MS: &str = "OPTGATE_RETRY_BACKOFF_MS";

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: String, value: String },

    #[error("validation error: {0}")]
    Validation(String),
}

/// Configuration for the Gatekeeper and its Ledger Store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatekeeperConfig {
    // === Storage ===
    /// SQLite URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long SQLite waits on another writer before reporting BUSY
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    // === Conflict retry ===
    /// Total tries per admission/ingest, the first included, before surfacing a transient failure
    #[serde(default = "default_max_conflict_attempts")]
    pub max_conflict_attempts: u32,

    /// Base backoff; attempt `n` sleeps `n * retry_backoff_ms`
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_database_url() -> String {
    "sqlite:data/optgate.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_max_conflict_attempts() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    25
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
            max_conflict_attempts: default_max_conflict_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl GatekeeperConfig {
    /// Defaults pointing at another database
    pub fn with_database_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }

    /// Load configuration from JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// File (or defaults), then environment, then validation
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `OPTGATE_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from any variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            self.database_url = url;
        }
        if let Some(value) = lookup(ENV_MAX_CONNECTIONS) {
            self.max_connections = parse_env(ENV_MAX_CONNECTIONS, &value)?;
        }
        if let Some(value) = lookup(ENV_BUSY_TIMEOUT_MS) {
            self.busy_timeout_ms = parse_env(ENV_BUSY_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_CONFLICT_ATTEMPTS) {
            self.max_conflict_attempts = parse_env(ENV_MAX_CONFLICT_ATTEMPTS, &value)?;
        }
        if let Some(value) = lookup(ENV_RETRY_BACKOFF_MS) {
            self.retry_backoff_ms = parse_env(ENV_RETRY_BACKOFF_MS, &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Validation("database_url is empty".to_string()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Validation(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.max_conflict_attempts == 0 {
            return Err(ConfigError::Validation(
                "max_conflict_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Sleep before retry number `attempt` (1-based)
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions::new(self.database_url.clone())
            .with_max_connections(self.max_connections)
            .with_busy_timeout(self.busy_timeout())
    }
}

fn parse_env<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = GatekeeperConfig::default();

        assert_eq!(config.database_url, "sqlite:data/optgate.db?mode=rwc");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.busy_timeout_ms, 5_000);
        assert_eq!(config.max_conflict_attempts, 5);
        assert_eq!(config.retry_backoff_ms, 25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{ "max_conflict_attempts": 2 }"#;
        let config: GatekeeperConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.max_conflict_attempts, 2);
        assert_eq!(config.max_connections, 5); // default
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "database_url": "sqlite::memory:", "retry_backoff_ms": 1 }}"#).unwrap();

        let config = GatekeeperConfig::from_file(file.path()).unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.retry_backoff_ms, 1);
    }

    #[test]
    fn test_missing_file() {
        let result = GatekeeperConfig::from_file(Path::new("/nonexistent/optgate.json"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_DATABASE_URL, "sqlite:other.db"),
            (ENV_MAX_CONFLICT_ATTEMPTS, "9"),
            (ENV_RETRY_BACKOFF_MS, " 10 "),
        ]
        .into_iter()
        .collect();

        let mut config = GatekeeperConfig::default();
        config
            .apply_overrides(|var| env.get(var).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database_url, "sqlite:other.db");
        assert_eq!(config.max_conflict_attempts, 9);
        assert_eq!(config.retry_backoff_ms, 10);
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = GatekeeperConfig::default();
        let result = config.apply_overrides(|var| {
            (var == ENV_MAX_CONNECTIONS).then(|| "many".to_string())
        });

        match result {
            Err(ConfigError::InvalidEnv { var, value }) => {
                assert_eq!(var, ENV_MAX_CONNECTIONS);
                assert_eq!(value, "many");
            }
            other => panic!("expected InvalidEnv, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_rejects_zero() {
        let config = GatekeeperConfig {
            max_connections: 0,
            ..GatekeeperConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let config = GatekeeperConfig {
            max_conflict_attempts: 0,
            ..GatekeeperConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_backoff_is_linear() {
        let config = GatekeeperConfig::default();
        assert_eq!(config.retry_backoff(1), Duration::from_millis(25));
        assert_eq!(config.retry_backoff(3), Duration::from_millis(75));
    }
}
