//! Configuration file
//!
//! A JSON object; every field has a default. `JWT_SECRET` and
//! `POLKA_API_KEY` in the environment override the file.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::{SessionConfig, DEFAULT_ISSUER};
use crate::observability::Severity;
use crate::store::IdPolicy;

pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const WEBHOOK_KEY_ENV: &str = "POLKA_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Snapshot file (default "./database.json")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Issuer claim for access tokens (default "chirpy")
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// HS256 signing secret; required, usually via `JWT_SECRET`
    #[serde(default)]
    pub jwt_secret: String,

    /// Key expected in `ApiKey` webhook headers
    #[serde(default)]
    pub webhook_api_key: String,

    /// Cap and default for access token lifetime (default 3600)
    #[serde(default = "default_access_ttl")]
    pub access_token_max_ttl_secs: i64,

    /// Refresh token lifetime (default 60)
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_days: i64,

    #[serde(default)]
    pub id_policy: IdPolicy,

    #[serde(default = "default_log_level")]
    pub log_level: Severity,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./database.json")
}
fn default_issuer() -> String {
    DEFAULT_ISSUER.to_string()
}
fn default_access_ttl() -> i64 {
    3600
}
fn default_refresh_ttl() -> i64 {
    60
}
fn default_log_level() -> Severity {
    Severity::Info
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            issuer: default_issuer(),
            jwt_secret: String::new(),
            webhook_api_key: String::new(),
            access_token_max_ttl_secs: default_access_ttl(),
            refresh_token_ttl_days: default_refresh_ttl(),
            id_policy: IdPolicy::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load from `path` if it exists, apply environment overrides, validate.
    ///
    /// A missing file means all defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match fs::read_to_string(path) {
            Ok(content) => Self::from_json(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Override secrets from `lookup`, skipping empty values
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = lookup(JWT_SECRET_ENV).filter(|s| !s.is_empty()) {
            self.jwt_secret = secret;
        }
        if let Some(key) = lookup(WEBHOOK_KEY_ENV).filter(|s| !s.is_empty()) {
            self.webhook_api_key = key;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "jwt_secret must be set (or export {})",
                JWT_SECRET_ENV
            )));
        }
        if self.issuer.is_empty() {
            return Err(ConfigError::Invalid("issuer must not be empty".to_string()));
        }
        if self.access_token_max_ttl_secs <= 0 {
            return Err(ConfigError::Invalid(
                "access_token_max_ttl_secs must be > 0".to_string(),
            ));
        }
        if self.refresh_token_ttl_days <= 0 {
            return Err(ConfigError::Invalid(
                "refresh_token_ttl_days must be > 0".to_string(),
            ));
        }
        self.ttls().map(|_| ())
    }

    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        let (access_token_max_ttl, refresh_token_ttl) = self.ttls()?;
        Ok(SessionConfig {
            issuer: self.issuer.clone(),
            access_token_max_ttl,
            refresh_token_ttl,
        })
    }

    /// Both lifetimes, rejecting any whose expiry from now is not a valid
    /// timestamp
    fn ttls(&self) -> Result<(Duration, Duration), ConfigError> {
        let access = bounded_ttl(
            "access_token_max_ttl_secs",
            Duration::try_seconds(self.access_token_max_ttl_secs),
        )?;
        let refresh = bounded_ttl(
            "refresh_token_ttl_days",
            Duration::try_days(self.refresh_token_ttl_days),
        )?;
        Ok((access, refresh))
    }
}

fn bounded_ttl(field: &str, ttl: Option<Duration>) -> Result<Duration, ConfigError> {
    ttl.filter(|ttl| Utc::now().checked_add_signed(*ttl).is_some())
        .ok_or_else(|| ConfigError::Invalid(format!("{} is too large", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.issuer, "chirpy");
        assert_eq!(config.id_policy, IdPolicy::LiveCount);
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_json(
            r#"{
                "database_path": "/var/lib/chirp/db.json",
                "jwt_secret": "s3cret",
                "id_policy": "monotonic",
                "log_level": "warn",
                "access_token_max_ttl_secs": 60
            }"#,
        )
        .unwrap();
        assert_eq!(config.id_policy, IdPolicy::Monotonic);
        assert_eq!(config.log_level, Severity::Warn);
        assert_eq!(
            config.session_config().unwrap().access_token_max_ttl,
            Duration::seconds(60)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            Config::from_json(r#"{"port": 8080}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_secret_is_invalid() {
        assert!(matches!(
            Config::default().validate(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(|name| match name {
            JWT_SECRET_ENV => Some("from-env".to_string()),
            WEBHOOK_KEY_ENV => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.jwt_secret, "from-env");
        assert_eq!(config.webhook_api_key, "");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_positive_ttls_rejected() {
        let mut config = Config {
            jwt_secret: "s".to_string(),
            ..Config::default()
        };
        config.refresh_token_ttl_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unrepresentable_ttls_rejected() {
        let config = Config {
            jwt_secret: "s".to_string(),
            refresh_token_ttl_days: 1_000_000_000,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        assert!(config.session_config().is_err());

        let config = Config {
            jwt_secret: "s".to_string(),
            access_token_max_ttl_secs: i64::MAX,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = Config {
            jwt_secret: "s".to_string(),
            refresh_token_ttl_days: 36_500,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }
}
