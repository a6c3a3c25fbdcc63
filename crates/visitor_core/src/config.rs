//! Runtime configuration loaded from environment variables.
//!
//! # Responsibility
//! - Resolve database paths, retry policy and logging settings.
//! - Report malformed values as typed errors instead of silently defaulting.
//!
//! # Invariants
//! - Unset variables fall back to documented defaults.
//! - `max_attempts` is at least 1.

use crate::db::{DbOptions, DEFAULT_BUSY_TIMEOUT};
use crate::logging::default_log_level;
use crate::repo::document_store::DEFAULT_MAX_ATTEMPTS;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_STORE_DB: &str = "VISITOR_STORE_DB";
pub const ENV_LOCAL_DB: &str = "VISITOR_LOCAL_DB";
pub const ENV_MAX_ATTEMPTS: &str = "VISITOR_MAX_ATTEMPTS";
pub const ENV_BUSY_TIMEOUT_MS: &str = "VISITOR_BUSY_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "VISITOR_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "VISITOR_LOG_DIR";

const DEFAULT_STORE_DB: &str = "visitor_store.sqlite3";
const DEFAULT_LOCAL_DB: &str = "visitor_local.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid { key, value, reason } => {
                write!(f, "invalid {key} value `{value}`: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorConfig {
    /// SQLite file holding the shared counter document.
    pub store_db_path: PathBuf,
    /// SQLite file standing in for one client's local storage.
    pub local_db_path: PathBuf,
    pub max_attempts: u32,
    pub busy_timeout: Duration,
    pub log_level: String,
    /// Logging stays off when `None`.
    pub log_dir: Option<PathBuf>,
}

impl Default for VisitorConfig {
    fn default() -> Self {
        Self {
            store_db_path: PathBuf::from(DEFAULT_STORE_DB),
            local_db_path: PathBuf::from(DEFAULT_LOCAL_DB),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl VisitorConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let max_attempts = match value(ENV_MAX_ATTEMPTS) {
            Some(raw) => match parse::<u32>(ENV_MAX_ATTEMPTS, &raw)? {
                0 => {
                    return Err(ConfigError::Invalid {
                        key: ENV_MAX_ATTEMPTS,
                        value: raw,
                        reason: "must be at least 1".to_string(),
                    });
                }
                attempts => attempts,
            },
            None => defaults.max_attempts,
        };

        let busy_timeout = match value(ENV_BUSY_TIMEOUT_MS) {
            Some(raw) => Duration::from_millis(parse::<u64>(ENV_BUSY_TIMEOUT_MS, &raw)?),
            None => defaults.busy_timeout,
        };

        Ok(Self {
            store_db_path: value(ENV_STORE_DB)
                .map(PathBuf::from)
                .unwrap_or(defaults.store_db_path),
            local_db_path: value(ENV_LOCAL_DB)
                .map(PathBuf::from)
                .unwrap_or(defaults.local_db_path),
            max_attempts,
            busy_timeout,
            log_level: value(ENV_LOG_LEVEL)
                .map(|level| level.trim().to_string())
                .unwrap_or(defaults.log_level),
            log_dir: value(ENV_LOG_DIR).map(PathBuf::from),
        })
    }

    pub fn db_options(&self) -> DbOptions {
        DbOptions {
            busy_timeout: self.busy_timeout,
        }
    }
}

fn parse<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigError, VisitorConfig, ENV_BUSY_TIMEOUT_MS, ENV_LOG_DIR, ENV_MAX_ATTEMPTS,
        ENV_STORE_DB,
    };
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn load(pairs: &[(&str, &str)]) -> Result<VisitorConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        VisitorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn unset_variables_use_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, VisitorConfig::default());
        assert_eq!(config.max_attempts, 5);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn set_variables_override_defaults() {
        let config = load(&[
            (ENV_STORE_DB, "/tmp/store.db"),
            (ENV_MAX_ATTEMPTS, " 9 "),
            (ENV_BUSY_TIMEOUT_MS, "250"),
            (ENV_LOG_DIR, "/tmp/visitor-logs"),
        ])
        .unwrap();

        assert_eq!(config.store_db_path, PathBuf::from("/tmp/store.db"));
        assert_eq!(config.max_attempts, 9);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/visitor-logs")));
    }

    #[test]
    fn malformed_numbers_are_rejected_with_key() {
        let err = load(&[(ENV_MAX_ATTEMPTS, "many")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key, .. } if key == ENV_MAX_ATTEMPTS));
    }

    #[test]
    fn zero_attempts_are_rejected() {
        let err = load(&[(ENV_MAX_ATTEMPTS, "0")]).unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn zero_attempts_error_reports_raw_value() {
        for raw in [" 0 ", "00"] {
            let err = load(&[(ENV_MAX_ATTEMPTS, raw)]).unwrap_err();
            assert!(
                matches!(&err, ConfigError::Invalid { key, value, .. } if *key == ENV_MAX_ATTEMPTS && value == raw),
                "unexpected error for `{raw}`: {err}"
            );
        }
    }
}
