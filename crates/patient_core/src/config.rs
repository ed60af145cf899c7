//! Process configuration loaded from the environment.
//!
//! # Responsibility
//! - Select the record store backend and its location.
//! - Carry logging settings for `init_logging`.
//!
//! # Invariants
//! - Loading never touches the filesystem; stores are opened separately.
//! - Unknown or malformed values are rejected, not silently defaulted.

use crate::logging::{default_log_level, normalize_level};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_BACKEND: &str = "PATIENTS_BACKEND";
pub const ENV_STORE_PATH: &str = "PATIENTS_STORE_PATH";
pub const ENV_LOCK_TIMEOUT_MS: &str = "PATIENTS_LOCK_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "PATIENTS_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "PATIENTS_LOG_DIR";

const DEFAULT_JSON_PATH: &str = "data/patients.json";
const DEFAULT_SQLITE_PATH: &str = "data/patients.sqlite3";

/// Persistence backend behind the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Single JSON document guarded by an advisory file lock.
    Json,
    /// SQLite database file.
    Sqlite,
}

impl StoreBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Sqlite => "sqlite",
        }
    }

    /// Path used when no explicit store path is configured.
    pub fn default_path(self) -> PathBuf {
        match self {
            Self::Json => PathBuf::from(DEFAULT_JSON_PATH),
            Self::Sqlite => PathBuf::from(DEFAULT_SQLITE_PATH),
        }
    }

    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" | "file" => Ok(Self::Json),
            "sqlite" | "sql" => Ok(Self::Sqlite),
            other => Err(ConfigError::UnsupportedBackend(other.to_string())),
        }
    }
}

/// Store selection and locking behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
    /// Upper bound on lock waits; `None` blocks (json) or uses the SQLite
    /// default busy timeout.
    pub lock_timeout: Option<Duration>,
}

impl StoreConfig {
    /// Config for `backend` at its default path.
    pub fn new(backend: StoreBackend) -> Self {
        Self {
            backend,
            path: backend.default_path(),
            lock_timeout: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(StoreBackend::Json)
    }
}

/// Full process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub log_level: &'static str,
    /// File logging is disabled when unset.
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Reads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|raw| !raw.trim().is_empty());

        let backend = match value(ENV_BACKEND) {
            Some(raw) => StoreBackend::parse(&raw)?,
            None => StoreBackend::Json,
        };
        let path = value(ENV_STORE_PATH)
            .map(|raw| PathBuf::from(raw.trim()))
            .unwrap_or_else(|| backend.default_path());
        let lock_timeout = value(ENV_LOCK_TIMEOUT_MS)
            .map(|raw| parse_lock_timeout_ms(&raw))
            .transpose()?;
        let log_level = match value(ENV_LOG_LEVEL) {
            Some(raw) => normalize_level(&raw).map_err(ConfigError::InvalidLogLevel)?,
            None => default_log_level(),
        };
        let log_dir = value(ENV_LOG_DIR).map(|raw| PathBuf::from(raw.trim()));

        Ok(Self {
            store: StoreConfig {
                backend,
                path,
                lock_timeout,
            },
            log_level,
            log_dir,
        })
    }
}

/// Parses a positive millisecond count.
pub fn parse_lock_timeout_ms(value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(millis) if millis > 0 => Ok(Duration::from_millis(millis)),
        _ => Err(ConfigError::InvalidLockTimeout(value.trim().to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnsupportedBackend(String),
    InvalidLockTimeout(String),
    InvalidLogLevel(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedBackend(value) => write!(
                f,
                "unsupported store backend `{value}`; expected json|sqlite"
            ),
            Self::InvalidLockTimeout(value) => write!(
                f,
                "invalid lock timeout `{value}`; expected a positive number of milliseconds"
            ),
            Self::InvalidLogLevel(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError, StoreBackend};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_json_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Json);
        assert_eq!(config.store.path, PathBuf::from("data/patients.json"));
        assert_eq!(config.store.lock_timeout, None);
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn sqlite_backend_switches_default_path() {
        let config = config_from(&[("PATIENTS_BACKEND", "SQLite")]).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.path, PathBuf::from("data/patients.sqlite3"));
    }

    #[test]
    fn explicit_values_are_applied() {
        let config = config_from(&[
            ("PATIENTS_STORE_PATH", "/srv/clinic/patients.json"),
            ("PATIENTS_LOCK_TIMEOUT_MS", "250"),
            ("PATIENTS_LOG_LEVEL", "WARNING"),
            ("PATIENTS_LOG_DIR", "/var/log/clinic"),
        ])
        .unwrap();
        assert_eq!(config.store.path, PathBuf::from("/srv/clinic/patients.json"));
        assert_eq!(config.store.lock_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/clinic")));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(
            config_from(&[("PATIENTS_BACKEND", "mysql")]),
            Err(ConfigError::UnsupportedBackend(_))
        ));
        assert!(matches!(
            config_from(&[("PATIENTS_LOCK_TIMEOUT_MS", "0")]),
            Err(ConfigError::InvalidLockTimeout(_))
        ));
        assert!(matches!(
            config_from(&[("PATIENTS_LOG_LEVEL", "loud")]),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }
}
