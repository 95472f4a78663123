//! Bootstrap configuration loading
//!
//! Resolution order for every setting:
//! 1. Command-line argument (or its `CAMPUS_*` environment variable, handled by the binary)
//! 2. TOML config file
//! 3. Compiled default
//!
//! A missing TOML file is not fatal: the service starts
//! with defaults. A TOML file that exists but cannot be parsed is a
//! configuration error.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CAMPUS_CONFIG";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5780;
const DEFAULT_PERIODS_PER_DAY: u32 = 8;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Contents of the optional TOML file
///
/// Every field is optional so that a partial file only overrides what it names.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub database_path: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub port: Option<u16>,
    pub periods_per_day: Option<u32>,
    pub request_timeout_ms: Option<u64>,
    pub max_connections: Option<u32>,
    pub busy_timeout_ms: Option<u64>,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Guardian notification delivery
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NotificationConfig {
    /// Alerts are POSTed here when set, otherwise only logged
    pub webhook_url: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Option<String>,
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database_path: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub port: Option<u16>,
    pub periods_per_day: Option<u32>,
    pub request_timeout_ms: Option<u64>,
    pub webhook_url: Option<String>,
    pub log_level: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub database_path: PathBuf,
    pub bind_addr: String,
    pub port: u16,
    pub periods_per_day: u32,
    pub request_timeout_ms: u64,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
    pub notifications: NotificationConfig,
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            port: DEFAULT_PORT,
            periods_per_day: DEFAULT_PERIODS_PER_DAY,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            notifications: NotificationConfig::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Merge overrides, file contents and defaults, then validate
    pub fn resolve(overrides: &Overrides, file: Option<TomlConfig>) -> Result<Self> {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        let config = Self {
            database_path: overrides
                .database_path
                .clone()
                .or(file.database_path)
                .unwrap_or(defaults.database_path),
            bind_addr: overrides
                .bind_addr
                .clone()
                .or(file.bind_addr)
                .unwrap_or(defaults.bind_addr),
            port: overrides.port.or(file.port).unwrap_or(defaults.port),
            periods_per_day: overrides
                .periods_per_day
                .or(file.periods_per_day)
                .unwrap_or(defaults.periods_per_day),
            request_timeout_ms: overrides
                .request_timeout_ms
                .or(file.request_timeout_ms)
                .unwrap_or(defaults.request_timeout_ms),
            max_connections: file.max_connections.unwrap_or(defaults.max_connections),
            busy_timeout_ms: file.busy_timeout_ms.unwrap_or(defaults.busy_timeout_ms),
            notifications: NotificationConfig {
                webhook_url: overrides
                    .webhook_url
                    .clone()
                    .or(file.notifications.webhook_url),
            },
            log_level: overrides
                .log_level
                .clone()
                .or(file.logging.level)
                .unwrap_or(defaults.log_level),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.periods_per_day == 0 {
            return Err(Error::Config("periods_per_day must be at least 1".to_string()));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::Config("request_timeout_ms must be positive".to_string()));
        }
        if self.max_connections == 0 {
            return Err(Error::Config("max_connections must be at least 1".to_string()));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("database_path must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Locate the TOML file: explicit argument, then `CAMPUS_CONFIG`, then the platform config dir
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir().map(|d| d.join("campus").join("config.toml"))
}

/// Load the TOML file at `path`
///
/// Returns `Ok(None)` when the file does not exist. Called before the tracing
/// subscriber is installed, so the caller reports the outcome.
pub fn load_toml_config(path: &Path) -> Result<Option<TomlConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)?;
    let parsed = toml::from_str::<TomlConfig>(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

    Ok(Some(parsed))
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("campus"))
        .unwrap_or_else(|| PathBuf::from("./campus_data"))
        .join("campus.db")
}
