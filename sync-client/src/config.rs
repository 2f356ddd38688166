//! Configuration loading for Bastion.
//!
//! Configuration is loaded from a TOML file (default: `bastion.toml`).
//! Every section and field is optional.

use crate::backend::RestConfig;
use bastion_sync_core::RetryPolicy;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote backend selection.
    pub backend: BackendConfig,
    /// Local change log.
    pub store: StoreConfig,
    /// Reconnection behaviour.
    pub connection: ConnectionConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// Which backend implementation to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// The hosted service over HTTP.
    Live,
    /// In-memory sample data.
    Mock,
}

/// Backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Live or mock (default: mock).
    #[serde(default = "default_source")]
    pub source: SourceKind,
    /// Project URL of the hosted service.
    #[serde(default = "default_url")]
    pub url: String,
    /// Environment variable holding the API key (default: BASTION_API_KEY).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Per-request timeout in seconds (default: 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Kind of durable change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// JSON file under the data directory.
    File,
    /// SQLite database under the data directory.
    Sqlite,
    /// Not persisted (tests, throwaway runs).
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store kind (default: file).
    #[serde(default = "default_store_kind")]
    pub kind: StoreKind,
    /// Data directory (default: bastion-data).
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

/// Reconnection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Delay before the first reconnection probe, in ms (default: 2000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Consecutive failed probes before giving up (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Assume the backend is reachable at startup (default: false).
    #[serde(default)]
    pub start_connected: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive (default: info). `RUST_LOG` wins.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

// Default value functions
fn default_source() -> SourceKind {
    SourceKind::Mock
}

fn default_url() -> String {
    "http://localhost:54321".to_string()
}

fn default_api_key_env() -> String {
    "BASTION_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_store_kind() -> StoreKind {
    StoreKind::File
}

fn default_store_path() -> PathBuf {
    PathBuf::from("bastion-data")
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_max_retries() -> u32 {
    3
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            url: default_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: default_store_kind(),
            path: default_store_path(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_retries: default_max_retries(),
            start_connected: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

impl BackendConfig {
    /// HTTP settings for [`RestBackend`](crate::backend::RestBackend).
    /// The API key is read from the configured environment variable.
    pub fn rest_config(&self) -> RestConfig {
        RestConfig {
            url: self.url.clone(),
            api_key: std::env::var(&self.api_key_env)
                .ok()
                .filter(|k| !k.is_empty()),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

impl ConnectionConfig {
    /// The backoff policy these settings describe.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(self.base_delay_ms), self.max_retries)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}
