//! Configuration for ResendForward

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides, e.g. `RESENDFORWARD__BACKEND__URL`
const ENV_PREFIX: &str = "RESENDFORWARD";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend connection
    #[serde(default)]
    pub backend: BackendConfig,

    /// Refetch behaviour for queries with in-flight records
    #[serde(default)]
    pub polling: PollingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend (PocketBase) connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Login identity (email or username)
    pub identity: Option<String>,

    /// Login password
    pub password: Option<String>,

    /// Auth collection used for password login
    #[serde(default = "default_auth_collection")]
    pub auth_collection: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Batch size when fetching full lists
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            identity: None,
            password: None,
            auth_collection: default_auth_collection(),
            timeout_secs: default_timeout(),
            page_size: default_page_size(),
        }
    }
}

impl BackendConfig {
    /// Password credentials, when both halves are configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.identity, &self.password) {
            (Some(identity), Some(password)) => Some((identity.as_str(), password.as_str())),
            _ => None,
        }
    }
}

fn default_backend_url() -> String {
    "http://127.0.0.1:8090".to_string()
}

fn default_auth_collection() -> String {
    "users".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_page_size() -> u32 {
    500
}

/// Polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Refetch interval in milliseconds while a result holds in-flight records
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,

    /// Capacity of the cache event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_poll_interval() -> u64 {
    3000
}

fn default_event_buffer() -> usize {
    256
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from the first default file found, overridden by environment
    pub fn load() -> crate::Result<Self> {
        let paths = [
            PathBuf::from("./resendforward.toml"),
            PathBuf::from("/etc/resendforward/config.toml"),
        ];

        let mut builder = config::Config::builder();
        if let Some(path) = paths.iter().find(|p| p.exists()) {
            tracing::debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(config::File::from(path.as_path()));
        }

        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .and_then(|c| c.try_deserialize::<Config>())
            .map_err(|e| crate::Error::Config(format!("Failed to load config: {}", e)))
    }
}
