//! Configuration loading for sync-server.
//!
//! Configuration is loaded from a TOML file (default: `dirsync.toml`).
//! Every section and field is optional.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use sync_core::PolicyKind;
use sync_types::{DEFAULT_MAX_FRAME_SIZE, FILE_TRANSFER_CHANNEL};

/// Root configuration for sync-server.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Synchronization behaviour.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Limits.
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the TCP listener (default: 0.0.0.0:7400).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Directory kept in sync (default: ./sync).
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// Single-instance lock file (default: dirsync-server.lock in the
    /// system temp directory).
    #[serde(default = "default_lock_path")]
    pub lock_path: PathBuf,
}

/// Synchronization behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Ingest strategy: `hash_diff` or `versioned` (default: hash_diff).
    #[serde(default)]
    pub policy: PolicyKind,
    /// Echo a client's uploads back to it in the broadcast (default: false).
    #[serde(default)]
    pub broadcast_to_origin: bool,
    /// Prefix ingested files with a per-exchange token (default: false).
    #[serde(default)]
    pub unique_prefix: bool,
    /// Channel envelopes travel on.
    #[serde(default = "default_channel")]
    pub channel: String,
}

/// Limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum frame payload in bytes (default: 64MB).
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Idle read timeout per connection in seconds (default: none).
    #[serde(default)]
    pub read_timeout_secs: Option<u64>,
    /// Time allowed for one outgoing frame before the peer is skipped (default: 30).
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
}

impl LimitsConfig {
    /// Read timeout as a duration.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }

    /// Write timeout as a duration.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:7400".to_string()
}

fn default_directory() -> PathBuf {
    PathBuf::from("sync")
}

fn default_lock_path() -> PathBuf {
    std::env::temp_dir().join("dirsync-server.lock")
}

fn default_channel() -> String {
    FILE_TRANSFER_CHANNEL.to_string()
}

fn default_max_message_size() -> usize {
    DEFAULT_MAX_FRAME_SIZE
}

fn default_write_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            directory: default_directory(),
            lock_path: default_lock_path(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::default(),
            broadcast_to_origin: false,
            unique_prefix: false,
            channel: default_channel(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            read_timeout_secs: None,
            write_timeout_secs: default_write_timeout_secs(),
        }
    }
}

impl Config {
    /// Configuration serving `directory` with every other field defaulted.
    pub fn for_directory(directory: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.server.directory = directory.into();
        config
    }

    /// Load configuration from a TOML file.
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
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
