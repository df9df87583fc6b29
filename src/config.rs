//! Configuration management for auth-session.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::error::StorageError;
use crate::storage::{FileStorage, MemoryStorage, Storage};

/// Default namespace for storage keys.
pub const DEFAULT_PREFIX: &str = "satoken:";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Available storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Memory,
    File,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::File => f.write_str("file"),
        }
    }
}

/// Storage configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Which backend to open.
    pub backend: Backend,
    /// Namespace prepended to every session key.
    pub key_prefix: String,
    /// Store file, required by the file backend.
    pub path: Option<PathBuf>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            key_prefix: DEFAULT_PREFIX.to_string(),
            path: None,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    ///
    /// An unparsable `AUTH_SESSION_BACKEND` is an error rather than being
    /// silently ignored.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(prefix) = std::env::var("AUTH_SESSION_PREFIX") {
            self.storage.key_prefix = prefix;
        }

        if let Ok(backend) = std::env::var("AUTH_SESSION_BACKEND") {
            self.storage.backend = backend.parse()?;
        }

        if let Ok(path) = std::env::var("AUTH_SESSION_STORE") {
            if !path.is_empty() {
                self.storage.path = Some(PathBuf::from(path));
            }
        }

        if let Ok(level) = std::env::var("AUTH_SESSION_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref prefix) = args.prefix {
            self.storage.key_prefix = prefix.clone();
        }

        if let Some(backend) = args.backend {
            self.storage.backend = backend;
        }

        if let Some(ref path) = args.store {
            self.storage.path = Some(path.clone());
            // A store file implies the file backend unless one was named.
            if args.backend.is_none() {
                self.storage.backend = Backend::File;
            }
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env()?;
        config.apply_args(args);

        Ok(config)
    }

    /// Open the configured storage backend.
    pub fn open_storage(&self) -> Result<Arc<dyn Storage>, ConfigError> {
        match self.storage.backend {
            Backend::Memory => Ok(Arc::new(MemoryStorage::new())),
            Backend::File => {
                let path = self
                    .storage
                    .path
                    .as_ref()
                    .ok_or(ConfigError::MissingPath)?;
                let storage = FileStorage::open(path).map_err(ConfigError::Storage)?;
                Ok(Arc::new(storage))
            }
        }
    }

    /// Namespace prefix for session keys.
    pub fn prefix(&self) -> &str {
        &self.storage.key_prefix
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Unknown backend name.
    UnknownBackend(String),
    /// File backend selected without a store path.
    MissingPath,
    /// Backend could not be opened.
    Storage(StorageError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::UnknownBackend(name) => write!(f, "unknown storage backend: {}", name),
            Self::MissingPath => write!(f, "file backend requires a store path"),
            Self::Storage(e) => write!(f, "failed to open storage: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Storage(e) => Some(e),
            _ => None,
        }
    }
}
