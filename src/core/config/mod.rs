//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. Builder overrides applied by the caller (`with_*`)
//!
//! # Locations
//!
//! Searched in order:
//! 1. `$METASYNC_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/metasync/config.toml`
//! 3. `~/.metasync/config.toml`
//!
//! Missing files are not an error; defaults are used.
//!
//! # Example
//!
//! ```
//! use metasync::core::config::Config;
//!
//! let config = Config::default()
//!     .with_api_endpoint("https://demo.example.org/server/api")
//!     .with_workers(4);
//!
//! assert_eq!(config.workers(), 4);
//! assert_eq!(config.page_size(), 20);
//! ```

pub mod schema;

pub use schema::{ConfigFile, FetchConfig, LoggingConfig, RestConfig};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Default REST API base URL.
pub const DEFAULT_API_ENDPOINT: &str = "http://localhost:8080/server/api";

/// Default page size for paginated retrieval.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Resolved configuration.
///
/// Accessors apply defaults for anything the file leaves unset.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents (or overrides)
    pub file: ConfigFile,
    /// Path the file was loaded from, if any
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed
    /// or validated.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::locate() {
            Some(path) => Self::from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        file.validate()?;

        Ok(Self {
            file,
            path: Some(path.to_path_buf()),
        })
    }

    fn locate() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("METASYNC_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("metasync/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".metasync/config.toml"))
            .filter(|path| path.exists())
    }

    /// Validate the resolved values, including builder overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.file.validate()
    }

    // =========================================================================
    // Builder overrides
    // =========================================================================

    pub fn with_api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.rest_mut().api_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.rest_mut().timeout_secs = Some(secs);
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.rest_mut().user_agent = Some(agent.into());
        self
    }

    pub fn with_page_size(mut self, size: u32) -> Self {
        self.fetch_mut().page_size = Some(size);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.fetch_mut().workers = Some(workers);
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.logging_mut().level = Some(level.into());
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.logging_mut().file = Some(path.into());
        self
    }

    fn rest_mut(&mut self) -> &mut RestConfig {
        self.file.rest.get_or_insert_with(Default::default)
    }

    fn fetch_mut(&mut self) -> &mut FetchConfig {
        self.file.fetch.get_or_insert_with(Default::default)
    }

    fn logging_mut(&mut self) -> &mut LoggingConfig {
        self.file.logging.get_or_insert_with(Default::default)
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// REST API base URL without a trailing slash.
    ///
    /// Defaults to `http://localhost:8080/server/api`.
    pub fn api_endpoint(&self) -> &str {
        self.file
            .rest
            .as_ref()
            .and_then(|r| r.api_endpoint.as_deref())
            .unwrap_or(DEFAULT_API_ENDPOINT)
            .trim_end_matches('/')
    }

    /// Per-request timeout. Defaults to 30 seconds.
    pub fn timeout(&self) -> Duration {
        let secs = self
            .file
            .rest
            .as_ref()
            .and_then(|r| r.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// User-Agent header. Defaults to "metasync/<version>".
    pub fn user_agent(&self) -> String {
        self.file
            .rest
            .as_ref()
            .and_then(|r| r.user_agent.clone())
            .unwrap_or_else(|| format!("metasync/{}", env!("CARGO_PKG_VERSION")))
    }

    /// Items per page. Defaults to 20.
    pub fn page_size(&self) -> u32 {
        self.file
            .fetch
            .as_ref()
            .and_then(|f| f.page_size)
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Concurrent page requests. Defaults to 0 (sequential).
    pub fn workers(&self) -> usize {
        self.file.fetch.as_ref().and_then(|f| f.workers).unwrap_or(0)
    }

    /// Log level used when `RUST_LOG` is unset. Defaults to "info".
    pub fn log_level(&self) -> &str {
        self.file
            .logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or("info")
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.file.logging.as_ref().and_then(|l| l.file.as_deref())
    }

    /// Get the path the config was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
