//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Location
//!
//! Searched in order:
//! 1. `$METASYNC_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/metasync/config.toml`
//! 3. `~/.metasync/config.toml`
//!
//! # Validation
//!
//! Config values are validated after parsing (e.g., the endpoint must be an
//! http(s) URL and the page size must be positive).

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Largest page size accepted. Servers cap page sizes well below this.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Log levels accepted by `[logging] level`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Top-level configuration file.
///
/// # Example
///
/// ```toml
/// [rest]
/// api_endpoint = "https://demo.example.org/server/api"
/// timeout_secs = 30
/// user_agent = "metasync"
///
/// [fetch]
/// page_size = 20
/// workers = 4
///
/// [logging]
/// level = "info"
/// file = "/var/log/metasync.log"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// REST transport settings
    pub rest: Option<RestConfig>,

    /// Paginated retrieval settings
    pub fetch: Option<FetchConfig>,

    /// Log output settings
    pub logging: Option<LoggingConfig>,
}

impl ConfigFile {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(rest) = &self.rest {
            rest.validate()?;
        }
        if let Some(fetch) = &self.fetch {
            fetch.validate()?;
        }
        if let Some(logging) = &self.logging {
            logging.validate()?;
        }
        Ok(())
    }
}

/// `[rest]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RestConfig {
    /// Base URL of the REST API, e.g. `https://host/server/api`
    pub api_endpoint: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// User-Agent header value
    pub user_agent: Option<String>,
}

impl RestConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(endpoint) = &self.api_endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(ConfigError::InvalidValue(format!(
                    "api_endpoint must be an http(s) URL, got '{}'",
                    endpoint
                )));
            }
        }

        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "timeout_secs must be positive".to_string(),
            ));
        }

        if let Some(agent) = &self.user_agent {
            if agent.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "user_agent cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// `[fetch]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Items requested per page
    pub page_size: Option<u32>,

    /// Concurrent page requests; 0 fetches pages one at a time
    pub workers: Option<usize>,
}

impl FetchConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(size) = self.page_size {
            if size == 0 || size > MAX_PAGE_SIZE {
                return Err(ConfigError::InvalidValue(format!(
                    "page_size must be between 1 and {}, got {}",
                    MAX_PAGE_SIZE, size
                )));
            }
        }
        Ok(())
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: Option<String>,

    /// Also write logs to this file
    pub file: Option<std::path::PathBuf>,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(level) = &self.level {
            if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid log level '{}', must be one of: {}",
                    level,
                    LOG_LEVELS.join(", ")
                )));
            }
        }
        Ok(())
    }
}
