//! logging
//!
//! Process-wide `tracing` subscriber setup.
//!
//! `RUST_LOG` wins over the configured level. Console output goes to
//! stderr; when a log file is configured, the same events are appended
//! to it without color codes.

use std::fs::OpenOptions;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::core::config::Config;

/// Errors from logging setup.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {message}")]
    Filter { filter: String, message: String },

    #[error("failed to open log file {path}: {source}")]
    File {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A global subscriber was already installed.
    #[error("logging already initialized")]
    AlreadyInitialized,
}

/// Build the level filter for `config`.
pub fn filter(config: &Config) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directive = config.log_level();
    EnvFilter::try_new(directive).map_err(|e| LoggingError::Filter {
        filter: directive.to_string(),
        message: e.to_string(),
    })
}

/// Install the global subscriber.
pub fn init(config: &Config) -> Result<(), LoggingError> {
    let filter = filter(config)?;

    let file_layer = match config.log_file() {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|source| LoggingError::File {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::File {
                    path: path.to_path_buf(),
                    source,
                })?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true),
            )
        }
        None => None,
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    if let Some(path) = config.log_file() {
        tracing::debug!(path = %path.display(), "file logging enabled");
    }
    Ok(())
}
