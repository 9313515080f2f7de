//! rest::traits
//!
//! Transport trait definition for talking to the repository REST API.
//!
//! # Design
//!
//! The `Transport` trait is async because every call involves network I/O.
//! The sync engine and the paged fetcher only see this trait, so tests can
//! swap in [`MockTransport`](super::mock::MockTransport) for a live server.
//!
//! Paths are relative to the configured API root, e.g.
//! `core/items/<uuid>`.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::patch::PatchDescriptor;

/// Errors from REST operations.
///
/// These map the failure modes of the remote store. Everything other than
/// `NotFound` and `AuthFailed` is a transport failure.
#[derive(Debug, Clone, Error)]
pub enum RestError {
    /// The requested resource does not exist.
    #[error("not found: {endpoint}")]
    NotFound { endpoint: String },

    /// The request was refused after the anti-forgery token was refreshed,
    /// or the credentials were rejected.
    #[error("authentication failed for {endpoint}: {message}")]
    AuthFailed { endpoint: String, message: String },

    /// Any other non-success status.
    #[error("API error: {status} from {endpoint} - {message}")]
    Api {
        status: u16,
        endpoint: String,
        message: String,
    },

    /// Connection, timeout or other I/O failure.
    #[error("network error: {0}")]
    Network(String),

    /// The response did not have the expected shape.
    #[error("malformed response from {endpoint}: {message}")]
    Malformed { endpoint: String, message: String },
}

impl RestError {
    pub(crate) fn malformed(endpoint: &str, message: impl Into<String>) -> Self {
        RestError::Malformed {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }
}

/// Transport seam between the engine and the network.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the paged fetcher issues several
/// `get` calls concurrently against one transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET a JSON document.
    ///
    /// # Errors
    ///
    /// - `NotFound` on 404
    /// - `AuthFailed` on 401/403
    /// - `Api`, `Network` or `Malformed` otherwise
    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value, RestError>;

    /// Send a JSON-Patch body. Returns the updated document when the server
    /// sends one back.
    ///
    /// Implementations that talk to a real server must prime the request and
    /// retry once on a 403.
    async fn patch(&self, path: &str, body: &[PatchDescriptor])
        -> Result<Option<Value>, RestError>;
}
