//! rest::session
//!
//! Per-client session state: the anti-forgery token and the login header.
//!
//! # Token flow
//!
//! The server hands out a fresh token in the `DSPACE-XSRF-TOKEN` response
//! header. Every response that carries it replaces the stored token. The
//! token goes back to the server twice on each later request: as the
//! `X-XSRF-TOKEN` header and as the `DSPACE-XSRF-COOKIE` cookie.
//!
//! # Concurrency
//!
//! State sits behind one `RwLock`. Writes are exclusive; a request reads a
//! snapshot when it is built and keeps that value even if another response
//! refreshes the token while it is in flight.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE};
use reqwest::RequestBuilder;
use tracing::debug;

/// Response header carrying a fresh token.
pub const TOKEN_RESPONSE_HEADER: &str = "DSPACE-XSRF-TOKEN";

/// Request header echoing the token.
pub const TOKEN_REQUEST_HEADER: &str = "X-XSRF-TOKEN";

/// Cookie echoing the token.
pub const TOKEN_COOKIE: &str = "DSPACE-XSRF-COOKIE";

#[derive(Debug, Clone, Default)]
struct SessionState {
    token: Option<String>,
    authorization: Option<String>,
}

/// Shared session state for one REST client.
#[derive(Debug, Default)]
pub struct XsrfSession {
    state: RwLock<SessionState>,
}

impl XsrfSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Take a fresh token from response headers, if there is one.
    ///
    /// Returns whether the stored token changed.
    pub fn absorb(&self, headers: &HeaderMap) -> bool {
        let Some(token) = headers
            .get(TOKEN_RESPONSE_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
        else {
            return false;
        };

        let mut state = self.write();
        if state.token.as_deref() == Some(token) {
            return false;
        }
        state.token = Some(token.to_string());
        debug!("anti-forgery token refreshed");
        true
    }

    /// The current token.
    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    pub fn set_authorization(&self, value: impl Into<String>) {
        self.write().authorization = Some(value.into());
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().authorization.is_some()
    }

    /// Headers carrying the current session state.
    pub fn headers(&self) -> HeaderMap {
        let state = self.read().clone();
        let mut headers = HeaderMap::new();

        if let Some(token) = &state.token {
            if let Ok(value) = HeaderValue::from_str(token) {
                headers.insert(TOKEN_REQUEST_HEADER, value);
            }
            if let Ok(value) = HeaderValue::from_str(&format!("{}={}", TOKEN_COOKIE, token)) {
                headers.insert(COOKIE, value);
            }
        }

        if let Some(auth) = &state.authorization {
            if let Ok(mut value) = HeaderValue::from_str(auth) {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }

    /// Attach the current session headers to a request.
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        request.headers(self.headers())
    }
}
