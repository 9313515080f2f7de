//! rest::client
//!
//! HTTP transport for the repository REST API.
//!
//! # Request priming
//!
//! The server only accepts a mutating request (POST, PATCH, PUT, DELETE)
//! when it carries a current anti-forgery token. Before each one the client
//! sends a bodyless request with the same method and URL. The status of
//! that priming request is ignored; only the token header in its response
//! matters.
//!
//! # Retry policy
//!
//! A 403 on the real request means the token went stale between priming and
//! sending. The client primes again and retries exactly once. A second 403
//! is returned as [`RestError::AuthFailed`].
//!
//! # Example
//!
//! ```no_run
//! use metasync::core::config::Config;
//! use metasync::rest::RestClient;
//!
//! # async fn run() -> Result<(), metasync::rest::RestError> {
//! let config = Config::default().with_api_endpoint("https://demo.example.org/server/api");
//! let client = RestClient::new(&config)?;
//!
//! let info = client.endpoint_info().await?;
//! println!("connected to {} ({})", info.name, info.version);
//!
//! client.login("admin@example.org", "secret").await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::patch::{PatchDescriptor, PatchOp};
use super::session::XsrfSession;
use super::traits::{RestError, Transport};
use crate::core::config::Config;

/// Idle connections kept per host unless more workers are configured.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Body of a mutating request.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

/// Identity of the server behind the API root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointInfo {
    #[serde(rename = "dspaceName")]
    pub name: String,
    #[serde(rename = "dspaceUI")]
    pub ui_url: String,
    #[serde(rename = "dspaceServer")]
    pub server_url: String,
    #[serde(rename = "dspaceVersion")]
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct AuthStatus {
    #[serde(default)]
    authenticated: bool,
}

/// REST client with anti-forgery token handling.
pub struct RestClient {
    /// HTTP client for making requests
    client: Client,
    /// API root without trailing slash
    endpoint: String,
    /// Token and login state shared by all requests
    session: XsrfSession,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("endpoint", &self.endpoint)
            .field("has_token", &self.session.token().is_some())
            .field("authenticated", &self.session.is_authenticated())
            .finish()
    }
}

impl RestClient {
    /// Create a client for the configured endpoint.
    ///
    /// The connection pool is widened to the worker count when that exceeds
    /// [`DEFAULT_POOL_SIZE`].
    pub fn new(config: &Config) -> Result<Self, RestError> {
        let workers = config.workers();
        if workers > DEFAULT_POOL_SIZE {
            info!(
                workers,
                "worker count exceeds the default pool size, widening connection pool"
            );
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent())
            .pool_max_idle_per_host(workers.max(DEFAULT_POOL_SIZE))
            .build()
            .map_err(|e| RestError::Network(e.to_string()))?;

        debug!(endpoint = config.api_endpoint(), workers, "rest client created");

        Ok(Self {
            client,
            endpoint: config.api_endpoint().to_string(),
            session: XsrfSession::new(),
        })
    }

    /// The API root.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn session(&self) -> &XsrfSession {
        &self.session
    }

    /// Absolute URL for a path. Absolute URLs under the API root pass
    /// through unchanged, so HAL links can be followed directly.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with(&self.endpoint) {
            return path.to_string();
        }
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            self.endpoint.clone()
        } else {
            format!("{}/{}", self.endpoint, path)
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.session.apply(self.client.request(method, url))
    }

    /// Send a bodyless request to pick up a fresh token.
    async fn prime(&self, method: &Method, url: &str) -> Result<(), RestError> {
        let response = self
            .request(method.clone(), url)
            .send()
            .await
            .map_err(|e| RestError::Network(e.to_string()))?;
        self.session.absorb(response.headers());
        debug!(%method, url, status = response.status().as_u16(), "primed request");
        Ok(())
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        body: &RequestBody,
    ) -> Result<Response, RestError> {
        let request = self.request(method.clone(), url);
        let request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(value),
            RequestBody::Form(fields) => request.form(fields),
        };
        let response = request
            .send()
            .await
            .map_err(|e| RestError::Network(e.to_string()))?;
        self.session.absorb(response.headers());
        Ok(response)
    }

    /// Prime, send, and retry once on a 403.
    async fn send_primed(
        &self,
        method: Method,
        url: &str,
        body: &RequestBody,
    ) -> Result<Response, RestError> {
        self.prime(&method, url).await?;
        debug!(%method, url, "sending request");
        let response = self.send_once(&method, url, body).await?;

        if response.status() != StatusCode::FORBIDDEN {
            return Ok(response);
        }

        warn!(%method, url, "request refused, refreshing anti-forgery token and retrying");
        self.prime(&method, url).await?;
        self.send_once(&method, url, body).await
    }

    /// Send a mutating request and decode the response.
    ///
    /// Returns `None` for an empty (e.g. 204) response.
    pub async fn send_mutating(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> Result<Option<Value>, RestError> {
        let url = self.url(path);
        let response = self.send_primed(method, &url, &body).await?;
        Self::handle_response(&url, response).await
    }

    /// GET a JSON document.
    pub async fn get_json(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Value, RestError> {
        let url = self.url(path);
        debug!(url, ?params, "GET");
        let response = self
            .request(Method::GET, &url)
            .query(params)
            .send()
            .await
            .map_err(|e| RestError::Network(e.to_string()))?;
        self.session.absorb(response.headers());

        Ok(Self::handle_response(&url, response)
            .await?
            .unwrap_or(Value::Null))
    }

    /// DELETE a resource.
    pub async fn delete(&self, path: &str) -> Result<(), RestError> {
        self.send_mutating(Method::DELETE, path, RequestBody::Empty)
            .await?;
        info!(path, "deleted");
        Ok(())
    }

    /// Check that the API root is reachable and describe the server.
    pub async fn endpoint_info(&self) -> Result<EndpointInfo, RestError> {
        debug!(endpoint = %self.endpoint, "checking endpoint status");
        let doc = self.get_json("", &[]).await?;
        let info: EndpointInfo = serde_json::from_value(doc).map_err(|e| {
            RestError::malformed(
                &self.endpoint,
                format!("not a repository API root: {}", e),
            )
        })?;
        info!(
            name = %info.name,
            ui = %info.ui_url,
            server = %info.server_url,
            version = %info.version,
            "connected to endpoint"
        );
        Ok(info)
    }

    /// Log in with a password.
    ///
    /// Stores the returned `Authorization` header for all later requests and
    /// confirms the login against `authn/status`.
    pub async fn login(&self, user: &str, password: &str) -> Result<(), RestError> {
        info!(user, endpoint = %self.endpoint, "authenticating");
        let url = self.url("authn/login");
        let body = RequestBody::Form(vec![
            ("user".to_string(), user.to_string()),
            ("password".to_string(), password.to_string()),
        ]);

        let response = self.send_primed(Method::POST, &url, &body).await?;
        if let Some(auth) = response
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        {
            self.session.set_authorization(auth);
        }
        Self::handle_response(&url, response).await?;

        let status_url = self.url("authn/status");
        let status: AuthStatus = serde_json::from_value(self.get_json(&status_url, &[]).await?)
            .map_err(|e| RestError::malformed(&status_url, e.to_string()))?;

        if status.authenticated {
            info!(user, "authentication succeeded");
            Ok(())
        } else {
            error!(user, "authentication failed");
            Err(RestError::AuthFailed {
                endpoint: url,
                message: format!("server did not accept the login for '{}'", user),
            })
        }
    }

    /// Map a response to a document or an error.
    async fn handle_response(url: &str, response: Response) -> Result<Option<Value>, RestError> {
        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("json"))
            .unwrap_or(true);
        let text = response
            .text()
            .await
            .map_err(|e| RestError::Network(e.to_string()))?;

        if status.is_success() {
            if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
                return Ok(None);
            }
            if !is_json {
                return Ok(Some(Value::String(text)));
            }
            return serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| RestError::malformed(url, e.to_string()));
        }

        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            });

        Err(match status {
            StatusCode::NOT_FOUND => {
                warn!(url, "object does not exist");
                RestError::NotFound {
                    endpoint: url.to_string(),
                }
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                error!(url, status = status.as_u16(), %message, "request refused");
                RestError::AuthFailed {
                    endpoint: url.to_string(),
                    message,
                }
            }
            _ => {
                error!(url, status = status.as_u16(), %message, "request failed");
                RestError::Api {
                    status: status.as_u16(),
                    endpoint: url.to_string(),
                    message,
                }
            }
        })
    }
}

#[async_trait]
impl Transport for RestClient {
    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value, RestError> {
        self.get_json(path, params).await
    }

    async fn patch(
        &self,
        path: &str,
        body: &[PatchDescriptor],
    ) -> Result<Option<Value>, RestError> {
        debug!(path, operations = body.len(), "PATCH");
        let json = serde_json::to_value(body)
            .map_err(|e| RestError::malformed(path, format!("unencodable patch: {}", e)))?;
        let result = self
            .send_mutating(Method::PATCH, path, RequestBody::Json(json))
            .await?;

        match &result {
            Some(doc) => {
                let uuid = doc.get("uuid").and_then(Value::as_str).unwrap_or("?");
                info!(uuid, "updated object")
            }
            None if body.iter().all(|d| d.op == PatchOp::Remove) => {
                info!(path, "removed metadata")
            }
            None => debug!(path, "patch accepted without a body"),
        }
        Ok(result)
    }
}
