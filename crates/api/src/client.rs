//! Transport client: one pooled `reqwest::Client` bound to the Prefect API.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use prefect_mcp_types::{Endpoint, HttpMethod};
use reqwest::{Client, Method, StatusCode, header};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::ServiceConfig;

/// Failures where no usable HTTP response was obtained.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out after {timeout:?}: {cause}")]
    Timeout { timeout: Duration, cause: String },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    /// The request could not be built locally (for example an invalid URL).
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl TransportError {
    /// True when the failure happened on the wire rather than while building
    /// the request.
    pub fn is_transport(&self) -> bool {
        !matches!(self, Self::Invalid(_))
    }
}

/// Errors raised while constructing a [`PrefectClient`].
#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("API key is not a valid header value")]
    InvalidApiKey(#[from] header::InvalidHeaderValue),

    #[error("build http client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Status and body text of a response, before any decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Decode the body as JSON. An empty body is a decode error.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Seam between the error normalizer and the wire.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send one request and return the raw response, whatever its status.
    async fn perform(&self, endpoint: &Endpoint) -> Result<RawResponse, TransportError>;
}

/// Counts connection pools created and released.
#[derive(Debug, Default)]
pub struct PoolStats {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl PoolStats {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Pools acquired and not yet released.
    pub fn live(&self) -> usize {
        self.acquired().saturating_sub(self.released())
    }
}

/// Marks one pool as live until dropped.
#[derive(Debug)]
struct PoolGuard {
    stats: Arc<PoolStats>,
}

impl PoolGuard {
    fn acquire(stats: Arc<PoolStats>) -> Self {
        stats.acquired.fetch_add(1, Ordering::SeqCst);
        Self { stats }
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        self.stats.released.fetch_add(1, Ordering::SeqCst);
        debug!("Prefect API connection pool released");
    }
}

/// Thin wrapper around a configured `reqwest::Client` for Prefect API access.
///
/// Default headers carry `Content-Type: application/json` and, only when a
/// key is configured, `Authorization: Bearer <key>`. The underlying pool is
/// shared by every request made through this client and is released when
/// the last reference is dropped.
#[derive(Debug)]
pub struct PrefectClient {
    base_url: String,
    timeout: Duration,
    http: Client,
    _pool: PoolGuard,
}

impl PrefectClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, ClientBuildError> {
        Self::with_pool_stats(config, Arc::new(PoolStats::default()))
    }

    /// Build a client whose pool is accounted in `stats`.
    pub fn with_pool_stats(config: &ServiceConfig, stats: Arc<PoolStats>) -> Result<Self, ClientBuildError> {
        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(api_key) = config.api_key() {
            let mut authorization = header::HeaderValue::from_str(&format!("Bearer {api_key}"))?;
            authorization.set_sensitive(true);
            default_headers.insert(header::AUTHORIZATION, authorization);
        }

        let http = Client::builder()
            .default_headers(default_headers)
            .user_agent(config.user_agent())
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            base_url: config.base_url().to_string(),
            timeout: config.timeout(),
            http,
            _pool: PoolGuard::acquire(stats),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API-relative path.
    pub fn url_for(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn classify(&self, error: reqwest::Error) -> TransportError {
        let cause = error_chain(&error);
        if error.is_builder() {
            TransportError::Invalid(cause)
        } else if error.is_timeout() {
            TransportError::Timeout {
                timeout: self.timeout,
                cause,
            }
        } else if error.is_connect() {
            TransportError::Connect(cause)
        } else {
            TransportError::Request(cause)
        }
    }
}

#[async_trait]
impl Transport for PrefectClient {
    async fn perform(&self, endpoint: &Endpoint) -> Result<RawResponse, TransportError> {
        let url = self.url_for(endpoint.path());
        debug!(method = %endpoint.method(), %url, "sending Prefect API request");

        let mut builder = self.http.request(to_reqwest_method(endpoint.method()), url.as_str());
        if !endpoint.query().is_empty() {
            builder = builder.query(endpoint.query());
        }
        if let Some(body) = endpoint.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|error| self.classify(error))?;
        let status = response.status();
        let body = response.text().await.map_err(|error| self.classify(error))?;
        debug!(method = %endpoint.method(), %url, status = status.as_u16(), "received Prefect API response");

        Ok(RawResponse { status, body })
    }
}

/// Join a base URL and a relative path with exactly one `/` between them.
pub fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let relative = path.trim_start_matches('/');
    if relative.is_empty() {
        return base.to_string();
    }
    format!("{base}/{relative}")
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
    }
}

/// Render an error with its full source chain, `outer: inner: root`.
fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_uses_exactly_one_slash() {
        assert_eq!(join_url("http://h/api", "flows"), "http://h/api/flows");
        assert_eq!(join_url("http://h/api/", "flows"), "http://h/api/flows");
        assert_eq!(join_url("http://h/api", "/flows"), "http://h/api/flows");
        assert_eq!(join_url("http://h/api//", "//flows/filter"), "http://h/api/flows/filter");
        assert_eq!(join_url("http://h/api", ""), "http://h/api");
    }

    #[test]
    fn raw_response_rejects_empty_and_non_json_bodies() {
        assert!(RawResponse::new(StatusCode::OK, "").json().is_err());
        assert!(RawResponse::new(StatusCode::OK, "  ").json().is_err());
        assert!(RawResponse::new(StatusCode::OK, "<html>").json().is_err());
        assert_eq!(RawResponse::new(StatusCode::OK, "null").json().unwrap(), Value::Null);
    }

    #[test]
    fn pool_stats_track_client_lifetime() {
        let stats = Arc::new(PoolStats::default());
        let config = ServiceConfig::new("http://localhost:4200/api", None).unwrap();
        let client = PrefectClient::with_pool_stats(&config, Arc::clone(&stats)).unwrap();
        assert_eq!((stats.acquired(), stats.released(), stats.live()), (1, 0, 1));
        drop(client);
        assert_eq!((stats.acquired(), stats.released(), stats.live()), (1, 1, 0));
    }

    #[test]
    fn invalid_is_the_only_local_failure() {
        assert!(!TransportError::Invalid("bad url".into()).is_transport());
        assert!(TransportError::Connect("refused".into()).is_transport());
        assert!(
            TransportError::Timeout {
                timeout: Duration::from_secs(1),
                cause: "elapsed".into()
            }
            .is_transport()
        );
    }

    #[test]
    fn rejects_api_key_with_control_characters() {
        let config = ServiceConfig::new("http://localhost:4200/api", Some("bad\nkey".into())).unwrap();
        assert!(matches!(PrefectClient::new(&config), Err(ClientBuildError::InvalidApiKey(_))));
    }
}
