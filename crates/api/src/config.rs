//! Service configuration resolved once at process start.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Base URL used when no override is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:4200/api";

/// Timeout applied to every request against the Prefect API.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while resolving the service configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid Prefect API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Prefect API URL must use http or https; got '{scheme}://' in '{url}'")]
    UnsupportedScheme { url: String, scheme: String },

    #[error("Prefect API URL '{url}' must include a host")]
    MissingHost { url: String },
}

/// Names of the environment variables the configuration is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvNames {
    pub url_var: String,
    pub key_var: String,
}

impl Default for EnvNames {
    fn default() -> Self {
        Self {
            url_var: "PREFECT_API_URL".to_string(),
            key_var: "PREFECT_API_KEY".to_string(),
        }
    }
}

/// Connection settings for the Prefect API.
///
/// Built once when the process starts and handed to the client lifecycle.
/// Nothing re-reads the environment afterwards.
#[derive(Clone)]
pub struct ServiceConfig {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    user_agent: String,
}

impl ServiceConfig {
    /// Create a configuration from an explicit base URL and optional key.
    ///
    /// An empty or whitespace-only key counts as no key.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, ConfigError> {
        let base_url = normalize_base_url(&base_url.into())?;
        let api_key = api_key.map(|key| key.trim().to_string()).filter(|key| !key.is_empty());
        Ok(Self {
            base_url,
            api_key,
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("prefect-mcp/{}; {}", env!("CARGO_PKG_VERSION"), std::env::consts::OS),
        })
    }

    /// Read `PREFECT_API_URL` and `PREFECT_API_KEY` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(&EnvNames::default())
    }

    /// Read the configuration from the process environment using custom variable names.
    pub fn from_env_with(names: &EnvNames) -> Result<Self, ConfigError> {
        Self::from_lookup(names, |name| std::env::var(name).ok())
    }

    /// Resolve the configuration through an arbitrary lookup function.
    ///
    /// A missing or blank URL variable falls back to [`DEFAULT_API_URL`].
    pub fn from_lookup<F>(names: &EnvNames, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(&names.url_var)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self::new(base_url, lookup(&names.key_var))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Validate a base URL and strip trailing slashes.
///
/// Rules:
/// - must parse as an absolute URL
/// - scheme must be `http` or `https`
/// - a host must be present
fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).map_err(|error| ConfigError::InvalidUrl {
        url: trimmed.to_string(),
        reason: error.to_string(),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::UnsupportedScheme {
            url: trimmed.to_string(),
            scheme: parsed.scheme().to_string(),
        });
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::MissingHost { url: trimmed.to_string() });
    }

    Ok(trimmed.trim_end_matches('/').to_string())
}
