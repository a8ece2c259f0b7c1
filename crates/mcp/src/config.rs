//! How the MCP server is hosted: transport selection, bind address and
//! shutdown grace.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use prefect_mcp_api::DEFAULT_RELEASE_TIMEOUT;
use thiserror::Error;

pub const TRANSPORT_VAR: &str = "PREFECT_MCP_TRANSPORT";
pub const BIND_VAR: &str = "PREFECT_MCP_BIND";
pub const SHUTDOWN_GRACE_VAR: &str = "PREFECT_MCP_SHUTDOWN_GRACE_SECS";

/// Address the streamable HTTP transport listens on by default.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8000";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostConfigError {
    #[error("unknown MCP transport '{0}'; expected 'stdio' or 'http'")]
    UnknownTransport(String),

    #[error("invalid MCP HTTP bind address '{address}': {reason}")]
    InvalidBindAddress { address: String, reason: String },

    #[error("MCP HTTP server must bind to a loopback address, got '{0}'")]
    NonLoopbackBind(SocketAddr),

    #[error("invalid shutdown grace '{0}'; expected a whole number of seconds")]
    InvalidShutdownGrace(String),
}

/// Transport the MCP session runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// JSON-RPC over stdin/stdout.
    #[default]
    Stdio,
    /// Streamable HTTP at `/mcp`.
    Http,
}

impl FromStr for TransportKind {
    type Err = HostConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" | "streamable-http" => Ok(Self::Http),
            other => Err(HostConfigError::UnknownTransport(other.to_string())),
        }
    }
}

/// Hosting settings, read from the environment once at start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub transport: TransportKind,
    pub bind_address: SocketAddr,
    pub shutdown_grace: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Stdio,
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            shutdown_grace: DEFAULT_RELEASE_TIMEOUT,
        }
    }
}

impl HostConfig {
    pub fn from_env() -> Result<Self, HostConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve settings through `lookup`. Unset or blank values fall back to
    /// the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, HostConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| lookup(name).map(|raw| raw.trim().to_string()).filter(|raw| !raw.is_empty());

        let transport = value(TRANSPORT_VAR)
            .map(|raw| raw.parse::<TransportKind>())
            .transpose()?
            .unwrap_or_default();
        let bind_address = resolve_bind_address(value(BIND_VAR).as_deref())?;
        let shutdown_grace = match value(SHUTDOWN_GRACE_VAR) {
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| HostConfigError::InvalidShutdownGrace(raw))?,
            None => DEFAULT_RELEASE_TIMEOUT,
        };

        Ok(Self {
            transport,
            bind_address,
            shutdown_grace,
        })
    }
}

/// Resolve a safe local bind address for the MCP HTTP server.
pub fn resolve_bind_address(bind_address: Option<&str>) -> Result<SocketAddr, HostConfigError> {
    let address = bind_address.unwrap_or(DEFAULT_BIND_ADDRESS);
    let parsed: SocketAddr = address.parse().map_err(|error: std::net::AddrParseError| HostConfigError::InvalidBindAddress {
        address: address.to_string(),
        reason: error.to_string(),
    })?;
    if !is_loopback(parsed.ip()) {
        return Err(HostConfigError::NonLoopbackBind(parsed));
    }
    Ok(parsed)
}

fn is_loopback(address: IpAddr) -> bool {
    match address {
        IpAddr::V4(ip) => ip.is_loopback(),
        IpAddr::V6(ip) => ip.is_loopback(),
    }
}
