//! Prefect REST API client utilities.
//!
//! This crate turns tool calls into HTTP requests against a Prefect server
//! and turns every possible answer into a [`ToolOutcome`]. It focuses on:
//!
//! - Building one shared `reqwest::Client` with the adapter's default headers
//! - Normalizing remote error statuses, transport failures and anything
//!   unexpected into a uniform [`ErrorRecord`]
//! - Mapping the flow, flow run and deployment operations onto endpoints
//! - Owning the client for exactly one serving period
//!
//! The primary entry point is [`ClientLifecycle`]: start it with a
//! [`ServiceConfig`] to obtain a [`PrefectApi`], and stop it on shutdown.
//!
//! # Example
//!
//! ```ignore
//! use prefect_mcp_api::{ClientLifecycle, ServiceConfig};
//!
//! let mut lifecycle = ClientLifecycle::new(ServiceConfig::from_env()?);
//! let api = lifecycle.start()?;
//! let flows = api.list_flows(20).await.into_value();
//! lifecycle.stop().await;
//! ```
//!
//! [`ToolOutcome`]: prefect_mcp_types::ToolOutcome
//! [`ErrorRecord`]: prefect_mcp_types::ErrorRecord

pub mod client;
pub mod config;
pub mod facade;
pub mod lifecycle;
pub mod normalizer;

pub use client::{ClientBuildError, PoolStats, PrefectClient, RawResponse, Transport, TransportError};
pub use config::{ConfigError, DEFAULT_API_URL, DEFAULT_TIMEOUT, EnvNames, ServiceConfig};
pub use facade::{DEFAULT_LIST_LIMIT, PrefectApi, Resource};
pub use lifecycle::{ClientLifecycle, DEFAULT_RELEASE_TIMEOUT, LifecycleError, LifecycleState, ReleaseOutcome};
pub use normalizer::execute;
