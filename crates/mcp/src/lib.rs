//! Model Context Protocol (MCP) server for the Prefect orchestration API.
//!
//! Exposes seven tools (list, filter and create-run operations over flows,
//! flow runs and deployments) backed by [`prefect_mcp_api::PrefectApi`], and
//! hosts them over stdio or streamable HTTP.

pub mod config;
pub mod server;

pub use config::{HostConfig, HostConfigError, TransportKind, resolve_bind_address};
pub use server::{McpHttpServer, PrefectMcpCore, RunningMcpHttpServer, SERVER_NAME, serve_stdio};
