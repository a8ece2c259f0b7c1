//! Shared types for the Prefect MCP adapter.
//!
//! Everything here is request-scoped data: the endpoint descriptor a facade
//! operation builds, and the result envelope handed back to the tool caller.

mod endpoint;
mod outcome;

pub use endpoint::{Endpoint, HttpMethod, encode_path_segment};
pub use outcome::{ErrorKind, ErrorRecord, ToolOutcome};

/// Caller-supplied filter criteria, forwarded verbatim as a request body.
pub type FilterCriteria = serde_json::Map<String, serde_json::Value>;
