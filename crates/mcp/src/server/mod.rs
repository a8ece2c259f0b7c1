mod core;
mod http;
mod schemas;
mod stdio;

pub use core::{PrefectMcpCore, SERVER_NAME};
pub use http::{McpHttpServer, RunningMcpHttpServer};
pub use schemas::{CreateFlowRunRequest, FilterRequest, ListRequest};
pub use stdio::serve_stdio;
