//! MCP over stdin/stdout.

use anyhow::{Context, Result};
use prefect_mcp_api::PrefectApi;
use rmcp::ServiceExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::server::core::PrefectMcpCore;

/// Serve one MCP session over stdio until the client disconnects or
/// `shutdown` is cancelled.
pub async fn serve_stdio(api: PrefectApi, shutdown: CancellationToken) -> Result<()> {
    let service = PrefectMcpCore::new(api)
        .serve(rmcp::transport::stdio())
        .await
        .context("failed to start MCP stdio session")?;
    info!("MCP stdio session started");

    let session_token = service.cancellation_token();
    let relay = tokio::spawn(async move {
        shutdown.cancelled().await;
        session_token.cancel();
    });

    let quit_reason = service.waiting().await.context("MCP stdio session task failed");
    relay.abort();
    let quit_reason = quit_reason?;
    info!(reason = ?quit_reason, "MCP stdio session ended");
    Ok(())
}
