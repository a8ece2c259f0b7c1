use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use prefect_mcp::{HostConfig, McpHttpServer, TransportKind, serve_stdio};
use prefect_mcp_api::{ClientLifecycle, PrefectApi, ReleaseOutcome, ServiceConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Upper bound on runtime teardown once the server has stopped. The stdio
/// transport reads stdin on a blocking thread that only returns at EOF.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

fn main() -> Result<()> {
    init_tracing();
    block_on_with_bounded_shutdown(run(), RUNTIME_SHUTDOWN_TIMEOUT)?
}

/// Drive `future` on a multi-threaded runtime, then shut the runtime down
/// without waiting longer than `shutdown_timeout` for blocking tasks.
fn block_on_with_bounded_shutdown<F: Future>(future: F, shutdown_timeout: Duration) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build the tokio runtime")?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(shutdown_timeout);
    Ok(output)
}

async fn run() -> Result<()> {
    let service_config = ServiceConfig::from_env().context("invalid Prefect API configuration")?;
    let host_config = HostConfig::from_env().context("invalid MCP host configuration")?;
    info!("Starting Prefect MCP Server");
    info!("Prefect API URL: {}", service_config.base_url());
    info!("Using API key: {}", if service_config.has_api_key() { "YES" } else { "NO" });

    let mut lifecycle = ClientLifecycle::new(service_config).with_release_timeout(host_config.shutdown_grace);
    let api = lifecycle.start().context("failed to initialize the Prefect API client")?;

    let shutdown = CancellationToken::new();
    let signals = tokio::spawn(cancel_on_signal(shutdown.clone()));

    let served = serve(&host_config, api, shutdown.clone()).await;
    shutdown.cancel();
    signals.abort();

    if let ReleaseOutcome::Abandoned { outstanding } = lifecycle.stop().await {
        warn!(outstanding, "exiting with Prefect API requests still in flight");
    }
    served
}

/// Logs go to stderr; stdout carries the stdio MCP transport.
fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

async fn serve(host_config: &HostConfig, api: PrefectApi, shutdown: CancellationToken) -> Result<()> {
    match host_config.transport {
        TransportKind::Stdio => serve_stdio(api, shutdown).await,
        TransportKind::Http => {
            let running = McpHttpServer::new(host_config.bind_address, api).start().await?;
            shutdown.cancelled().await;
            running.stop().await
        }
    }
}

async fn cancel_on_signal(shutdown: CancellationToken) {
    wait_for_signal().await;
    info!("Shutdown signal received");
    shutdown.cancel();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(error) => {
            warn!(%error, "SIGTERM handler unavailable; listening for Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
