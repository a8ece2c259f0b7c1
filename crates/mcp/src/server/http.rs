//! Local MCP HTTP server host utilities.

use std::net::SocketAddr;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use prefect_mcp_api::PrefectApi;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::server::core::PrefectMcpCore;

const SESSION_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Host configuration for a local MCP HTTP server instance.
#[derive(Debug, Clone)]
pub struct McpHttpServer {
    bind_address: SocketAddr,
    api: PrefectApi,
}

impl McpHttpServer {
    /// Create a new MCP HTTP server bound to the provided address.
    ///
    /// Every session shares `api`, and therefore the same connection pool.
    pub fn new(bind_address: SocketAddr, api: PrefectApi) -> Self {
        Self { bind_address, api }
    }

    /// Start the server and return a handle for runtime inspection and shutdown.
    pub async fn start(self) -> Result<RunningMcpHttpServer> {
        let cancellation_token = CancellationToken::new();
        let session_manager = Arc::new(LocalSessionManager::default());
        let session_count = Arc::new(AtomicUsize::new(0));
        let monitor_handle = spawn_session_monitor(
            Arc::clone(&session_manager),
            Arc::clone(&session_count),
            cancellation_token.child_token(),
        );

        let api = self.api;
        let service: StreamableHttpService<PrefectMcpCore, LocalSessionManager> = StreamableHttpService::new(
            move || Ok(PrefectMcpCore::new(api.clone())),
            Arc::clone(&session_manager),
            StreamableHttpServerConfig {
                stateful_mode: true,
                sse_keep_alive: None,
                cancellation_token: cancellation_token.child_token(),
                ..Default::default()
            },
        );

        let router = Router::new().nest_service("/mcp", service);
        let listener = tokio::net::TcpListener::bind(self.bind_address).await?;
        let bound_address = listener.local_addr()?;
        info!(address = %bound_address, "MCP HTTP server listening at http://{bound_address}/mcp");

        let server_handle = tokio::spawn({
            let shutdown = cancellation_token.child_token();
            async move {
                if let Err(error) = axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        shutdown.cancelled().await;
                    })
                    .await
                {
                    warn!(%error, "MCP HTTP server exited with an error");
                }
            }
        });

        Ok(RunningMcpHttpServer {
            bind_address: bound_address,
            cancellation_token,
            server_handle,
            monitor_handle,
            session_count,
        })
    }
}

/// Runtime handle for a running MCP HTTP server.
#[derive(Debug)]
pub struct RunningMcpHttpServer {
    bind_address: SocketAddr,
    cancellation_token: CancellationToken,
    server_handle: JoinHandle<()>,
    monitor_handle: JoinHandle<()>,
    session_count: Arc<AtomicUsize>,
}

impl RunningMcpHttpServer {
    /// Return the bound socket address for the running server.
    pub fn bound_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Number of live MCP sessions, refreshed every half second.
    pub fn open_sessions(&self) -> usize {
        self.session_count.load(Ordering::Relaxed)
    }

    /// Stop accepting requests, drain open connections, then stop the
    /// session monitor.
    ///
    /// Once this returns, no session holds a [`PrefectApi`] clone any more.
    pub async fn stop(self) -> Result<()> {
        self.cancellation_token.cancel();
        self.server_handle.await.context("MCP HTTP server task failed")?;
        self.monitor_handle.await.context("MCP HTTP session monitor failed")?;
        info!(address = %self.bind_address, "MCP HTTP server stopped");
        Ok(())
    }
}

/// Track the session count and log when MCP clients connect or leave.
fn spawn_session_monitor(
    session_manager: Arc<LocalSessionManager>,
    session_count: Arc<AtomicUsize>,
    cancellation_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => break,
                _ = ticker.tick() => {
                    let sessions = session_manager.sessions.read().await.len();
                    let previous = session_count.swap(sessions, Ordering::Relaxed);
                    if previous != sessions {
                        debug!(previous, sessions, "MCP HTTP session count changed");
                    }
                }
            }
        }
        let open_sessions = session_count.swap(0, Ordering::Relaxed);
        if open_sessions > 0 {
            info!(open_sessions, "MCP HTTP server shutting down with open sessions");
        }
    })
}
