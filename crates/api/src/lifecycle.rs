//! Ownership of the Prefect API client across one serving period.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::{ClientBuildError, PoolStats, PrefectClient};
use crate::config::ServiceConfig;
use crate::facade::PrefectApi;

/// Upper bound on how long `stop` waits for in-flight calls to let go of the client.
pub const DEFAULT_RELEASE_TIMEOUT: Duration = Duration::from_secs(5);

const RELEASE_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Prefect API client is already serving")]
    AlreadyServing,

    #[error("Prefect API client setup failed: {0}")]
    Client(#[from] ClientBuildError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Serving,
}

/// How a call to [`ClientLifecycle::stop`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The pool was released before `stop` returned.
    Released,
    /// Other holders kept the client past the release timeout. The pool is
    /// freed once the last of them drops its handle.
    Abandoned { outstanding: usize },
    /// Nothing was serving.
    NotServing,
}

/// Creates the client when serving starts and releases it when serving stops.
///
/// Each `start` builds a fresh client; each serving period releases its pool
/// exactly once, through [`stop`](Self::stop) or, failing that, on drop.
#[derive(Debug)]
pub struct ClientLifecycle {
    config: ServiceConfig,
    release_timeout: Duration,
    pool_stats: Arc<PoolStats>,
    client: Option<Arc<PrefectClient>>,
}

impl ClientLifecycle {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            release_timeout: DEFAULT_RELEASE_TIMEOUT,
            pool_stats: Arc::new(PoolStats::default()),
            client: None,
        }
    }

    pub fn with_release_timeout(mut self, release_timeout: Duration) -> Self {
        self.release_timeout = release_timeout;
        self
    }

    pub fn state(&self) -> LifecycleState {
        if self.client.is_some() {
            LifecycleState::Serving
        } else {
            LifecycleState::Stopped
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Pool accounting across every serving period of this lifecycle.
    pub fn pool_stats(&self) -> Arc<PoolStats> {
        Arc::clone(&self.pool_stats)
    }

    /// Transition stopped → serving and return a facade bound to the new client.
    pub fn start(&mut self) -> Result<PrefectApi, LifecycleError> {
        if self.client.is_some() {
            return Err(LifecycleError::AlreadyServing);
        }

        let client = Arc::new(PrefectClient::with_pool_stats(&self.config, Arc::clone(&self.pool_stats))?);
        info!(
            base_url = self.config.base_url(),
            api_key = self.config.has_api_key(),
            "Prefect API client initialized"
        );
        let api = PrefectApi::new(client.clone());
        self.client = Some(client);
        Ok(api)
    }

    /// A facade over the current client, if serving.
    pub fn api(&self) -> Option<PrefectApi> {
        self.client.as_ref().map(|client| PrefectApi::new(client.clone()))
    }

    /// Transition serving → stopped, releasing the connection pool.
    ///
    /// Waits up to the release timeout for outstanding facades to be dropped.
    /// Never fails; problems are logged.
    pub async fn stop(&mut self) -> ReleaseOutcome {
        let Some(client) = self.client.take() else {
            debug!("Prefect API client stop requested while not serving");
            return ReleaseOutcome::NotServing;
        };

        info!("Cleaning up Prefect API client");
        let idle = tokio::time::timeout(self.release_timeout, wait_until_sole_owner(&client))
            .await
            .is_ok();
        let outstanding = Arc::strong_count(&client) - 1;
        drop(client);

        if idle {
            info!("Prefect API client closed");
            ReleaseOutcome::Released
        } else {
            warn!(
                outstanding,
                timeout_ms = self.release_timeout.as_millis() as u64,
                "Prefect API client still in use after release timeout; abandoning wait"
            );
            ReleaseOutcome::Abandoned { outstanding }
        }
    }
}

impl Drop for ClientLifecycle {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            warn!(
                outstanding = Arc::strong_count(&client) - 1,
                "Prefect API client dropped while serving; releasing without waiting"
            );
        }
    }
}

async fn wait_until_sole_owner(client: &Arc<PrefectClient>) {
    while Arc::strong_count(client) > 1 {
        tokio::time::sleep(RELEASE_POLL_INTERVAL).await;
    }
}
