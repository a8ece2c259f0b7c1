//! Flow, flow run and deployment operations over the Prefect REST API.

use std::sync::Arc;

use prefect_mcp_types::{Endpoint, ErrorRecord, FilterCriteria, ToolOutcome, encode_path_segment};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::client::Transport;
use crate::normalizer::execute;

/// Page size used by the list operations when the caller gives none.
pub const DEFAULT_LIST_LIMIT: u32 = 20;

/// Collections exposed by the adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    Flows,
    FlowRuns,
    Deployments,
}

impl Resource {
    /// Collection path relative to the API base URL.
    pub fn collection_path(&self) -> &'static str {
        match self {
            Self::Flows => "flows",
            Self::FlowRuns => "flow_runs",
            Self::Deployments => "deployments",
        }
    }

    pub fn list_endpoint(&self, limit: u32) -> Endpoint {
        Endpoint::get(self.collection_path()).with_query("limit", limit)
    }

    /// `POST <collection>/filter` with the criteria as the exact body.
    pub fn filter_endpoint(&self, criteria: FilterCriteria) -> Endpoint {
        Endpoint::post(format!("{}/filter", self.collection_path()), Value::Object(criteria))
    }
}

/// Build the endpoint that creates a flow run from a deployment.
///
/// Fails with a `missing-argument` record when the identifier is absent or
/// blank. Any other identifier is sent exactly as given. With parameters the body is `{"parameters": {...}}`, otherwise `{}`.
pub fn create_flow_run_endpoint(
    deployment_id: Option<&str>,
    parameters: Option<Map<String, Value>>,
) -> Result<Endpoint, ErrorRecord> {
    let deployment_id = deployment_id
        .filter(|identifier| !identifier.trim().is_empty())
        .ok_or_else(|| ErrorRecord::missing_argument("deployment_id"))?;

    let body = match parameters {
        Some(parameters) => json!({ "parameters": parameters }),
        None => json!({}),
    };
    let path = format!("deployments/{}/create_flow_run", encode_path_segment(deployment_id));
    Ok(Endpoint::post(path, body))
}

/// Named Prefect operations, each mapped onto one HTTP request.
///
/// Cheap to clone; every clone shares the same transport. The facade uses the
/// transport but does not own its lifetime, see [`crate::ClientLifecycle`].
#[derive(Clone, Debug)]
pub struct PrefectApi {
    transport: Arc<dyn Transport>,
}

impl PrefectApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn list_flows(&self, limit: u32) -> ToolOutcome {
        self.list(Resource::Flows, limit).await
    }

    pub async fn list_flow_runs(&self, limit: u32) -> ToolOutcome {
        self.list(Resource::FlowRuns, limit).await
    }

    pub async fn list_deployments(&self, limit: u32) -> ToolOutcome {
        self.list(Resource::Deployments, limit).await
    }

    pub async fn filter_flows(&self, criteria: FilterCriteria) -> ToolOutcome {
        self.filter(Resource::Flows, criteria).await
    }

    pub async fn filter_flow_runs(&self, criteria: FilterCriteria) -> ToolOutcome {
        self.filter(Resource::FlowRuns, criteria).await
    }

    pub async fn filter_deployments(&self, criteria: FilterCriteria) -> ToolOutcome {
        self.filter(Resource::Deployments, criteria).await
    }

    /// Create a flow run for a deployment.
    ///
    /// A missing or blank `deployment_id` is rejected before any request is made.
    pub async fn create_flow_run(&self, deployment_id: Option<&str>, parameters: Option<Map<String, Value>>) -> ToolOutcome {
        match create_flow_run_endpoint(deployment_id, parameters) {
            Ok(endpoint) => self.send(endpoint).await,
            Err(record) => {
                debug!(kind = %record.kind, "create_flow_run rejected locally");
                record.into()
            }
        }
    }

    pub async fn list(&self, resource: Resource, limit: u32) -> ToolOutcome {
        self.send(resource.list_endpoint(limit)).await
    }

    pub async fn filter(&self, resource: Resource, criteria: FilterCriteria) -> ToolOutcome {
        self.send(resource.filter_endpoint(criteria)).await
    }

    async fn send(&self, endpoint: Endpoint) -> ToolOutcome {
        execute(self.transport.as_ref(), &endpoint).await
    }
}
