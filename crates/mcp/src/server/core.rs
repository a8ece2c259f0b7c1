use prefect_mcp_api::{PrefectApi, Resource};
use prefect_mcp_types::ToolOutcome;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ErrorData, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::{ServerHandler, tool, tool_handler, tool_router};
use serde_json::Value;
use tracing::debug;

use crate::server::schemas::{CreateFlowRunRequest, FilterRequest, ListRequest};

/// Name reported to MCP clients during initialization.
pub const SERVER_NAME: &str = "prefect";

const SERVER_INSTRUCTIONS: &str = "Prefect orchestration tools.\n\
LISTING:\n\
- list_flows, list_flow_runs and list_deployments return up to `limit` records (default 20).\n\
FILTERING:\n\
- filter_* tools POST `filter_criteria` unchanged to the Prefect `<collection>/filter` endpoint.\n\
- Flows by tag: {\"flows\": {\"tags\": {\"all_\": [\"production\"]}}}\n\
- Failed runs: {\"flow_runs\": {\"state\": {\"type\": {\"any_\": [\"FAILED\", \"CRASHED\"]}}}, \"limit\": 10}\n\
- Deployments by name: {\"deployments\": {\"name\": {\"like_\": \"nightly\"}}}\n\
RUNNING:\n\
- create_flow_run needs a deployment id from list_deployments or filter_deployments; `parameters` is optional.\n\
ERRORS:\n\
- Failures return {\"error\": {\"kind\", \"message\", \"details\"}} with kind one of missing-argument, remote-status-error, transport-error, internal-error.";

/// MCP tool surface over a [`PrefectApi`].
///
/// Every tool maps to exactly one facade operation. Normalized failures are
/// returned as error-flagged tool results, never as protocol errors.
#[derive(Clone)]
pub struct PrefectMcpCore {
    tool_router: ToolRouter<Self>,
    api: PrefectApi,
}

#[tool_router]
impl PrefectMcpCore {
    pub fn new(api: PrefectApi) -> Self {
        Self {
            tool_router: Self::tool_router(),
            api,
        }
    }

    #[tool(
        annotations(read_only_hint = true, open_world_hint = true),
        description = "List Prefect flows. Input: optional limit (default 20). Returns the Prefect API response unchanged."
    )]
    async fn list_flows(&self, param: Parameters<ListRequest>) -> Result<CallToolResult, ErrorData> {
        let limit = param.0.limit_or_default();
        debug!(tool = "list_flows", limit, "dispatching MCP tool");
        tool_result(self.api.list(Resource::Flows, limit).await)
    }

    #[tool(
        annotations(read_only_hint = true, open_world_hint = true),
        description = "List Prefect flow runs. Input: optional limit (default 20). Returns the Prefect API response unchanged."
    )]
    async fn list_flow_runs(&self, param: Parameters<ListRequest>) -> Result<CallToolResult, ErrorData> {
        let limit = param.0.limit_or_default();
        debug!(tool = "list_flow_runs", limit, "dispatching MCP tool");
        tool_result(self.api.list(Resource::FlowRuns, limit).await)
    }

    #[tool(
        annotations(read_only_hint = true, open_world_hint = true),
        description = "List Prefect deployments. Input: optional limit (default 20). Use the returned ids with create_flow_run."
    )]
    async fn list_deployments(&self, param: Parameters<ListRequest>) -> Result<CallToolResult, ErrorData> {
        let limit = param.0.limit_or_default();
        debug!(tool = "list_deployments", limit, "dispatching MCP tool");
        tool_result(self.api.list(Resource::Deployments, limit).await)
    }

    #[tool(
        annotations(read_only_hint = true, open_world_hint = true),
        description = "Filter Prefect flows. Input: filter_criteria, sent unchanged to POST flows/filter. Example: {\"flows\": {\"tags\": {\"all_\": [\"production\"]}}}."
    )]
    async fn filter_flows(&self, param: Parameters<FilterRequest>) -> Result<CallToolResult, ErrorData> {
        debug!(tool = "filter_flows", "dispatching MCP tool");
        tool_result(self.api.filter(Resource::Flows, param.0.filter_criteria).await)
    }

    #[tool(
        annotations(read_only_hint = true, open_world_hint = true),
        description = "Filter Prefect flow runs. Input: filter_criteria, sent unchanged to POST flow_runs/filter. Example: {\"flow_runs\": {\"state\": {\"type\": {\"any_\": [\"FAILED\", \"CRASHED\"]}}}, \"limit\": 10}."
    )]
    async fn filter_flow_runs(&self, param: Parameters<FilterRequest>) -> Result<CallToolResult, ErrorData> {
        debug!(tool = "filter_flow_runs", "dispatching MCP tool");
        tool_result(self.api.filter(Resource::FlowRuns, param.0.filter_criteria).await)
    }

    #[tool(
        annotations(read_only_hint = true, open_world_hint = true),
        description = "Filter Prefect deployments. Input: filter_criteria, sent unchanged to POST deployments/filter. Example: {\"deployments\": {\"is_schedule_active\": {\"eq_\": true}}}."
    )]
    async fn filter_deployments(&self, param: Parameters<FilterRequest>) -> Result<CallToolResult, ErrorData> {
        debug!(tool = "filter_deployments", "dispatching MCP tool");
        tool_result(self.api.filter(Resource::Deployments, param.0.filter_criteria).await)
    }

    #[tool(
        annotations(read_only_hint = false, destructive_hint = false, idempotent_hint = false, open_world_hint = true),
        description = "Start a flow run from a deployment. Input: deployment_id (required), optional parameters object. Each call creates a new run."
    )]
    async fn create_flow_run(&self, param: Parameters<CreateFlowRunRequest>) -> Result<CallToolResult, ErrorData> {
        let CreateFlowRunRequest {
            deployment_id,
            parameters,
        } = param.0;
        debug!(tool = "create_flow_run", deployment_id = deployment_id.as_deref().unwrap_or_default(), "dispatching MCP tool");
        tool_result(self.api.create_flow_run(deployment_id.as_deref(), parameters).await)
    }
}

/// Render a facade outcome as a tool result.
///
/// Objects travel as structured content; other JSON values (list endpoints
/// return arrays) as a JSON text block. Failures carry the error record and
/// set `is_error`.
fn tool_result(outcome: ToolOutcome) -> Result<CallToolResult, ErrorData> {
    match outcome {
        ToolOutcome::Success(payload @ Value::Object(_)) => Ok(CallToolResult::structured(payload)),
        ToolOutcome::Success(payload) => Ok(CallToolResult::success(vec![Content::json(payload)?])),
        ToolOutcome::Failure(record) => Ok(CallToolResult::structured_error(record.to_value())),
    }
}

#[tool_handler]
impl ServerHandler for PrefectMcpCore {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            protocol_version: ProtocolVersion::LATEST,
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Prefect MCP".to_string()),
                ..Default::default()
            },
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
        }
    }
}
