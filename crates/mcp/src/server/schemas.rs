use prefect_mcp_api::DEFAULT_LIST_LIMIT;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameters shared by the list tools.
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// Maximum number of records to return.
    #[schemars(description = "Maximum number of records to return (default 20).")]
    pub limit: Option<u32>,
}

impl ListRequest {
    pub fn limit_or_default(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT)
    }
}

/// Parameters shared by the filter tools.
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FilterRequest {
    /// Prefect filter document, forwarded as the request body without changes.
    #[schemars(
        description = "Prefect filter document sent as-is to the API, for example {\"flows\": {\"tags\": {\"all_\": [\"production\"]}}}. May include `limit`, `offset` and `sort`."
    )]
    pub filter_criteria: Map<String, Value>,
}

/// Parameters for starting a flow run from a deployment.
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CreateFlowRunRequest {
    /// Deployment identifier. Absent or blank values are rejected before any request.
    #[schemars(description = "Identifier (UUID) of the deployment to run.")]
    pub deployment_id: Option<String>,
    /// Flow parameters for the run.
    #[schemars(description = "Optional flow parameters, for example {\"date\": \"2024-01-01\"}.")]
    pub parameters: Option<Map<String, Value>>,
}
