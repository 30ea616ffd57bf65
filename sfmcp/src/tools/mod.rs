//! Salesforce tools exposed over MCP.
//!
//! Each tool validates its arguments, makes one call through
//! [`SalesforceApi`], and reshapes the generic records into its typed output.
//!
//! | Tool | Output |
//! |------|--------|
//! | `salesforce_query` | `{total_size, records}` |
//! | `salesforce_describe` | `{object_api_name, fields}` |
//! | `salesforce_list_objects` | `{object_names, total_count}` |
//! | `salesforce_list_flows` | `{flows, total_count}` |
//! | `salesforce_list_reports` | `{reports, total_count}` |
//! | `salesforce_list_dashboards` | `{dashboards, total_count}` |
//! | `salesforce_describe_flow` | `{flowDeveloperName, flowContent, contentLength, filePath}` |

mod describe;
mod describe_flow;
mod list_dashboards;
mod list_flows;
mod list_objects;
mod list_reports;
mod query;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::sf::{SalesforceApi, SfError};

pub use describe::{DescribeInput, DescribeOutput, DescribeTool, FieldInfo};
pub use describe_flow::{DescribeFlowInput, DescribeFlowTool};
pub use list_dashboards::{DashboardInfo, ListDashboardsOutput, ListDashboardsTool};
pub use list_flows::{FlowInfo, ListFlowsOutput, ListFlowsTool};
pub use list_objects::{ListObjectsOutput, ListObjectsTool};
pub use list_reports::{ListReportsOutput, ListReportsTool, ReportInfo};
pub use query::{QueryInput, QueryOutput, QueryTool, MAX_RECORDS_LIMIT};

/// Why a tool call failed. Reported to the client as a tool error.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Salesforce(#[from] SfError),

    #[error("failed to encode tool output: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A tool callable through `tools/call`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema for the `arguments` object.
    fn input_schema(&self) -> Value;

    /// Every Salesforce tool only reads from the org.
    fn read_only(&self) -> bool {
        true
    }

    async fn call(&self, api: &dyn SalesforceApi, arguments: Value) -> Result<Value, ToolError>;
}

/// All tools, in the order `tools/list` reports them.
pub fn registry() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(QueryTool),
        Arc::new(DescribeTool),
        Arc::new(ListObjectsTool),
        Arc::new(ListFlowsTool),
        Arc::new(ListReportsTool),
        Arc::new(ListDashboardsTool),
        Arc::new(DescribeFlowTool),
    ]
}

/// Deserialize tool arguments. A missing `arguments` value is an empty object.
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    let arguments = if arguments.is_null() {
        Value::Object(Default::default())
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Schema for tools that take no arguments.
pub(crate) fn empty_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_registry_names_are_unique_and_dotless() {
        let tools = registry();
        assert_eq!(tools.len(), 7);
        let names: HashSet<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(names.len(), 7);
        for tool in &tools {
            assert!(tool.name().starts_with("salesforce_"));
            assert!(!tool.name().contains('.'));
            assert!(tool.read_only());
            assert_eq!(tool.input_schema()["type"], "object");
        }
    }

    #[test]
    fn test_parse_args_null_is_empty_object() {
        #[derive(serde::Deserialize)]
        struct NoArgs {}
        assert!(parse_args::<NoArgs>(Value::Null).is_ok());
    }

    #[test]
    fn test_parse_args_names_missing_field() {
        let err = parse_args::<QueryInput>(serde_json::json!({})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(err.to_string().contains("soql"), "{err}");
    }
}
