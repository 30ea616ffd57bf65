//! `salesforce_describe_flow`: retrieve one flow and return its XML.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, Tool, ToolError};
use crate::sf::SalesforceApi;

/// Input for `salesforce_describe_flow`.
#[derive(Debug, Deserialize)]
pub struct DescribeFlowInput {
    /// Flow developer name, e.g. `Contact_Last_Reply_Date`.
    pub flow_developer_name: String,
}

pub struct DescribeFlowTool;

#[async_trait]
impl Tool for DescribeFlowTool {
    fn name(&self) -> &'static str {
        "salesforce_describe_flow"
    }

    fn description(&self) -> &'static str {
        "Retrieve the full XML metadata for a specific Salesforce flow by developer name"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "flow_developer_name": {
                    "type": "string",
                    "description": "Flow developer name (e.g., Contact_Last_Reply_Date)"
                }
            },
            "required": ["flow_developer_name"]
        })
    }

    async fn call(&self, api: &dyn SalesforceApi, arguments: Value) -> Result<Value, ToolError> {
        let input: DescribeFlowInput = parse_args(arguments)?;
        let artifact = api.describe_flow(&input.flow_developer_name).await?;
        Ok(serde_json::to_value(artifact)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sf::FlowArtifact;
    use crate::tools::mock::MockApi;

    #[tokio::test]
    async fn test_output_wire_names() {
        let api = MockApi {
            artifact: Some(FlowArtifact {
                developer_name: "Lead_Router".into(),
                content: "<Flow></Flow>".into(),
                content_length: 13,
                file_path: "/proj/force-app/main/default/flows/Lead_Router.flow-meta.xml".into(),
            }),
            ..Default::default()
        };
        let out = DescribeFlowTool
            .call(&api, json!({"flow_developer_name": "Lead_Router"}))
            .await
            .unwrap();
        assert_eq!(out["flowDeveloperName"], "Lead_Router");
        assert_eq!(out["flowContent"], "<Flow></Flow>");
        assert_eq!(out["contentLength"], 13);
        assert!(out["filePath"].as_str().unwrap().ends_with("Lead_Router.flow-meta.xml"));
    }

    #[tokio::test]
    async fn test_not_found_surfaces() {
        let api = MockApi::default();
        let err = DescribeFlowTool
            .call(&api, json!({"flow_developer_name": "Ghost"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("`Ghost`"));
    }

    #[tokio::test]
    async fn test_missing_argument() {
        let api = MockApi::default();
        let err = DescribeFlowTool.call(&api, json!({})).await.unwrap_err();
        assert!(err.to_string().contains("flow_developer_name"));
    }
}
