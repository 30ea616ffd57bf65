//! `salesforce_list_flows`: latest flow versions joined with their definitions.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{empty_schema, Tool, ToolError};
use crate::sf::{bool_field, int_field, string_field, Record, SalesforceApi};

/// A flow's latest version joined with its definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowInfo {
    pub id: String,
    pub master_label: Option<String>,
    pub status: Option<String>,
    pub version_number: Option<i64>,
    pub developer_name: String,
    pub definition_id: String,
    pub is_active: bool,
    pub active_version_id: Option<String>,
    pub latest_version_id: Option<String>,
}

impl FlowInfo {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: string_field(record, "id").unwrap_or_default(),
            master_label: string_field(record, "masterLabel"),
            status: string_field(record, "status"),
            version_number: int_field(record, "versionNumber"),
            developer_name: string_field(record, "developerName").unwrap_or_default(),
            definition_id: string_field(record, "definitionId").unwrap_or_default(),
            is_active: bool_field(record, "isActive").unwrap_or(false),
            active_version_id: string_field(record, "activeVersionId"),
            latest_version_id: string_field(record, "latestVersionId"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListFlowsOutput {
    pub flows: Vec<FlowInfo>,
    pub total_count: usize,
}

pub struct ListFlowsTool;

#[async_trait]
impl Tool for ListFlowsTool {
    fn name(&self) -> &'static str {
        "salesforce_list_flows"
    }

    fn description(&self) -> &'static str {
        "List flows with their latest version, status and whether that version is active"
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    async fn call(&self, api: &dyn SalesforceApi, _arguments: Value) -> Result<Value, ToolError> {
        let flows: Vec<FlowInfo> = api.list_flows().await?.iter().map(FlowInfo::from_record).collect();
        Ok(serde_json::to_value(ListFlowsOutput {
            total_count: flows.len(),
            flows,
        })?)
    }
}
