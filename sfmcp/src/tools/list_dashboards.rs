//! `salesforce_list_dashboards`

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{empty_schema, Tool, ToolError};
use crate::sf::{string_field, Record, SalesforceApi};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardInfo {
    pub id: String,
    pub title: Option<String>,
    pub developer_name: Option<String>,
    pub folder_name: Option<String>,
    pub description: Option<String>,
    pub owner_id: Option<String>,
    pub last_viewed_date: Option<String>,
    pub last_referenced_date: Option<String>,
}

impl DashboardInfo {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: string_field(record, "id").unwrap_or_default(),
            title: string_field(record, "title"),
            developer_name: string_field(record, "developerName"),
            folder_name: string_field(record, "folderName"),
            description: string_field(record, "description"),
            owner_id: string_field(record, "ownerId"),
            last_viewed_date: string_field(record, "lastViewedDate"),
            last_referenced_date: string_field(record, "lastReferencedDate"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListDashboardsOutput {
    pub dashboards: Vec<DashboardInfo>,
    pub total_count: usize,
}

pub struct ListDashboardsTool;

#[async_trait]
impl Tool for ListDashboardsTool {
    fn name(&self) -> &'static str {
        "salesforce_list_dashboards"
    }

    fn description(&self) -> &'static str {
        "List dashboards with folder, owner and last viewed dates"
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    async fn call(&self, api: &dyn SalesforceApi, _arguments: Value) -> Result<Value, ToolError> {
        let dashboards: Vec<DashboardInfo> = api
            .list_dashboards()
            .await?
            .iter()
            .map(DashboardInfo::from_record)
            .collect();
        Ok(serde_json::to_value(ListDashboardsOutput {
            total_count: dashboards.len(),
            dashboards,
        })?)
    }
}
