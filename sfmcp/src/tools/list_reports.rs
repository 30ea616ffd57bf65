//! `salesforce_list_reports`

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{empty_schema, Tool, ToolError};
use crate::sf::{string_field, Record, SalesforceApi};

/// A report, keyed as the adapter normalizes it (camelCase).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportInfo {
    pub id: String,
    pub name: Option<String>,
    pub developer_name: Option<String>,
    pub format: Option<String>,
    pub folder_name: Option<String>,
    pub description: Option<String>,
    pub owner_id: Option<String>,
    pub last_run_date: Option<String>,
    pub last_viewed_date: Option<String>,
    pub last_referenced_date: Option<String>,
}

impl ReportInfo {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: string_field(record, "id").unwrap_or_default(),
            name: string_field(record, "name"),
            developer_name: string_field(record, "developerName"),
            format: string_field(record, "format"),
            folder_name: string_field(record, "folderName"),
            description: string_field(record, "description"),
            owner_id: string_field(record, "ownerId"),
            last_run_date: string_field(record, "lastRunDate"),
            last_viewed_date: string_field(record, "lastViewedDate"),
            last_referenced_date: string_field(record, "lastReferencedDate"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListReportsOutput {
    pub reports: Vec<ReportInfo>,
    pub total_count: usize,
}

pub struct ListReportsTool;

#[async_trait]
impl Tool for ListReportsTool {
    fn name(&self) -> &'static str {
        "salesforce_list_reports"
    }

    fn description(&self) -> &'static str {
        "List reports with folder, format, owner and last run/viewed dates"
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    async fn call(&self, api: &dyn SalesforceApi, _arguments: Value) -> Result<Value, ToolError> {
        let reports: Vec<ReportInfo> = api
            .list_reports()
            .await?
            .iter()
            .map(ReportInfo::from_record)
            .collect();
        Ok(serde_json::to_value(ListReportsOutput {
            total_count: reports.len(),
            reports,
        })?)
    }
}
