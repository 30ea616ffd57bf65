//! `salesforce_list_objects`: every sObject API name in the org.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{empty_schema, Tool, ToolError};
use crate::sf::SalesforceApi;

#[derive(Debug, Serialize)]
pub struct ListObjectsOutput {
    pub object_names: Vec<String>,
    pub total_count: usize,
}

impl From<Vec<String>> for ListObjectsOutput {
    fn from(object_names: Vec<String>) -> Self {
        Self {
            total_count: object_names.len(),
            object_names,
        }
    }
}

pub struct ListObjectsTool;

#[async_trait]
impl Tool for ListObjectsTool {
    fn name(&self) -> &'static str {
        "salesforce_list_objects"
    }

    fn description(&self) -> &'static str {
        "List the API names of all sObjects in the org"
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    async fn call(&self, api: &dyn SalesforceApi, _arguments: Value) -> Result<Value, ToolError> {
        let names = api.list_objects().await?;
        Ok(serde_json::to_value(ListObjectsOutput::from(names))?)
    }
}
