//! `salesforce_describe`: field metadata for one sObject.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{parse_args, Tool, ToolError};
use crate::sf::{bool_field, str_field, string_field, Record, SalesforceApi};

/// Input for `salesforce_describe`.
#[derive(Debug, Deserialize)]
pub struct DescribeInput {
    /// sObject API name, e.g. `Account` or `Invoice__c`.
    pub object_api_name: String,
}

/// One field of a described sObject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub label: String,
    pub nillable: bool,
    #[serde(rename = "picklistValues")]
    pub picklist_values: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DescribeOutput {
    pub object_api_name: String,
    pub fields: Vec<FieldInfo>,
}

impl DescribeOutput {
    /// Reduce a describe result to the field summary.
    pub fn from_describe(object_api_name: &str, describe: &Record) -> Self {
        let fields = describe
            .get("fields")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(Value::as_object)
                    .map(field_info)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            object_api_name: object_api_name.to_string(),
            fields,
        }
    }
}

fn field_info(field: &Record) -> FieldInfo {
    let picklist_values = field
        .get("picklistValues")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.get("value").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    FieldInfo {
        name: string_field(field, "name").unwrap_or_default(),
        field_type: string_field(field, "type").unwrap_or_default(),
        label: str_field(field, "label")
            .or_else(|| str_field(field, "name"))
            .unwrap_or_default()
            .to_string(),
        nillable: bool_field(field, "nillable").unwrap_or(false),
        picklist_values,
    }
}

pub struct DescribeTool;

#[async_trait]
impl Tool for DescribeTool {
    fn name(&self) -> &'static str {
        "salesforce_describe"
    }

    fn description(&self) -> &'static str {
        "Describe an sObject's fields (name, type, label, nillable, picklist values)"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "object_api_name": {
                    "type": "string",
                    "description": "sObject API name, e.g. Account or Invoice__c"
                }
            },
            "required": ["object_api_name"]
        })
    }

    async fn call(&self, api: &dyn SalesforceApi, arguments: Value) -> Result<Value, ToolError> {
        let input: DescribeInput = parse_args(arguments)?;
        let describe = api.describe_object(&input.object_api_name).await?;
        Ok(serde_json::to_value(DescribeOutput::from_describe(
            &input.object_api_name,
            &describe,
        ))?)
    }
}
