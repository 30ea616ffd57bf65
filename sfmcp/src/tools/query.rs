//! `salesforce_query`: run SOQL and return at most `max_records` rows.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{parse_args, Tool, ToolError};
use crate::sf::{Record, SalesforceApi};

/// Largest accepted `max_records`.
pub const MAX_RECORDS_LIMIT: u32 = 50_000;

/// Input for `salesforce_query`.
#[derive(Debug, Deserialize)]
pub struct QueryInput {
    /// SOQL query text, passed to the CLI unchanged.
    pub soql: String,
    /// Truncate the result to at most this many records.
    #[serde(default)]
    pub max_records: Option<u32>,
}

/// Output of `salesforce_query`. `total_size` is the number of records returned.
#[derive(Debug, Serialize)]
pub struct QueryOutput {
    pub total_size: usize,
    pub records: Vec<Record>,
}

impl QueryOutput {
    pub fn new(mut records: Vec<Record>, max_records: Option<u32>) -> Self {
        if let Some(max) = max_records {
            records.truncate(max as usize);
        }
        Self {
            total_size: records.len(),
            records,
        }
    }
}

impl QueryInput {
    fn validate(&self) -> Result<(), ToolError> {
        if self.soql.trim().is_empty() {
            return Err(ToolError::InvalidArguments("soql must not be empty".into()));
        }
        if let Some(max) = self.max_records {
            if !(1..=MAX_RECORDS_LIMIT).contains(&max) {
                return Err(ToolError::InvalidArguments(format!(
                    "max_records must be between 1 and {MAX_RECORDS_LIMIT}, got {max}"
                )));
            }
        }
        Ok(())
    }
}

pub struct QueryTool;

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &'static str {
        "salesforce_query"
    }

    fn description(&self) -> &'static str {
        "Run a SOQL query and return JSON rows"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "soql": {
                    "type": "string",
                    "description": "SOQL query string"
                },
                "max_records": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_RECORDS_LIMIT,
                    "description": "Return at most this many records"
                }
            },
            "required": ["soql"]
        })
    }

    async fn call(&self, api: &dyn SalesforceApi, arguments: Value) -> Result<Value, ToolError> {
        let input: QueryInput = parse_args(arguments)?;
        input.validate()?;
        let records = api.run_query(&input.soql).await?;
        Ok(serde_json::to_value(QueryOutput::new(records, input.max_records))?)
    }
}
