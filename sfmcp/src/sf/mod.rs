//! Salesforce CLI adapter.
//!
//! Tools never spawn processes themselves; they go through [`SalesforceApi`],
//! which [`SfCli`] implements by shelling out to `sf`.

mod cli;
mod error;
mod flows;
mod records;
mod retrieve;

use async_trait::async_trait;

pub use cli::{SfCli, DASHBOARD_SOQL, REPORT_SOQL};
pub use error::{SfError, NO_ERROR_OUTPUT};
pub use flows::{join_flow_versions, FLOW_DEFINITION_SOQL, FLOW_VERSION_SOQL};
pub use records::{
    bool_field, camel_case_key, camel_case_record, int_field, str_field, string_field, Record,
};
pub use retrieve::{conventional_paths, flow_file_name, FlowArtifact, FLOW_FILE_SUFFIX, SCAFFOLD_DIRS};

/// Operations the tools need from Salesforce.
#[async_trait]
pub trait SalesforceApi: Send + Sync {
    /// Run a SOQL query and return its records.
    async fn run_query(&self, soql: &str) -> Result<Vec<Record>, SfError>;

    /// API names of every sObject in the org.
    async fn list_objects(&self) -> Result<Vec<String>, SfError>;

    /// Full describe of one sObject.
    async fn describe_object(&self, object_api_name: &str) -> Result<Record, SfError>;

    /// One record per flow definition, joined to its latest version.
    async fn list_flows(&self) -> Result<Vec<Record>, SfError>;

    /// Reports with camelCase keys.
    async fn list_reports(&self) -> Result<Vec<Record>, SfError>;

    /// Dashboards with camelCase keys.
    async fn list_dashboards(&self) -> Result<Vec<Record>, SfError>;

    /// Retrieve a flow's XML definition.
    async fn describe_flow(&self, flow_developer_name: &str) -> Result<FlowArtifact, SfError>;
}

/// Reject names that are not plain API names (letters, digits, underscores).
///
/// Names end up in CLI arguments and in file names during flow retrieval.
pub fn validate_api_name(name: &str) -> Result<(), SfError> {
    let valid = !name.is_empty()
        && name.len() <= 255
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SfError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_api_name() {
        for ok in ["Account", "My_Object__c", "Lead_Router_v2", "a"] {
            assert!(validate_api_name(ok).is_ok(), "{ok}");
        }
        for bad in ["", "../x", "Flow:X", "a b", "Name;rm", "Ünïcode", "x/y"] {
            assert!(
                matches!(validate_api_name(bad), Err(SfError::InvalidName(_))),
                "{bad}"
            );
        }
        assert!(validate_api_name(&"a".repeat(256)).is_err());
    }
}
