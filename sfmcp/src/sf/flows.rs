//! Client-side join of flow versions and flow definitions.
//!
//! The tooling API exposes `Flow` (one row per version) and `FlowDefinition`
//! (one row per flow, pointing at its active and latest versions) separately.
//! We combine them into one "current flow" record per definition.

use std::collections::HashMap;

use serde_json::{json, Value};

use super::records::{str_field, Record};

/// Tooling-API query for flow version rows.
pub const FLOW_VERSION_SOQL: &str = "SELECT Id, MasterLabel, Status, VersionNumber FROM Flow";

/// Tooling-API query for flow definition rows.
pub const FLOW_DEFINITION_SOQL: &str =
    "SELECT Id, DeveloperName, ActiveVersionId, LatestVersionId FROM FlowDefinition";

/// Join version rows onto definition rows.
///
/// Definitions whose `LatestVersionId` does not resolve to a version row are
/// skipped. Output is sorted by `masterLabel`; a missing label sorts as "".
pub fn join_flow_versions(versions: Vec<Record>, definitions: Vec<Record>) -> Vec<Record> {
    let mut by_id: HashMap<String, Record> = HashMap::with_capacity(versions.len());
    for version in versions {
        if let Some(id) = str_field(&version, "Id") {
            by_id.insert(id.to_string(), version);
        }
    }

    let mut flows: Vec<Record> = definitions
        .iter()
        .filter_map(|definition| {
            let latest_id = str_field(definition, "LatestVersionId")?;
            let version = by_id.get(latest_id)?;
            let active_id = str_field(definition, "ActiveVersionId");

            let combined = json!({
                "id": latest_id,
                "masterLabel": field_or_null(version, "MasterLabel"),
                "status": field_or_null(version, "Status"),
                "versionNumber": field_or_null(version, "VersionNumber"),
                "developerName": field_or_null(definition, "DeveloperName"),
                "definitionId": field_or_null(definition, "Id"),
                "activeVersionId": active_id,
                "latestVersionId": latest_id,
                "isActive": active_id == Some(latest_id),
            });
            match combined {
                Value::Object(map) => Some(map),
                _ => None,
            }
        })
        .collect();

    flows.sort_by(|a, b| label(a).cmp(label(b)));
    flows
}

fn field_or_null(record: &Record, key: &str) -> Value {
    record.get(key).cloned().unwrap_or(Value::Null)
}

fn label(record: &Record) -> &str {
    str_field(record, "masterLabel").unwrap_or("")
}
