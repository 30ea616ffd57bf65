//! Saved SOQL queries exposed as MCP resources under `res://query/<name>`.

use super::protocol::{McpResourceDef, ResourceContent};

/// URI prefix shared by every saved query.
pub const QUERY_URI_PREFIX: &str = "res://query/";

const MIME_TEXT: &str = "text/plain";

/// A named query a client can read and then run with `salesforce_query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedQuery {
    pub name: &'static str,
    pub description: &'static str,
    pub soql: &'static str,
}

pub const SAVED_QUERIES: &[SavedQuery] = &[
    SavedQuery {
        name: "recent_opportunities",
        description: "The 25 most recently modified opportunities",
        soql: "SELECT Id, Name, StageName, Amount FROM Opportunity ORDER BY LastModifiedDate DESC LIMIT 25",
    },
    SavedQuery {
        name: "active_users",
        description: "All active users",
        soql: "SELECT Id, Name, Email FROM User WHERE IsActive = true",
    },
];

impl SavedQuery {
    pub fn uri(&self) -> String {
        format!("{QUERY_URI_PREFIX}{}", self.name)
    }
}

/// Resource definitions advertised by `resources/list`.
pub fn list_resources() -> Vec<McpResourceDef> {
    SAVED_QUERIES
        .iter()
        .map(|q| McpResourceDef {
            uri: q.uri(),
            name: q.name.to_string(),
            description: Some(q.description.to_string()),
            mime_type: Some(MIME_TEXT.to_string()),
        })
        .collect()
}

/// Resolve a resource URI to its saved query.
///
/// Returns `None` if the URI doesn't match any known resource.
pub fn resolve_uri(uri: &str) -> Option<&'static SavedQuery> {
    let name = uri.strip_prefix(QUERY_URI_PREFIX)?;
    SAVED_QUERIES.iter().find(|q| q.name == name)
}

/// Content returned by `resources/read`.
pub fn build_resource_content(uri: &str, query: &SavedQuery) -> ResourceContent {
    ResourceContent {
        uri: uri.to_string(),
        mime_type: Some(MIME_TEXT.to_string()),
        text: Some(query.soql.to_string()),
    }
}
