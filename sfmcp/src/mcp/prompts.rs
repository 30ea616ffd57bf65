//! Prompt templates.

use std::collections::HashMap;

use super::protocol::{GetPromptResult, PromptArgument, PromptDef, PromptMessage, ToolCallContent};

pub const OPPS_BY_STAGE: &str = "opps_by_stage";

const DEFAULT_STAGE: &str = "Prospecting";

pub fn list_prompts() -> Vec<PromptDef> {
    vec![PromptDef {
        name: OPPS_BY_STAGE.to_string(),
        description: Some("Generate SOQL listing opportunities in a given stage".to_string()),
        arguments: vec![PromptArgument {
            name: "stage".to_string(),
            description: Some(format!("Opportunity stage name (default: {DEFAULT_STAGE})")),
            required: false,
        }],
    }]
}

/// Render a prompt, or `None` if no prompt has that name.
pub fn get_prompt(name: &str, arguments: &HashMap<String, String>) -> Option<GetPromptResult> {
    match name {
        OPPS_BY_STAGE => {
            let stage = arguments
                .get("stage")
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_STAGE);
            Some(GetPromptResult {
                description: Some(format!("Opportunities in stage {stage}")),
                messages: vec![PromptMessage {
                    role: "user".to_string(),
                    content: ToolCallContent::Text {
                        text: opps_by_stage_soql(stage),
                    },
                }],
            })
        }
        _ => None,
    }
}

fn opps_by_stage_soql(stage: &str) -> String {
    format!(
        "SELECT Id, Name, Amount FROM Opportunity WHERE StageName = '{}' ORDER BY Amount DESC LIMIT 50",
        escape_soql_literal(stage)
    )
}

/// Escape a value for use inside a single-quoted SOQL string literal.
pub fn escape_soql_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            _ => out.push(ch),
        }
    }
    out
}
