//! Error taxonomy for the Salesforce CLI adapter.
//!
//! Every variant carries the text an operator needs to fix the root cause
//! (captured CLI output, paths tried, the offending name) so nothing has to
//! be reproduced to diagnose a failure.

use std::path::PathBuf;

/// Fallback used when a failing `sf` process printed nothing useful.
pub const NO_ERROR_OUTPUT: &str = "(no error output)";

/// Errors raised while invoking the `sf` CLI or interpreting its output.
#[derive(Debug, thiserror::Error)]
pub enum SfError {
    /// The executable could not be located.
    #[error(
        "Salesforce CLI `{program}` was not found; install it from \
         https://developer.salesforce.com/tools/salesforcecli and make sure it is on PATH"
    )]
    ProgramNotFound { program: String },

    /// The process completed but reported failure (or was killed on timeout).
    #[error("sf command failed ({}): {stderr}", exit_label(.code))]
    NonZeroExit { code: Option<i32>, stderr: String },

    /// Exit code was zero but stdout was not JSON.
    #[error("sf returned output that is not valid JSON: {0}")]
    MalformedOutput(#[source] serde_json::Error),

    /// The JSON envelope did not have the shape the operation expects.
    #[error("unexpected response shape from sf for operation `{operation}`")]
    UnexpectedResponseShape { operation: &'static str },

    /// `sf project retrieve start` failed.
    #[error("retrieving flow `{flow}` failed: {stderr}")]
    RetrieveFailed { flow: String, stderr: String },

    /// Retrieval succeeded but no artifact file could be found.
    #[error("{}", artifact_not_found_message(.flow, .retrieve_output, .tried, .similar))]
    ArtifactNotFound {
        flow: String,
        retrieve_output: String,
        tried: Vec<PathBuf>,
        similar: Vec<PathBuf>,
    },

    /// An API name that would be unsafe to pass along (or to use as a file name).
    #[error("invalid API name `{0}`: use only ASCII letters, digits and underscores")]
    InvalidName(String),

    /// Local I/O failure (spawn, read, working directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code".to_string(),
    }
}

fn artifact_not_found_message(
    flow: &str,
    retrieve_output: &str,
    tried: &[PathBuf],
    similar: &[PathBuf],
) -> String {
    let mut out = format!("flow `{flow}` was retrieved but its metadata file could not be found\n");

    out.push_str("retrieve output:\n");
    let retrieve_output = retrieve_output.trim();
    if retrieve_output.is_empty() {
        out.push_str(&format!("  {NO_ERROR_OUTPUT}\n"));
    } else {
        for line in retrieve_output.lines() {
            out.push_str(&format!("  {line}\n"));
        }
    }

    out.push_str("paths tried:\n");
    for path in tried {
        out.push_str(&format!("  - {}\n", path.display()));
    }

    out.push_str("similar files:\n");
    if similar.is_empty() {
        out.push_str("  (none)\n");
    } else {
        for path in similar {
            out.push_str(&format!("  - {}\n", path.display()));
        }
    }

    out.trim_end().to_string()
}
