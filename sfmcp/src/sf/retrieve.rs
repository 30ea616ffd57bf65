//! Flow metadata retrieval.
//!
//! `sf project retrieve start` has no JSON return channel for the artifact:
//! it drops `<name>.flow-meta.xml` somewhere under the project. Retrieval is
//! therefore a fixed sequence of steps, each with its own failure:
//!
//! 1. retrieve (`RetrieveFailed`)
//! 2. locate at a conventional path, else walk the tree (`ArtifactNotFound`)
//! 3. read (`Io`)
//! 4. best-effort cleanup (never fails the call)

use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use super::cli::{failure_text, SfCli};
use super::error::SfError;
use super::validate_api_name;

/// File name suffix the CLI uses for flow metadata.
pub const FLOW_FILE_SUFFIX: &str = ".flow-meta.xml";

/// Directory names that belong to the project scaffold and may be pruned
/// when a retrieval leaves them empty.
pub const SCAFFOLD_DIRS: &[&str] = &["flows", "default", "main"];

/// Conventional parent directories, most specific first.
const CONVENTIONAL_DIRS: &[&str] = &[
    "force-app/main/default/flows",
    "main/default/flows",
    "default/flows",
    "flows",
    "",
];

/// Upper bound on "similar files" listed in a not-found error.
const MAX_SIMILAR: usize = 20;

/// A retrieved flow definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowArtifact {
    #[serde(rename = "flowDeveloperName")]
    pub developer_name: String,
    #[serde(rename = "flowContent")]
    pub content: String,
    /// Length of `content` in characters.
    pub content_length: usize,
    pub file_path: String,
}

pub fn flow_file_name(developer_name: &str) -> String {
    format!("{developer_name}{FLOW_FILE_SUFFIX}")
}

/// Candidate locations for a flow artifact, relative to `root`, in lookup order.
pub fn conventional_paths(root: &Path, developer_name: &str) -> Vec<PathBuf> {
    let file_name = flow_file_name(developer_name);
    CONVENTIONAL_DIRS
        .iter()
        .map(|dir| {
            if dir.is_empty() {
                root.join(&file_name)
            } else {
                root.join(dir).join(&file_name)
            }
        })
        .collect()
}

impl SfCli {
    /// Retrieve a flow's XML, read it, and remove what the retrieval left behind.
    ///
    /// Retrievals of the same flow are serialized; different flows proceed
    /// concurrently.
    pub async fn retrieve_flow(&self, developer_name: &str) -> Result<FlowArtifact, SfError> {
        validate_api_name(developer_name)?;

        let lock = self.retrieve_lock(developer_name).await;
        let result = {
            let _guard = lock.lock().await;
            self.retrieve_flow_locked(developer_name).await
        };
        self.release_retrieve_lock(developer_name, lock).await;
        result
    }

    async fn retrieve_flow_locked(&self, developer_name: &str) -> Result<FlowArtifact, SfError> {
        let root = self.working_dir().to_path_buf();

        // Pruning waits for every retrieval still writing under `root`, so an
        // empty `flows/` another retrieval just created is never removed.
        let (path, content) = {
            let _writing = self.scaffold_lock().read().await;
            let path = self.fetch_flow_file(&root, developer_name).await?;
            let content = tokio::fs::read_to_string(&path).await?;
            (path, content)
        };
        let artifact = FlowArtifact {
            developer_name: developer_name.to_string(),
            content_length: content.chars().count(),
            content,
            file_path: path.display().to_string(),
        };

        let _pruning = self.scaffold_lock().write().await;
        cleanup(&root, &path).await;
        Ok(artifact)
    }

    /// Run the retrieval and find the file it produced.
    async fn fetch_flow_file(&self, root: &Path, developer_name: &str) -> Result<PathBuf, SfError> {
        let metadata = format!("Flow:{developer_name}");
        let output = self
            .run_raw(&["project", "retrieve", "start", "--metadata", &metadata])
            .await?;
        if !output.status.success() {
            return Err(SfError::RetrieveFailed {
                flow: developer_name.to_string(),
                stderr: failure_text(&output),
            });
        }

        if let Some(path) = locate_conventional(root, developer_name).await {
            return Ok(path);
        }
        let search = search_tree(root.to_path_buf(), developer_name.to_string()).await?;
        if let Some(path) = search.found {
            tracing::debug!("flow `{developer_name}` found outside conventional paths: {}", path.display());
            return Ok(path);
        }

        let mut retrieve_output = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            retrieve_output.push('\n');
            retrieve_output.push_str(&stderr);
        }
        Err(SfError::ArtifactNotFound {
            flow: developer_name.to_string(),
            retrieve_output,
            tried: conventional_paths(root, developer_name),
            similar: search.similar,
        })
    }
}

async fn locate_conventional(root: &Path, developer_name: &str) -> Option<PathBuf> {
    for candidate in conventional_paths(root, developer_name) {
        if tokio::fs::metadata(&candidate)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            return Some(candidate);
        }
    }
    None
}

#[derive(Debug, Default)]
struct TreeSearch {
    found: Option<PathBuf>,
    similar: Vec<PathBuf>,
}

/// Walk `root` for the artifact on the blocking pool.
async fn search_tree(root: PathBuf, developer_name: String) -> Result<TreeSearch, SfError> {
    tokio::task::spawn_blocking(move || walk_for_flow(&root, &developer_name))
        .await
        .map_err(|e| SfError::Io(std::io::Error::other(e)))
}

/// Depth-first walk in file-name order, so the first match is stable for a
/// given tree. Every directory is searched, hidden ones included.
fn walk_for_flow(root: &Path, developer_name: &str) -> TreeSearch {
    let file_name = flow_file_name(developer_name);
    let needle = developer_name.to_lowercase();
    let mut search = TreeSearch::default();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("skipping unreadable entry during flow search: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name == file_name.as_str() {
            search.found = Some(entry.into_path());
            return search;
        }
        if search.similar.len() < MAX_SIMILAR && name.to_lowercase().contains(&needle) {
            search.similar.push(entry.into_path());
        }
    }
    search
}

/// Delete the artifact, its parent if empty, and the grandparent if it is an
/// empty scaffold directory. Nothing at or above `root` is removed.
async fn cleanup(root: &Path, file: &Path) {
    if let Err(e) = tokio::fs::remove_file(file).await {
        tracing::warn!("failed to delete retrieved flow file {}: {e}", file.display());
        return;
    }

    let Some(parent) = file.parent() else { return };
    if !prunable(root, parent) || !remove_if_empty(parent).await {
        return;
    }

    let Some(grandparent) = parent.parent() else { return };
    let is_scaffold = grandparent
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| SCAFFOLD_DIRS.contains(&n));
    if is_scaffold && prunable(root, grandparent) {
        remove_if_empty(grandparent).await;
    }
}

/// Only strict descendants of `root` may be removed.
fn prunable(root: &Path, dir: &Path) -> bool {
    dir != root && dir.starts_with(root)
}

/// Returns true if the directory was removed.
async fn remove_if_empty(dir: &Path) -> bool {
    let empty = match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(e) => {
            tracing::warn!("failed to inspect {} during cleanup: {e}", dir.display());
            return false;
        }
    };
    if !empty {
        return false;
    }
    match tokio::fs::remove_dir(dir).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("failed to remove empty directory {}: {e}", dir.display());
            false
        }
    }
}
