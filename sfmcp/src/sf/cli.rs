//! Subprocess execution for the `sf` CLI and JSON envelope unwrapping.
//!
//! Every call is an argument vector (never a shell string) run in the
//! configured working directory. JSON operations demand `--json` and accept
//! only exit code 0 with parseable stdout.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::{Mutex, RwLock};

use super::error::{SfError, NO_ERROR_OUTPUT};
use super::flows::{join_flow_versions, FLOW_DEFINITION_SOQL, FLOW_VERSION_SOQL};
use super::records::{camel_case_record, Record};
use super::retrieve::FlowArtifact;
use super::{validate_api_name, SalesforceApi};
use crate::config::SfmcpConfig;

/// Report listing query (standard API).
pub const REPORT_SOQL: &str = "SELECT Id, Name, DeveloperName, Format, FolderName, Description, \
     OwnerId, LastRunDate, LastViewedDate, LastReferencedDate FROM Report ORDER BY Name";

/// Dashboard listing query (standard API).
pub const DASHBOARD_SOQL: &str = "SELECT Id, Title, DeveloperName, FolderName, Description, \
     OwnerId, LastViewedDate, LastReferencedDate FROM Dashboard ORDER BY Title";

/// Adapter around the `sf` executable.
pub struct SfCli {
    /// Executable name or path.
    program: String,
    /// Arguments placed before every subcommand (launcher arguments).
    leading_args: Vec<String>,
    /// Org alias appended as `--target-org`, if any.
    target_org: Option<String>,
    /// Directory commands run in; also the root of flow artifact searches.
    working_dir: PathBuf,
    /// Upper bound on a single invocation.
    timeout: Duration,
    /// Per-flow locks so two retrievals of the same flow never share a file.
    retrieve_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Held shared while a retrieval may be writing under the working
    /// directory, exclusively while cleanup prunes empty directories.
    scaffold: RwLock<()>,
}

impl SfCli {
    /// Build the adapter from the startup configuration.
    pub fn new(config: &SfmcpConfig) -> Self {
        Self::with_program(
            config.sf_bin.clone(),
            config.target_org.clone(),
            config.resolved_working_dir(),
            config.command_timeout(),
        )
        .with_leading_args(config.sf_args.clone())
    }

    /// Build the adapter from explicit parts.
    pub fn with_program(
        program: impl Into<String>,
        target_org: Option<String>,
        working_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            target_org: target_org.filter(|org| !org.trim().is_empty()),
            working_dir: working_dir.into(),
            timeout,
            retrieve_locks: Mutex::new(HashMap::new()),
            scaffold: RwLock::new(()),
        }
    }

    /// Arguments placed before every command, for launchers such as
    /// `npx @salesforce/cli`.
    pub fn with_leading_args(mut self, args: Vec<String>) -> Self {
        self.leading_args = args;
        self
    }

    /// Run `sh <script>` in place of `sf`. Writing an executable and exec'ing
    /// it immediately races with concurrent forks (ETXTBSY), so tests go
    /// through the shell instead.
    #[cfg(test)]
    pub(crate) fn scripted(script: &Path, working_dir: &Path, timeout: Duration) -> Self {
        Self::with_program("sh", None, working_dir, timeout)
            .with_leading_args(vec![script.to_string_lossy().to_string()])
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn target_org(&self) -> Option<&str> {
        self.target_org.as_deref()
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Append the shared flags every invocation carries.
    fn command_args(&self, args: &[&str]) -> Vec<String> {
        let mut full: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        if let Some(org) = &self.target_org {
            full.push("--target-org".to_string());
            full.push(org.clone());
        }
        full
    }

    /// Spawn the process, drain both pipes, and wait for exit.
    ///
    /// The child is killed if the timeout elapses (the future owning it is
    /// dropped and `kill_on_drop` is set).
    async fn execute(&self, args: &[String]) -> Result<Output, SfError> {
        tracing::debug!(program = %self.program, ?args, "running sf command");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            // A missing working directory also surfaces as NotFound.
            if e.kind() == std::io::ErrorKind::NotFound && self.working_dir.is_dir() {
                SfError::ProgramNotFound {
                    program: self.program.clone(),
                }
            } else {
                SfError::Io(e)
            }
        })?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => Ok(output?),
            Err(_) => {
                tracing::warn!(
                    "sf command timed out after {:?}; the process was killed",
                    self.timeout
                );
                Err(SfError::NonZeroExit {
                    code: None,
                    stderr: format!(
                        "timed out after {}s (the CLI may be waiting for interactive input)",
                        self.timeout.as_secs_f32()
                    ),
                })
            }
        }
    }

    /// Run a command that must answer with JSON on stdout.
    pub async fn run_json(&self, args: &[&str]) -> Result<Value, SfError> {
        let output = self.execute(&self.command_args(args)).await?;
        if !output.status.success() {
            return Err(SfError::NonZeroExit {
                code: output.status.code(),
                stderr: failure_text(&output),
            });
        }
        serde_json::from_slice(&output.stdout).map_err(SfError::MalformedOutput)
    }

    /// Run a command whose output is not JSON; exit status is left to the caller.
    pub(crate) async fn run_raw(&self, args: &[&str]) -> Result<Output, SfError> {
        self.execute(&self.command_args(args)).await
    }

    /// Per-name lock guarding flow retrieval.
    pub(crate) async fn retrieve_lock(&self, flow: &str) -> Arc<Mutex<()>> {
        let mut locks = self.retrieve_locks.lock().await;
        Arc::clone(locks.entry(flow.to_string()).or_default())
    }

    /// Give back a lock from [`Self::retrieve_lock`]. The entry is dropped
    /// once no other retrieval of `flow` holds or awaits it.
    pub(crate) async fn release_retrieve_lock(&self, flow: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.retrieve_locks.lock().await;
        drop(lock);
        if locks.get(flow).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(flow);
        }
    }

    #[cfg(test)]
    pub(crate) async fn retrieve_lock_count(&self) -> usize {
        self.retrieve_locks.lock().await.len()
    }

    pub(crate) fn scaffold_lock(&self) -> &RwLock<()> {
        &self.scaffold
    }

    async fn query(&self, soql: &str, tooling: bool, operation: &'static str) -> Result<Vec<Record>, SfError> {
        let mut args = vec!["data", "query", "--query", soql];
        if tooling {
            args.push("--use-tooling-api");
        }
        args.push("--json");
        let envelope = self.run_json(&args).await?;
        result_records(envelope, operation)
    }
}

#[async_trait]
impl SalesforceApi for SfCli {
    async fn run_query(&self, soql: &str) -> Result<Vec<Record>, SfError> {
        self.query(soql, false, "query").await
    }

    async fn list_objects(&self) -> Result<Vec<String>, SfError> {
        let envelope = self
            .run_json(&["sobject", "list", "--sobject", "all", "--json"])
            .await?;
        result_list(envelope, "list_objects")?
            .into_iter()
            .map(|item| match item {
                Value::String(name) => Ok(name),
                _ => Err(SfError::UnexpectedResponseShape {
                    operation: "list_objects",
                }),
            })
            .collect()
    }

    async fn describe_object(&self, object_api_name: &str) -> Result<Record, SfError> {
        validate_api_name(object_api_name)?;
        let envelope = self
            .run_json(&["sobject", "describe", "--sobject", object_api_name, "--json"])
            .await?;
        result_object(envelope, "describe")
    }

    async fn list_flows(&self) -> Result<Vec<Record>, SfError> {
        let (versions, definitions) = tokio::try_join!(
            self.query(FLOW_VERSION_SOQL, true, "list_flows"),
            self.query(FLOW_DEFINITION_SOQL, true, "list_flows"),
        )?;
        Ok(join_flow_versions(versions, definitions))
    }

    async fn list_reports(&self) -> Result<Vec<Record>, SfError> {
        let records = self.query(REPORT_SOQL, false, "list_reports").await?;
        Ok(records.into_iter().map(camel_case_record).collect())
    }

    async fn list_dashboards(&self) -> Result<Vec<Record>, SfError> {
        let records = self.query(DASHBOARD_SOQL, false, "list_dashboards").await?;
        Ok(records.into_iter().map(camel_case_record).collect())
    }

    async fn describe_flow(&self, flow_developer_name: &str) -> Result<FlowArtifact, SfError> {
        self.retrieve_flow(flow_developer_name).await
    }
}

/// Text describing why a process failed: stderr, else the `message` of a JSON
/// error envelope on stdout (what `sf --json` prints), else a fixed literal.
pub(crate) fn failure_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !stderr.is_empty() {
        return stderr;
    }
    serde_json::from_slice::<Value>(&output.stdout)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| NO_ERROR_OUTPUT.to_string())
}

// ---------------------------------------------------------------------------
// Envelope unwrapping
// ---------------------------------------------------------------------------

fn take_result(envelope: Value, operation: &'static str) -> Result<Value, SfError> {
    match envelope {
        Value::Object(mut map) => map
            .remove("result")
            .ok_or(SfError::UnexpectedResponseShape { operation }),
        _ => Err(SfError::UnexpectedResponseShape { operation }),
    }
}

/// `{"result": [...]}`
pub(crate) fn result_list(envelope: Value, operation: &'static str) -> Result<Vec<Value>, SfError> {
    match take_result(envelope, operation)? {
        Value::Array(items) => Ok(items),
        _ => Err(SfError::UnexpectedResponseShape { operation }),
    }
}

/// `{"result": {"records": [{...}, ...]}}`
pub(crate) fn result_records(envelope: Value, operation: &'static str) -> Result<Vec<Record>, SfError> {
    let Value::Object(mut result) = take_result(envelope, operation)? else {
        return Err(SfError::UnexpectedResponseShape { operation });
    };
    let Some(Value::Array(records)) = result.remove("records") else {
        return Err(SfError::UnexpectedResponseShape { operation });
    };
    records
        .into_iter()
        .map(|record| match record {
            Value::Object(map) => Ok(map),
            _ => Err(SfError::UnexpectedResponseShape { operation }),
        })
        .collect()
}

/// `{"result": {...}}`
pub(crate) fn result_object(envelope: Value, operation: &'static str) -> Result<Record, SfError> {
    match take_result(envelope, operation)? {
        Value::Object(map) => Ok(map),
        _ => Err(SfError::UnexpectedResponseShape { operation }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Write a fake `sf` as a shell script into `dir`.
    pub(crate) fn fake_sf(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake_sf.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        path
    }

    fn scripted(body: &str) -> (tempfile::TempDir, SfCli) {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_sf(dir.path(), body);
        let cli = SfCli::scripted(&script, dir.path(), Duration::from_secs(10));
        (dir, cli)
    }

    #[test]
    fn test_result_list() {
        let list = result_list(json!({"status": 0, "result": ["Account", "Contact"]}), "op").unwrap();
        assert_eq!(list.len(), 2);

        let err = result_list(json!({"status": 0}), "op").unwrap_err();
        assert!(matches!(err, SfError::UnexpectedResponseShape { operation: "op" }));

        let err = result_list(json!({"result": {"a": 1}}), "op").unwrap_err();
        assert!(matches!(err, SfError::UnexpectedResponseShape { .. }));

        let err = result_list(json!([1, 2]), "op").unwrap_err();
        assert!(matches!(err, SfError::UnexpectedResponseShape { .. }));
    }

    #[test]
    fn test_result_records() {
        let envelope = json!({
            "status": 0,
            "result": {
                "records": [{"Id": "001"}, {"Id": "002"}],
                "totalSize": 2,
                "done": true
            }
        });
        let records = result_records(envelope, "query").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["Id"], "002");

        let err = result_records(json!({"result": {"totalSize": 0}}), "query").unwrap_err();
        assert!(matches!(err, SfError::UnexpectedResponseShape { operation: "query" }));

        let err = result_records(json!({"result": {"records": [1]}}), "query").unwrap_err();
        assert!(matches!(err, SfError::UnexpectedResponseShape { .. }));

        let err = result_records(json!({"result": []}), "query").unwrap_err();
        assert!(matches!(err, SfError::UnexpectedResponseShape { .. }));
    }

    #[test]
    fn test_result_object() {
        let obj = result_object(json!({"result": {"name": "Account", "fields": []}}), "describe").unwrap();
        assert_eq!(obj["name"], "Account");

        let err = result_object(json!({"result": "Account"}), "describe").unwrap_err();
        assert!(err.to_string().contains("`describe`"));
    }

    #[test]
    fn test_command_args_appends_target_org() {
        let cli = SfCli::with_program("sf", Some("prod".into()), ".", Duration::from_secs(1));
        assert_eq!(
            cli.command_args(&["sobject", "list", "--json"]),
            vec!["sobject", "list", "--json", "--target-org", "prod"]
        );

        let cli = SfCli::with_program("sf", Some("  ".into()), ".", Duration::from_secs(1));
        assert!(cli.target_org().is_none());
        assert_eq!(cli.command_args(&["org", "display"]), vec!["org", "display"]);
    }

    #[tokio::test]
    async fn test_program_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cli = SfCli::with_program(
            "__nonexistent_sf_binary_12345__",
            None,
            dir.path(),
            Duration::from_secs(5),
        );
        let err = cli.run_json(&["org", "list", "--json"]).await.unwrap_err();
        assert!(matches!(err, SfError::ProgramNotFound { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_missing_working_dir_is_io_error() {
        let cli = SfCli::with_program(
            "sh",
            None,
            "/nonexistent/sfmcp/workdir/12345",
            Duration::from_secs(5),
        );
        let err = cli.run_json(&["-c", "echo {}"]).await.unwrap_err();
        assert!(matches!(err, SfError::Io(_)), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_json_success() {
        let (_dir, cli) = scripted(r#"echo '{"status":0,"result":["Account"]}'"#);
        let value = cli.run_json(&["sobject", "list", "--json"]).await.unwrap();
        assert_eq!(value["result"][0], "Account");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_includes_stderr_verbatim() {
        let (_dir, cli) = scripted("echo 'ERROR: INVALID_FIELD: No such column Foo__c' >&2\nexit 1");
        let err = cli.run_json(&["data", "query"]).await.unwrap_err();
        match &err {
            SfError::NonZeroExit { code, stderr } => {
                assert_eq!(*code, Some(1));
                assert_eq!(stderr, "ERROR: INVALID_FIELD: No such column Foo__c");
            }
            other => panic!("expected NonZeroExit, got {other:?}"),
        }
        assert!(err
            .to_string()
            .contains("ERROR: INVALID_FIELD: No such column Foo__c"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_falls_back_to_json_message() {
        let (_dir, cli) = scripted(
            r#"echo '{"status":1,"name":"NoDefaultEnvError","message":"No default environment found."}'
exit 1"#,
        );
        let err = cli.run_json(&["org", "display", "--json"]).await.unwrap_err();
        assert!(err.to_string().contains("No default environment found."));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_without_output_uses_literal() {
        let (_dir, cli) = scripted("exit 3");
        let err = cli.run_json(&["anything"]).await.unwrap_err();
        match err {
            SfError::NonZeroExit { code, stderr } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, NO_ERROR_OUTPUT);
            }
            other => panic!("expected NonZeroExit, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_malformed_output_is_distinct_from_non_zero_exit() {
        let (_dir, cli) = scripted("echo 'Warning: update available'");
        let err = cli.run_json(&["sobject", "list", "--json"]).await.unwrap_err();
        assert!(matches!(err, SfError::MalformedOutput(_)), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_sf(dir.path(), "sleep 5\necho '{}'");
        let cli = SfCli::scripted(&script, dir.path(), Duration::from_millis(200));

        let started = std::time::Instant::now();
        let err = cli.run_json(&["data", "query"]).await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(4));
        match err {
            SfError::NonZeroExit { code, stderr } => {
                assert!(code.is_none());
                assert!(stderr.contains("timed out"));
            }
            other => panic!("expected NonZeroExit, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_arguments_passed_as_vector() {
        // Each argument is echoed back on its own line; quotes in the SOQL
        // must survive untouched because no shell re-parses them.
        let (_dir, cli) = scripted(
            r#"printf '{"result":{"records":['
first=1
for a in "$@"; do
  if [ $first -eq 0 ]; then printf ','; fi
  first=0
  printf '{"arg":"%s"}' "$(printf '%s' "$a" | sed 's/"/\\"/g')"
done
printf ']}}'"#,
        );
        let records = cli
            .run_query("SELECT Id FROM Account WHERE Name = 'O''Brien'")
            .await
            .unwrap();
        let args: Vec<&str> = records.iter().map(|r| r["arg"].as_str().unwrap()).collect();
        assert_eq!(
            args,
            vec![
                "data",
                "query",
                "--query",
                "SELECT Id FROM Account WHERE Name = 'O''Brien'",
                "--json"
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_objects() {
        let (_dir, cli) = scripted(r#"echo '{"status":0,"result":["Account","Contact","Opportunity"]}'"#);
        let names = cli.list_objects().await.unwrap();
        assert_eq!(names, vec!["Account", "Contact", "Opportunity"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_objects_rejects_non_strings() {
        let (_dir, cli) = scripted(r#"echo '{"status":0,"result":["Account",42]}'"#);
        let err = cli.list_objects().await.unwrap_err();
        assert!(matches!(err, SfError::UnexpectedResponseShape { operation: "list_objects" }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_describe_object_validates_name() {
        let (_dir, cli) = scripted(r#"echo '{"result":{}}'"#);
        let err = cli.describe_object("Account; rm -rf /").await.unwrap_err();
        assert!(matches!(err, SfError::InvalidName(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_flows_joins_both_queries() {
        let (_dir, cli) = scripted(
            r#"case "$*" in
  *FlowDefinition*)
    echo '{"result":{"records":[{"Id":"300A","DeveloperName":"Lead_Router","ActiveVersionId":"301A","LatestVersionId":"301A"},{"Id":"300B","DeveloperName":"Orphan","ActiveVersionId":null,"LatestVersionId":"301Z"}]}}'
    ;;
  *)
    echo '{"result":{"records":[{"Id":"301A","MasterLabel":"Lead Router","Status":"Active","VersionNumber":2}]}}'
    ;;
esac"#,
        );
        let flows = cli.list_flows().await.unwrap();
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0]["developerName"], "Lead_Router");
        assert_eq!(flows[0]["isActive"], true);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_reports_normalizes_keys() {
        let (_dir, cli) = scripted(
            r#"echo '{"result":{"records":[{"attributes":{"type":"Report"},"Id":"00O1","Name":"Pipeline","FolderName":"Sales","LastRunDate":null}]}}'"#,
        );
        let reports = cli.list_reports().await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0]["id"], "00O1");
        assert_eq!(reports[0]["name"], "Pipeline");
        assert_eq!(reports[0]["folderName"], "Sales");
        assert!(reports[0]["lastRunDate"].is_null());
        assert!(!reports[0].contains_key("attributes"));
    }
}
