//! End-to-end: JSON-RPC lines in, JSON-RPC lines out, with `SfCli` running a
//! fake `sf` shell script.

#![cfg(unix)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use sfmcp::{McpServer, SalesforceApi, SfCli};

const FAKE_SF: &str = r#"#!/bin/sh
case "$*" in
  *"sobject list"*)
    echo '{"status":0,"result":["Account","Contact","Lead"]}'
    ;;
  *"FROM FlowDefinition"*)
    echo '{"status":0,"result":{"records":[{"Id":"300A","DeveloperName":"Lead_Router","ActiveVersionId":"301A","LatestVersionId":"301A"}]}}'
    ;;
  *"FROM Flow"*)
    echo '{"status":0,"result":{"records":[{"Id":"301A","MasterLabel":"Lead Router","Status":"Active","VersionNumber":2}]}}'
    ;;
  *"FROM Broken"*)
    echo "ERROR running force:data:soql:query: sObject type 'Broken' is not supported." >&2
    exit 1
    ;;
  *"data query"*)
    echo '{"status":0,"result":{"records":[{"Id":"1"},{"Id":"2"},{"Id":"3"}],"totalSize":3,"done":true}}'
    ;;
  *"project retrieve start"*)
    mkdir -p force-app/main/default/flows
    printf '%s' '<Flow><label>Lead Router</label></Flow>' > force-app/main/default/flows/Lead_Router.flow-meta.xml
    echo 'Retrieved Source'
    ;;
  *)
    echo "unexpected: $*" >&2
    exit 2
    ;;
esac
"#;

fn server_in(dir: &Path) -> Arc<McpServer> {
    let script = dir.join("fake_sf.sh");
    std::fs::write(&script, FAKE_SF).unwrap();
    let cli = SfCli::with_program("sh", None, dir, Duration::from_secs(10))
        .with_leading_args(vec![script.to_string_lossy().to_string()]);
    let api: Arc<dyn SalesforceApi> = Arc::new(cli);
    Arc::new(McpServer::new(api))
}

/// Feed `requests` to the server and collect every response line.
async fn exchange(server: Arc<McpServer>, requests: &[Value]) -> Vec<Value> {
    let (mut client_tx, server_rx) = tokio::io::duplex(64 * 1024);
    let (server_tx, client_rx) = tokio::io::duplex(256 * 1024);

    let serving = tokio::spawn(server.serve(BufReader::new(server_rx), server_tx));

    for request in requests {
        let mut line = serde_json::to_vec(request).unwrap();
        line.push(b'\n');
        client_tx.write_all(&line).await.unwrap();
    }
    drop(client_tx);

    let mut responses = Vec::new();
    let mut lines = BufReader::new(client_rx).lines();
    while let Some(line) = lines.next_line().await.unwrap() {
        responses.push(serde_json::from_str(&line).unwrap());
    }
    serving.await.unwrap().unwrap();
    responses
}

fn response(responses: &[Value], id: u64) -> &Value {
    responses
        .iter()
        .find(|r| r["id"] == id)
        .unwrap_or_else(|| panic!("no response with id {id} in {responses:?}"))
}

fn call(id: u64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    })
}

#[tokio::test]
async fn test_full_session() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_in(dir.path());

    let responses = exchange(
        server,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                "protocolVersion": "2025-11-25",
                "capabilities": {},
                "clientInfo": {"name": "integration", "version": "0"}
            }}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
            call(3, "salesforce_list_objects", json!({})),
            call(4, "salesforce_query", json!({"soql": "SELECT Id FROM Account", "max_records": 2})),
            call(5, "salesforce_list_flows", json!({})),
            call(6, "salesforce_describe_flow", json!({"flow_developer_name": "Lead_Router"})),
            call(7, "salesforce_query", json!({"soql": "SELECT Id FROM Broken"})),
        ],
    )
    .await;

    // One response per request; the notification gets none.
    assert_eq!(responses.len(), 7);

    assert_eq!(response(&responses, 1)["result"]["serverInfo"]["name"], "sfmcp");
    assert_eq!(
        response(&responses, 2)["result"]["tools"].as_array().unwrap().len(),
        7
    );

    let objects = &response(&responses, 3)["result"]["structuredContent"];
    assert_eq!(objects["total_count"], 3);

    let query = &response(&responses, 4)["result"]["structuredContent"];
    assert_eq!(query["total_size"], 2);

    let flows = &response(&responses, 5)["result"]["structuredContent"];
    assert_eq!(flows["flows"][0]["developerName"], "Lead_Router");
    assert_eq!(flows["flows"][0]["isActive"], true);

    let flow = &response(&responses, 6)["result"]["structuredContent"];
    assert_eq!(flow["flowContent"], "<Flow><label>Lead Router</label></Flow>");
    assert_eq!(flow["contentLength"], 39);
    assert!(!dir
        .path()
        .join("force-app/main/default/flows/Lead_Router.flow-meta.xml")
        .exists());
    assert!(dir.path().join("force-app/main").is_dir());

    let failed = &response(&responses, 7)["result"];
    assert_eq!(failed["isError"], true);
    assert!(failed["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("sObject type 'Broken' is not supported."));
}

#[tokio::test]
async fn test_protocol_errors() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_in(dir.path());

    let responses = exchange(
        server,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "sampling/createMessage"}),
            call(2, "salesforce.query", json!({"soql": "SELECT Id FROM Account"})),
            json!({"jsonrpc": "2.0", "id": 3, "method": "resources/read", "params": {"uri": "res://query/missing"}}),
            json!({"jsonrpc": "2.0", "id": 4, "method": "resources/read", "params": {"uri": "res://query/recent_opportunities"}}),
        ],
    )
    .await;

    assert_eq!(response(&responses, 1)["error"]["code"], -32601);
    assert_eq!(response(&responses, 2)["error"]["code"], -32602);
    assert_eq!(response(&responses, 3)["error"]["code"], -32002);
    assert!(response(&responses, 4)["result"]["contents"][0]["text"]
        .as_str()
        .unwrap()
        .contains("FROM Opportunity"));
}
