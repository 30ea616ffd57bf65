//! MCP server exposing the Salesforce tools over stdio.
//!
//! Reads newline-delimited JSON-RPC from the client and writes one response
//! line per request. Stdout carries protocol frames only.
//!
//! ## Architecture
//!
//! ```text
//! MCP client
//!   │ stdin/stdout (newline-delimited JSON-RPC)
//!   ▼
//! McpServer
//!   ├── tools: salesforce_query, salesforce_describe, ... (one task per call)
//!   ├── resources: res://query/<name>
//!   ├── prompts: opps_by_stage
//!   └── SalesforceApi → SfCli → `sf` subprocesses
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use super::protocol::*;
use super::{prompts, resources};
use crate::sf::SalesforceApi;
use crate::tools::{self, Tool};

const SERVER_NAME: &str = "sfmcp";

type SharedWriter = Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

/// The MCP server state.
pub struct McpServer {
    /// Whether the client has sent `initialize`.
    initialized: AtomicBool,
    /// Backend the tools call into.
    api: Arc<dyn SalesforceApi>,
    /// Registered tools.
    tools: Vec<Arc<dyn Tool>>,
}

impl McpServer {
    pub fn new(api: Arc<dyn SalesforceApi>) -> Self {
        Self {
            initialized: AtomicBool::new(false),
            api,
            tools: tools::registry(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Serve on the process's stdin/stdout until the client disconnects.
    pub async fn run_stdio(self: Arc<Self>) -> std::io::Result<()> {
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve one client connection.
    ///
    /// `tools/call` requests run concurrently on their own tasks, so a slow
    /// `sf` invocation does not hold up other requests. Everything else is
    /// answered inline. On EOF, in-flight calls are allowed to finish and
    /// write their responses before this returns.
    pub async fn serve<R, W>(self: Arc<Self>, mut reader: R, writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let writer: Box<dyn AsyncWrite + Send + Unpin> = Box::new(writer);
        let writer: SharedWriter = Arc::new(Mutex::new(writer));
        let mut in_flight = JoinSet::new();
        let mut line_buf = String::new();

        loop {
            line_buf.clear();
            match reader.read_line(&mut line_buf).await {
                Ok(0) => {
                    tracing::info!("MCP server: client disconnected (EOF)");
                    break;
                }
                Ok(_) => {
                    let trimmed = line_buf.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match ClientMessage::from_line(trimmed) {
                        Ok(ClientMessage::Request(req)) if req.method == "tools/call" => {
                            let server = Arc::clone(&self);
                            let writer = Arc::clone(&writer);
                            in_flight.spawn(async move {
                                let response = server.handle_request(&req).await;
                                write_response(&writer, &response).await;
                            });
                        }
                        Ok(ClientMessage::Request(req)) => {
                            let response = self.handle_request(&req).await;
                            write_response(&writer, &response).await;
                        }
                        Ok(ClientMessage::Notification(notif)) => {
                            self.handle_notification(&notif);
                        }
                        Err(e) => {
                            tracing::warn!("MCP server: failed to parse message: {e}");
                            let (code, message) = if e.is_syntax() || e.is_eof() {
                                (error_codes::PARSE_ERROR, format!("Parse error: {e}"))
                            } else {
                                (error_codes::INVALID_REQUEST, format!("Invalid request: {e}"))
                            };
                            let id = ClientMessage::salvage_id(trimmed);
                            let response = JsonRpcResponse::failure(id, code, message);
                            write_response(&writer, &response).await;
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("MCP server: stdin read error: {e}");
                    drain(&mut in_flight).await;
                    return Err(e);
                }
            }

            while let Some(result) = in_flight.try_join_next() {
                log_join_result(result);
            }
        }

        drain(&mut in_flight).await;
        Ok(())
    }

    /// Handle a JSON-RPC request and return a response.
    pub async fn handle_request(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        match req.method.as_str() {
            "initialize" => self.handle_initialize(req),
            "ping" => JsonRpcResponse::success(req.id.clone(), serde_json::json!({})),
            "tools/list" => self.handle_tools_list(req),
            "tools/call" => self.handle_tools_call(req).await,
            "resources/list" => self.handle_resources_list(req),
            "resources/read" => self.handle_resources_read(req),
            "prompts/list" => self.handle_prompts_list(req),
            "prompts/get" => self.handle_prompts_get(req),
            _ => JsonRpcResponse::failure(
                req.id.clone(),
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", req.method),
            ),
        }
    }

    fn handle_initialize(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let params: InitializeParams = req
            .params
            .clone()
            .and_then(|p| serde_json::from_value(p).ok())
            .unwrap_or_default();
        if let Some(client) = &params.client_info {
            tracing::info!(
                "MCP server: initialize from {} {} (protocol {})",
                client.name,
                client.version,
                params.protocol_version.as_deref().unwrap_or("unspecified"),
            );
        }
        self.initialized.store(true, Ordering::Release);

        let result = InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ListChangedCapability {
                    list_changed: false,
                }),
                resources: Some(ResourcesCapability {
                    subscribe: false,
                    list_changed: false,
                }),
                prompts: Some(ListChangedCapability {
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "Query and inspect a Salesforce org through the sf CLI. \
                 Read res://query/* resources for ready-made SOQL."
                    .to_string(),
            ),
        };
        to_response(&req.id, result)
    }

    fn handle_tools_list(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let tools = self
            .tools
            .iter()
            .map(|t| McpToolDef {
                name: t.name().to_string(),
                description: Some(t.description().to_string()),
                input_schema: t.input_schema(),
                annotations: Some(McpToolAnnotations {
                    read_only_hint: t.read_only(),
                    destructive_hint: false,
                    idempotent_hint: t.read_only(),
                    open_world_hint: true,
                }),
            })
            .collect();
        to_response(
            &req.id,
            ToolsListResult {
                tools,
                next_cursor: None,
            },
        )
    }

    async fn handle_tools_call(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let params: ToolCallParams = match req.params.clone().map(serde_json::from_value) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::failure(
                    req.id.clone(),
                    error_codes::INVALID_PARAMS,
                    format!("Invalid params: {e}"),
                );
            }
            None => {
                return JsonRpcResponse::failure(
                    req.id.clone(),
                    error_codes::INVALID_PARAMS,
                    "Missing params",
                );
            }
        };

        let Some(tool) = self.tools.iter().find(|t| t.name() == params.name) else {
            return JsonRpcResponse::failure(
                req.id.clone(),
                error_codes::INVALID_PARAMS,
                format!("Unknown tool: {}", params.name),
            );
        };

        let arguments = params.arguments.unwrap_or(Value::Null);
        let result = match tool.call(self.api.as_ref(), arguments).await {
            Ok(value) => ToolCallResult::structured(value),
            Err(e) => {
                tracing::warn!("tool {} failed: {e}", params.name);
                ToolCallResult::error(e.to_string())
            }
        };
        to_response(&req.id, result)
    }

    fn handle_resources_list(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        to_response(
            &req.id,
            ResourcesListResult {
                resources: resources::list_resources(),
                next_cursor: None,
            },
        )
    }

    fn handle_resources_read(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let Some(uri) = req.params.as_ref().and_then(|p| p["uri"].as_str()) else {
            return JsonRpcResponse::failure(
                req.id.clone(),
                error_codes::INVALID_PARAMS,
                "Missing params: uri",
            );
        };

        match resources::resolve_uri(uri) {
            Some(query) => to_response(
                &req.id,
                ResourceReadResult {
                    contents: vec![resources::build_resource_content(uri, query)],
                },
            ),
            None => JsonRpcResponse::failure(
                req.id.clone(),
                error_codes::RESOURCE_NOT_FOUND,
                format!("Unknown resource URI: {uri}"),
            ),
        }
    }

    fn handle_prompts_list(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        to_response(
            &req.id,
            PromptsListResult {
                prompts: prompts::list_prompts(),
                next_cursor: None,
            },
        )
    }

    fn handle_prompts_get(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let Some(name) = req.params.as_ref().and_then(|p| p["name"].as_str()) else {
            return JsonRpcResponse::failure(
                req.id.clone(),
                error_codes::INVALID_PARAMS,
                "Missing params: name",
            );
        };
        let arguments: HashMap<String, String> = req
            .params
            .as_ref()
            .and_then(|p| p.get("arguments"))
            .and_then(|a| serde_json::from_value(a.clone()).ok())
            .unwrap_or_default();

        match prompts::get_prompt(name, &arguments) {
            Some(result) => to_response(&req.id, result),
            None => JsonRpcResponse::failure(
                req.id.clone(),
                error_codes::INVALID_PARAMS,
                format!("Unknown prompt: {name}"),
            ),
        }
    }

    /// Handle a notification (no response).
    fn handle_notification(&self, notif: &JsonRpcNotification) {
        match notif.method.as_str() {
            "notifications/initialized" => {
                tracing::info!("MCP server: client completed initialization");
            }
            "notifications/cancelled" => {
                // In-flight `sf` processes are not interrupted; the late
                // response is ignored by the client.
                tracing::debug!("MCP server: client cancelled a request");
            }
            _ => {
                tracing::debug!("MCP server: unhandled notification: {}", notif.method);
            }
        }
    }
}

fn to_response<T: serde::Serialize>(id: &Value, result: T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id.clone(), value),
        Err(e) => JsonRpcResponse::failure(
            id.clone(),
            error_codes::INTERNAL_ERROR,
            format!("Failed to encode result: {e}"),
        ),
    }
}

/// Write one response line and flush.
async fn write_response(writer: &SharedWriter, response: &JsonRpcResponse) {
    let json = match serde_json::to_string(response) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("MCP server: failed to serialize response: {e}");
            return;
        }
    };
    let mut writer = writer.lock().await;
    let written = async {
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }
    .await;
    if let Err(e) = written {
        tracing::error!("MCP server: failed to write response: {e}");
    }
}

async fn drain(in_flight: &mut JoinSet<()>) {
    while let Some(result) = in_flight.join_next().await {
        log_join_result(result);
    }
}

fn log_join_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        tracing::error!("MCP server: tool task failed: {e}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
