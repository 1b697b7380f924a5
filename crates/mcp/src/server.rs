use std::sync::atomic::{AtomicBool, Ordering};

use polaris_mcp_core::{ToolError, ToolExecutionResult};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::tools::{CallError, ToolRegistry};
use crate::transport::{
    JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    METHOD_NOT_FOUND, PARSE_ERROR,
};

const SERVER_NAME: &str = "polaris-mcp";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Handles one JSON-RPC message at a time. Shared across worker threads, so
/// concurrent tool calls go through one registry and one token cache.
pub struct McpServer {
    registry: ToolRegistry,
    initialized: AtomicBool,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Returns the serialized response, or `None` for notifications.
    pub fn handle_request(&self, input: &str) -> Option<String> {
        let value: Value = match serde_json::from_str(input) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "unparseable message");
                return Some(encode(&JsonRpcResponse::error(None, PARSE_ERROR, "Parse error")));
            }
        };

        let id = value.get("id").cloned();
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                return Some(encode(&JsonRpcResponse::error(
                    id,
                    INVALID_REQUEST,
                    format!("Invalid request: {}", e),
                )))
            }
        };
        if request.jsonrpc.as_deref().is_some_and(|v| v != "2.0") {
            return Some(encode(&JsonRpcResponse::error(
                request.id,
                INVALID_REQUEST,
                "Invalid request: jsonrpc must be \"2.0\"",
            )));
        }

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(&request),
            "notifications/initialized" | "initialized" => {
                self.initialized.store(true, Ordering::Release);
                return None;
            }
            "tools/list" => self.handle_tools_list(&request),
            "tools/call" => self.handle_tools_call(&request),
            "ping" => JsonRpcResponse::success(request.id.clone(), json!({})),
            _ => JsonRpcResponse::error(
                request.id.clone(),
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        };

        if request.is_notification() {
            return None;
        }
        Some(encode(&response))
    }

    fn handle_initialize(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let client = request
            .params
            .as_ref()
            .and_then(|p| p.get("clientInfo"))
            .and_then(|c| c.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(client, "initializing session");

        JsonRpcResponse::success(
            request.id.clone(),
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": SERVER_VERSION
                }
            }),
        )
    }

    fn handle_tools_list(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let tools = self.registry.definitions();
        JsonRpcResponse::success(request.id.clone(), json!({ "tools": tools }))
    }

    fn handle_tools_call(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let params = match &request.params {
            Some(p) => p,
            None => {
                return JsonRpcResponse::error(request.id.clone(), INVALID_PARAMS, "Missing params")
            }
        };

        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return JsonRpcResponse::error(request.id.clone(), INVALID_PARAMS, "Missing tool name");
        };

        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => json!({}),
            Some(args) => args.clone(),
        };

        match self.registry.call(name, &arguments) {
            Ok(result) => JsonRpcResponse::success(request.id.clone(), render_result(&result)),
            Err(err) => call_error(request.id.clone(), name, err),
        }
    }
}

fn render_result(result: &ToolExecutionResult) -> Value {
    let mut structured = json!({ "isError": result.is_error() });
    if let Some(meta) = result.metadata() {
        structured["meta"] = meta.clone();
    }
    json!({
        "content": [{ "type": "text", "text": result.text() }],
        "isError": result.is_error(),
        "structuredContent": structured,
    })
}

fn call_error(id: Option<Value>, tool: &str, err: CallError) -> JsonRpcResponse {
    match err {
        CallError::UnknownTool(name) => {
            JsonRpcResponse::error(id, INVALID_PARAMS, format!("Unknown tool: {}", name))
        }
        CallError::Tool(ToolError::Validation(invalid)) => {
            debug!(tool, field = invalid.field(), "rejected arguments");
            JsonRpcResponse::error_with_data(
                id,
                INVALID_PARAMS,
                invalid.message(),
                Some(json!({ "field": invalid.field() })),
            )
        }
        CallError::Tool(other) => {
            warn!(tool, error = %other, "tool call failed");
            JsonRpcResponse::error(id, INTERNAL_ERROR, other.to_string())
        }
    }
}

fn encode(response: &JsonRpcResponse) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        format!(
            r#"{{"jsonrpc":"2.0","id":null,"error":{{"code":{},"message":"failed to encode response: {}"}}}}"#,
            INTERNAL_ERROR,
            e.to_string().replace('"', "'")
        )
    })
}
