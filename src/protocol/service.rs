//! MCP method routing, shared by every transport.

use serde_json::{Map, Value, json};

use super::frame::Inbound;
use super::jsonrpc::{
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
};
use crate::dispatch::{Outcome, RequestDispatcher, ToolCall, ToolResponse};

/// Newest protocol revision first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

#[derive(Clone, Debug)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub instructions: Option<String>,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: Some(
                "Search and inspect Azure AI Search indexes. Call list_indexes first when the \
                 index name is unknown."
                    .to_string(),
            ),
        }
    }
}

/// Answers MCP requests. Transport agnostic and cheap to share behind an `Arc`.
#[derive(Clone)]
pub struct McpService {
    dispatcher: RequestDispatcher,
    info: ServerInfo,
}

impl McpService {
    pub fn new(dispatcher: RequestDispatcher) -> Self {
        Self {
            dispatcher,
            info: ServerInfo::default(),
        }
    }

    pub fn info(mut self, info: ServerInfo) -> Self {
        self.info = info;
        self
    }

    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    /// Handles any decoded message; only requests produce a response.
    pub async fn handle(&self, inbound: Inbound) -> Option<JsonRpcResponse> {
        match inbound {
            Inbound::Request(request) => Some(self.handle_request(request).await),
            Inbound::Notification(notification) => {
                self.handle_notification(&notification);
                None
            }
            Inbound::Response(_) => {
                tracing::debug!("Ignoring client response");
                None
            }
        }
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        match method.as_str() {
            "initialize" => JsonRpcResponse::success(id, self.initialize(params.as_ref())),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(
                id,
                json!({ "tools": self.dispatcher.registry().definitions() }),
            ),
            "tools/call" => self.call_tool(id, params).await,
            "resources/list" => JsonRpcResponse::success(id, json!({ "resources": [] })),
            "resources/templates/list" => {
                JsonRpcResponse::success(id, json!({ "resourceTemplates": [] }))
            }
            "prompts/list" => JsonRpcResponse::success(id, json!({ "prompts": [] })),
            _ => {
                tracing::debug!(method = %method, "Method not found");
                JsonRpcResponse::method_not_found(id, &method)
            }
        }
    }

    pub fn handle_notification(&self, notification: &JsonRpcNotification) {
        match notification.method.as_str() {
            "notifications/initialized" => tracing::info!("Client initialized"),
            "notifications/cancelled" => {
                // In-flight calls run to completion; the client drops the result.
                tracing::debug!(params = ?notification.params, "Client cancelled a request");
            }
            other => tracing::debug!(method = %other, "Ignoring notification"),
        }
    }

    fn initialize(&self, params: Option<&Value>) -> Value {
        let requested = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str);
        let version = requested
            .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(v))
            .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0]);

        if let Some(client) = params.and_then(|p| p.get("clientInfo")) {
            tracing::info!(client = %client, protocol_version = version, "Initializing session");
        }

        let mut result = json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": { "listChanged": false },
            },
            "serverInfo": {
                "name": self.info.name,
                "version": self.info.version,
            },
        });
        if let Some(instructions) = &self.info.instructions {
            result["instructions"] = json!(instructions);
        }
        result
    }

    async fn call_tool(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let Some(Value::Object(mut params)) = params else {
            return invalid_call(id, "tools/call requires an object with a 'name'");
        };
        let Some(Value::String(name)) = params.remove("name") else {
            return invalid_call(id, "tools/call requires a string 'name'");
        };
        let arguments = match params.remove("arguments") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(arguments)) => arguments,
            Some(_) => return invalid_call(id, "'arguments' must be an object"),
        };

        encode(self.dispatcher.dispatch(ToolCall::new(id, name, arguments)).await)
    }
}

fn invalid_call(id: RequestId, message: &str) -> JsonRpcResponse {
    JsonRpcResponse::invalid_params(id, message)
}

/// Wire form of a tool outcome.
///
/// Success is a `tools/call` result whose text block holds the pretty-printed
/// payload. Failure is a JSON-RPC error whose `data.code` names the failure.
pub fn encode(response: ToolResponse) -> JsonRpcResponse {
    match response.outcome {
        Outcome::Success(payload) => {
            let text = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
            JsonRpcResponse::success(
                response.id,
                json!({
                    "content": [{ "type": "text", "text": text }],
                    "structuredContent": payload,
                    "isError": false,
                }),
            )
        }
        Outcome::Failure(failure) => JsonRpcResponse::error(
            Some(response.id),
            JsonRpcError::new(failure.code.jsonrpc_code(), failure.message)
                .with_data(json!({ "code": failure.code.as_str() })),
        ),
    }
}
