//! JSON-RPC envelope handling: parse, resolve the target stream, dispatch,
//! then mirror the reply onto the stream.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::protocol::{
    capabilities, JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS, INVALID_REQUEST,
    JSONRPC_VERSION, METHOD_NOT_FOUND, PARSE_ERROR, SERVER_ERROR,
};
use crate::redact::sanitize_sensitive;
use crate::refine::Refiner;
use crate::registry::{ConnectionHandle, ConnectionRegistry};

pub const REFINE_TOOL: &str = "refine_text";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RpcMethod {
    Initialize,
    CreateMessage,
    ToolsList,
    ToolsCall,
    Ping,
    Initialized,
}

impl RpcMethod {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "initialize" => Some(Self::Initialize),
            "sampling/createMessage" => Some(Self::CreateMessage),
            "tools/list" => Some(Self::ToolsList),
            "tools/call" => Some(Self::ToolsCall),
            "ping" => Some(Self::Ping),
            "notifications/initialized" => Some(Self::Initialized),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: ConnectionRegistry,
    refiner: Arc<Refiner>,
}

impl Dispatcher {
    pub const fn new(registry: ConnectionRegistry, refiner: Arc<Refiner>) -> Self {
        Self { registry, refiner }
    }

    pub const fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn refiner(&self) -> &Refiner {
        &self.refiner
    }

    /// Handles one raw envelope. The returned reply is also pushed onto the
    /// resolved stream when resolution succeeded and the envelope carried an
    /// `id`; notifications get no stream event.
    pub async fn handle(&self, raw: &[u8], client_id: Option<&str>) -> JsonRpcResponse {
        let request = match serde_json::from_slice::<JsonRpcRequest>(raw) {
            Ok(request) => request,
            Err(err) => {
                tracing::debug!(error = %err, "rejecting unparsable envelope");
                return JsonRpcResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("parse error: {err}"),
                );
            }
        };
        let id = request.id.clone().unwrap_or(Value::Null);
        if request.jsonrpc != JSONRPC_VERSION {
            return JsonRpcResponse::error(
                id,
                INVALID_REQUEST,
                format!("unsupported jsonrpc version: {}", request.jsonrpc),
            );
        }

        let connection = match self.registry.resolve(client_id) {
            Ok(connection) => connection,
            Err(err) => {
                tracing::debug!(error = %err, method = %request.method, "connection resolution failed");
                return JsonRpcResponse::error(id, SERVER_ERROR, err.to_string())
                    .with_error_data(json!({ "reason": err.reason() }));
            }
        };

        let is_notification = request.id.is_none();
        let response = self.dispatch(request, id).await;
        if is_notification {
            tracing::debug!(client_id = %connection.id(), "notification handled; nothing pushed");
        } else {
            push_reply(&connection, &response);
        }
        response
    }

    async fn dispatch(&self, request: JsonRpcRequest, id: Value) -> JsonRpcResponse {
        let Some(method) = RpcMethod::parse(&request.method) else {
            return JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("method not found: {}", request.method),
            );
        };
        match method {
            RpcMethod::Initialize => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": capabilities(),
                    "serverInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            ),
            RpcMethod::CreateMessage => {
                let Some(text) = create_message_text(&request.params) else {
                    return JsonRpcResponse::error(id, INVALID_PARAMS, "missing params.text");
                };
                self.refine_reply(id, text, |refined| {
                    json!({
                        "items": [{ "label": refined, "kind": 1, "detail": "Refined text" }]
                    })
                })
                .await
            }
            RpcMethod::ToolsList => JsonRpcResponse::success(id, tools_list_result()),
            RpcMethod::ToolsCall => self.handle_tools_call(id, &request.params).await,
            RpcMethod::Ping | RpcMethod::Initialized => JsonRpcResponse::success(id, json!({})),
        }
    }

    async fn handle_tools_call(&self, id: Value, params: &Value) -> JsonRpcResponse {
        let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
        if name != REFINE_TOOL {
            return JsonRpcResponse::error(id, INVALID_PARAMS, format!("unknown tool: {name}"));
        }
        let Some(text) = params
            .get("arguments")
            .and_then(|a| a.get("text"))
            .and_then(Value::as_str)
        else {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "missing arguments.text");
        };
        self.refine_reply(id, text, |refined| {
            json!({ "content": [{ "type": "text", "text": refined }] })
        })
        .await
    }

    async fn refine_reply(
        &self,
        id: Value,
        text: &str,
        shape: impl FnOnce(&str) -> Value,
    ) -> JsonRpcResponse {
        match self.refiner.refine(text).await {
            Ok(Some(refinement)) => JsonRpcResponse::success(id, shape(&refinement.text)),
            Ok(None) => JsonRpcResponse::success(id, Value::Null),
            Err(err) => JsonRpcResponse::error(
                id,
                SERVER_ERROR,
                format!("refinement failed: {}", sanitize_sensitive(&err.to_string())),
            ),
        }
    }
}

/// `params.text`, or the text content of the last sampling message.
fn create_message_text(params: &Value) -> Option<&str> {
    if let Some(text) = params.get("text").and_then(Value::as_str) {
        return Some(text);
    }
    params
        .get("messages")
        .and_then(Value::as_array)
        .and_then(|messages| messages.last())
        .and_then(|message| message.get("content"))
        .and_then(|content| content.get("text"))
        .and_then(Value::as_str)
}

fn tools_list_result() -> Value {
    json!({
        "tools": [{
            "name": REFINE_TOOL,
            "description": "Rewrite Japanese text following the golden rules and the editing patterns that best match it.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "text": { "type": "string", "description": "Text to refine" }
                },
                "required": ["text"]
            }
        }]
    })
}

fn push_reply(connection: &ConnectionHandle, response: &JsonRpcResponse) {
    let event = match serde_json::to_value(response) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(client_id = %connection.id(), error = %err, "reply not serializable");
            return;
        }
    };
    if let Err(err) = connection.push(event) {
        tracing::warn!(client_id = %connection.id(), error = %err, "dropping stream event");
    }
}
