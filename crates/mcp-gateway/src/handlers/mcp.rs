//! Tool-calling endpoint.
//!
//! Accepts JSON-RPC 2.0 requests on `POST /mcp`:
//!
//! - `initialize` - server identity and capabilities
//! - `ping` - returns `{}`
//! - `tools/list` - the invoker's tool catalog as `{tools: [...]}`
//! - `tools/call` - `params: {name, arguments}`, forwarded to the tool invoker
//!
//! Notifications (requests without an `id` member) are acknowledged with 202
//! and no body; `"id": null` is a request and is answered with a null id. Protocol-level failures are JSON-RPC error objects with HTTP 200,
//! except unparsable bodies which get HTTP 400.

use crate::auth::Claims;
use crate::routes::AppState;
use crate::tools::{ToolContext, ToolError};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

/// MCP protocol revision reported by `initialize`.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const TOOL_ERROR: i64 = -32000;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// `None` only when the member is absent; a present null is `Some(Null)`.
    #[serde(default, deserialize_with = "present_id")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

fn present_id<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

/// Handler for POST /mcp
///
/// `Claims` are present when the auth middleware ran; in open mode the tool
/// context carries no caller identity.
#[instrument(skip_all, name = "gw.mcp")]
pub async fn mcp_handler(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<Claims>>,
    payload: Result<Json<JsonRpcRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(target: "gw.handlers.mcp", error = %rejection, "Unparsable JSON-RPC body");
            return (
                StatusCode::BAD_REQUEST,
                Json(JsonRpcResponse::failure(
                    Value::Null,
                    PARSE_ERROR,
                    "Parse error",
                )),
            )
                .into_response();
        }
    };

    let Some(id) = request.id.clone() else {
        // Notification: no response body
        tracing::debug!(target: "gw.handlers.mcp", method = %request.method, "Notification received");
        return StatusCode::ACCEPTED.into_response();
    };

    if request.jsonrpc != "2.0" {
        return Json(JsonRpcResponse::failure(
            id,
            INVALID_REQUEST,
            "Invalid Request",
        ))
        .into_response();
    }

    let ctx = ToolContext::new(claims.map(|Extension(claims)| claims));

    let response = match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(id, initialize_result(&state)),
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => list_tools(&state, &ctx, id).await,
        "tools/call" => call_tool(&state, &ctx, id, request.params).await,
        other => {
            tracing::debug!(target: "gw.handlers.mcp", method = %other, "Unknown method");
            JsonRpcResponse::failure(id, METHOD_NOT_FOUND, "Method not found")
        }
    };

    Json(response).into_response()
}

fn initialize_result(state: &AppState) -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": state.config.resource_name,
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

async fn list_tools(state: &AppState, ctx: &ToolContext, id: Value) -> JsonRpcResponse {
    match state.tool_invoker.list(ctx).await {
        Ok(tools) => JsonRpcResponse::success(id, json!({ "tools": tools })),
        Err(e) => {
            tracing::warn!(target: "gw.handlers.mcp", error = %e, "Tool listing failed");
            JsonRpcResponse::failure(id, TOOL_ERROR, e.client_message())
        }
    }
}

async fn call_tool(
    state: &AppState,
    ctx: &ToolContext,
    id: Value,
    params: Option<Value>,
) -> JsonRpcResponse {
    let params: ToolCallParams = match params.map(serde_json::from_value) {
        Some(Ok(params)) => params,
        _ => return JsonRpcResponse::failure(id, INVALID_PARAMS, "Invalid params"),
    };

    let arguments = params.arguments.unwrap_or_else(|| json!({}));

    tracing::debug!(target: "gw.handlers.mcp", tool = %params.name, "Invoking tool");

    match state
        .tool_invoker
        .invoke(ctx, &params.name, arguments)
        .await
    {
        Ok(value) => JsonRpcResponse::success(id, tool_result(value)),
        Err(e) => {
            if let ToolError::Upstream(detail) = &e {
                tracing::warn!(target: "gw.handlers.mcp", tool = %params.name, error = %detail, "Tool call failed");
            }
            JsonRpcResponse::failure(id, TOOL_ERROR, e.client_message())
        }
    }
}

/// Wrap an invoker's JSON in the MCP tool result shape.
fn tool_result(value: Value) -> Value {
    json!({
        "content": [{ "type": "text", "text": value.to_string() }],
        "structuredContent": value,
        "isError": false,
    })
}
