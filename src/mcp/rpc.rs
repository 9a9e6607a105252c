//! JSON-RPC 2.0 routing shared by the stdio and HTTP transports.

use crate::{
    errors::{ErrorCode, ErrorRecord},
    mcp::{
        host::Host,
        types::{Args, PROTOCOL_VERSION},
    },
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl McpResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0".into(), id, result: Some(result), error: None }
    }

    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self { jsonrpc: "2.0".into(), id, result: None, error: Some(error) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const RESOURCE_NOT_FOUND: i32 = -32002;

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::new(PARSE_ERROR, msg)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, msg)
    }
}

impl From<ErrorRecord> for JsonRpcError {
    fn from(record: ErrorRecord) -> Self {
        let code = match record.code {
            ErrorCode::ResourceNotFound => RESOURCE_NOT_FOUND,
            ErrorCode::Validation => INVALID_PARAMS,
            _ => INTERNAL_ERROR,
        };
        Self { code, message: record.message.clone(), data: Some(record.to_json()) }
    }
}

/// Parses one raw line or body. Malformed input yields a ready response with a null id.
pub fn parse(raw: &str) -> Result<McpRequest, McpResponse> {
    serde_json::from_str::<McpRequest>(raw)
        .map_err(|e| McpResponse::error(Value::Null, JsonRpcError::parse_error(e.to_string())))
}

/// Returns `None` for notifications, which carry no id.
pub async fn handle(host: &Host, req: McpRequest) -> Option<McpResponse> {
    let id = req.id.clone();
    if req.jsonrpc != "2.0" {
        return Some(McpResponse::error(
            id.unwrap_or(Value::Null),
            JsonRpcError::new(INVALID_REQUEST, "jsonrpc must be \"2.0\""),
        ));
    }
    let outcome = route(host, &req.method, req.params.unwrap_or(Value::Null)).await;
    let id = id?;
    Some(match outcome {
        Ok(result) => McpResponse::success(id, result),
        Err(error) => McpResponse::error(id, error),
    })
}

async fn route(host: &Host, method: &str, params: Value) -> Result<Value, JsonRpcError> {
    match method {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": host.info(),
            "capabilities": { "tools": {}, "resources": {}, "prompts": {} },
        })),
        "ping" => Ok(json!({})),
        "notifications/initialized" => Ok(Value::Null),
        "tools/list" => Ok(json!({ "tools": host.list_tools() })),
        "tools/call" => {
            let name = str_param(&params, "name")?;
            let args = match params.get("arguments") {
                None | Some(Value::Null) => Args::new(),
                Some(Value::Object(map)) => map.clone(),
                Some(_) => return Err(JsonRpcError::invalid_params("arguments must be an object")),
            };
            let result = host.invoke(name, args).await;
            serde_json::to_value(result).map_err(|e| JsonRpcError::new(INTERNAL_ERROR, e.to_string()))
        }
        "resources/list" => Ok(json!({ "resources": host.list_resources() })),
        "resources/read" => {
            let uri = str_param(&params, "uri")?;
            let contents = host.read_resource(uri).await?;
            Ok(json!({ "contents": [contents] }))
        }
        "prompts/list" => Ok(json!({ "prompts": host.list_prompts() })),
        "prompts/get" => {
            let name = str_param(&params, "name")?;
            let args: HashMap<String, String> = match params.get("arguments") {
                None | Some(Value::Null) => HashMap::new(),
                Some(v) => serde_json::from_value(v.clone())
                    .map_err(|_| JsonRpcError::invalid_params("arguments must map names to strings"))?,
            };
            let rendered = host.get_prompt(name, &args).await?;
            serde_json::to_value(rendered).map_err(|e| JsonRpcError::new(INTERNAL_ERROR, e.to_string()))
        }
        other => Err(JsonRpcError::method_not_found(other)),
    }
}

/// Tool name, prompt name or resource uri a request is aimed at, for audit lines.
pub fn target_of(req: &McpRequest) -> String {
    let params = req.params.as_ref();
    params
        .and_then(|p| p.get("name").or_else(|| p.get("uri")))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// `(decision, code)` for audit lines. Failed tool calls count as errors even
/// though they travel as successful JSON-RPC results.
pub fn summarize(resp: Option<&McpResponse>) -> (&'static str, String) {
    let Some(resp) = resp else { return ("allow", "Notification".to_string()) };
    if let Some(err) = &resp.error {
        return ("error", err.code.to_string());
    }
    let flagged = resp.result.as_ref().and_then(|r| r.get("isError")).and_then(Value::as_bool).unwrap_or(false);
    if flagged {
        let code = resp
            .result
            .as_ref()
            .and_then(|r| r["content"][0]["text"].as_str())
            .and_then(|t| serde_json::from_str::<Value>(t).ok())
            .and_then(|v| v.get("code").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| "ToolError".to_string());
        return ("error", code);
    }
    ("allow", "OK".to_string())
}

fn str_param<'a>(params: &'a Value, key: &str) -> Result<&'a str, JsonRpcError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| JsonRpcError::invalid_params(format!("missing {key}")))
}
