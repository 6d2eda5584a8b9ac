//! JSON-RPC 2.0 envelope types and error codes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    #[must_use]
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn err(id: Value, code: i64, message: impl Into<String>) -> Self {
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

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Parses a raw JSON-RPC request body. A malformed body yields a
/// ready-to-send `-32700` response (there is no request `id` to echo back
/// in that case, per JSON-RPC 2.0).
///
/// # Errors
/// Returns the pre-built parse-error response on malformed JSON.
pub fn parse_request(raw: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
    serde_json::from_str(raw).map_err(|e| JsonRpcResponse::err(Value::Null, PARSE_ERROR, format!("invalid JSON-RPC request: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_yields_parse_error() {
        let result = parse_request("{not json");
        assert!(result.is_err());
        let response = result.unwrap_err();
        assert_eq!(response.error.unwrap().code, PARSE_ERROR);
    }

    #[test]
    fn well_formed_request_parses() {
        let request = parse_request(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list","params":{}}"#).unwrap();
        assert_eq!(request.method, "tools/list");
    }
}
