//! JSON-RPC 2.0 request validation and response shapes.

use serde::Serialize;
use serde_json::Value;

use crate::registry::RawParameterSource;

pub const JSONRPC_VERSION: &str = "2.0";

// ── Error codes ──────────────────────────────────────────────────

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const SERVER_ERROR: i64 = -32000;

fn standard_message(code: i64) -> &'static str {
    match code {
        PARSE_ERROR => "Parse error",
        INVALID_REQUEST => "Invalid Request",
        METHOD_NOT_FOUND => "Method not found",
        INVALID_PARAMS => "Invalid params",
        INTERNAL_ERROR => "Internal error",
        _ => "Server error",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl RpcError {
    fn with_code(code: i64, data: Option<String>) -> Self {
        Self {
            code,
            message: standard_message(code).to_string(),
            data,
        }
    }

    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::with_code(PARSE_ERROR, Some(detail.into()))
    }

    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::with_code(INVALID_REQUEST, Some(detail.into()))
    }

    pub fn method_not_found() -> Self {
        Self::with_code(METHOD_NOT_FOUND, None)
    }

    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::with_code(INVALID_PARAMS, Some(detail.into()))
    }

    pub fn internal_error() -> Self {
        Self::with_code(INTERNAL_ERROR, None)
    }

    pub fn server_error(detail: impl Into<String>) -> Self {
        Self::with_code(SERVER_ERROR, Some(detail.into()))
    }
}

// ── Response ─────────────────────────────────────────────────────

/// Exactly one of `result` / `error` is present on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(Value),
    Error(RpcError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub id: Value,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            outcome: Outcome::Result(result),
            id,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            outcome: Outcome::Error(error),
            id,
        }
    }

    pub fn error(&self) -> Option<&RpcError> {
        match &self.outcome {
            Outcome::Error(error) => Some(error),
            Outcome::Result(_) => None,
        }
    }
}

// ── Request ──────────────────────────────────────────────────────

/// A request whose envelope has been validated. `params` is still raw:
/// its shape is checked only once the method is known to exist.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub method: String,
    /// `None` when absent or `null`.
    pub params: Option<Value>,
    pub id: Value,
}

/// Validate the envelope of one decoded request body.
pub fn parse_request(body: Value) -> Result<RpcRequest, RpcResponse> {
    let mut object = match body {
        Value::Object(object) => object,
        Value::Array(_) => return Err(invalid(Value::Null, "batch requests not supported")),
        _ => return Err(invalid(Value::Null, "request must be a JSON object")),
    };

    let id = match object.remove("id") {
        None => Value::Null,
        Some(id @ (Value::Null | Value::String(_) | Value::Number(_))) => id,
        Some(_) => return Err(invalid(Value::Null, "id must be a string, a number or null")),
    };

    if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(invalid(id, "jsonrpc must be \"2.0\""));
    }

    let method = match object.remove("method") {
        Some(Value::String(method)) => method,
        _ => return Err(invalid(id, "method must be a string")),
    };

    let params = object.remove("params").filter(|p| !p.is_null());
    Ok(RpcRequest { method, params, id })
}

fn invalid(id: Value, detail: &str) -> RpcResponse {
    RpcResponse::failure(id, RpcError::invalid_request(detail))
}

/// Map validated `params` onto a materializer source: absent is empty,
/// an array is positional, an object is named.
pub fn parameter_source(params: Option<Value>) -> Result<RawParameterSource, RpcError> {
    match params {
        None => Ok(RawParameterSource::Empty),
        Some(Value::Array(items)) => Ok(RawParameterSource::PositionalValues(items)),
        Some(Value::Object(map)) => Ok(RawParameterSource::NamedValues(map)),
        Some(_) => Err(RpcError::invalid_params("params must be an array or an object")),
    }
}
