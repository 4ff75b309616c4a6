//! JSON-RPC 2.0 wire types used by the endpoint's dispatch state machine.
//!
//! Incoming message bodies are kept as raw [`serde_json::Value`] objects (the wire
//! data model: "Body is a UTF-8 JSON value, conventionally an object carrying some
//! subset of `{jsonrpc, id, method, params, result, error}`") rather than parsed into a
//! strict request/notification/response enum — callers (Component D's handlers) pick
//! whatever subset of fields they need back out of the object. Only `Id` and the error
//! shape are given real types, since the endpoint itself has to construct and compare
//! them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-RPC request id. `Null` covers the (malformed but observed in the wild)
/// case of a request with no id to echo back.
#[derive(Debug, PartialEq, Eq, Clone, Hash, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Id {
    Null,
    Num(i64),
    Str(String),
}

impl From<Id> for Value {
    fn from(id: Id) -> Value {
        match id {
            Id::Null => Value::Null,
            Id::Num(n) => Value::from(n),
            Id::Str(s) => Value::from(s),
        }
    }
}

/// The six JSON-RPC/LSP error codes this endpoint can emit.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    NotInitialized,
}

impl ErrorCode {
    pub fn code(self) -> i64 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
            ErrorCode::NotInitialized => -32002,
        }
    }
}

/// A JSON-RPC error object, `{code, message}` — error responses here never carry
/// a `data` field, so none is modeled here.
#[derive(Debug, Clone)]
pub struct RpcError {
    pub code: ErrorCode,
    pub message: String,
}

impl RpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        RpcError {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({}): {}", self.code, self.code.code(), self.message)
    }
}

impl std::error::Error for RpcError {}

/// Build an error response body: `{"jsonrpc":"2.0","error":{"code":C,"message":M}}`,
/// with `id` present only when the failing message carried one worth echoing.
pub fn error_response(id: Option<Id>, error: &RpcError) -> Value {
    let mut body = serde_json::json!({
        "jsonrpc": "2.0",
        "error": {
            "code": error.code.code(),
            "message": error.message,
        }
    });
    if let Some(id) = id {
        body["id"] = Value::from(id);
    }
    body
}

/// Extract the `method` field of a parsed message body, if present and a string.
pub fn method_of(value: &Value) -> Option<&str> {
    value.get("method").and_then(Value::as_str)
}

/// Extract the `id` field of a parsed message body, if present.
pub fn id_of(value: &Value) -> Option<Id> {
    match value.get("id")? {
        Value::Null => Some(Id::Null),
        Value::Number(n) => n.as_i64().map(Id::Num),
        Value::String(s) => Some(Id::Str(s.clone())),
        _ => None,
    }
}
