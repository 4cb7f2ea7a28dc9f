//! JSON-RPC envelope parsing and error shaping.
//!
//! The gateway never interprets JSON-RPC payloads beyond what is needed to
//! route and error-shape them: the body is otherwise forwarded verbatim.

use serde_json::{json, Value};

/// A parsed downstream request body.
pub enum RpcBody {
    /// A single JSON-RPC request object.
    Single(Value),
    /// A batch of JSON-RPC request objects.
    Batch(Vec<Value>),
    /// The body was not valid JSON (or was present but not an object/array).
    Malformed,
}

/// Parse a raw request body. An empty body parses as a single `null` value,
/// matching the upstream's own tolerance for empty probes.
pub fn parse_body(bytes: &[u8]) -> RpcBody {
    if bytes.is_empty() {
        return RpcBody::Single(Value::Null);
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Array(items)) => RpcBody::Batch(items),
        Ok(value) => RpcBody::Single(value),
        Err(_) => RpcBody::Malformed,
    }
}

/// Extract the `method` string from each entry. Non-string or missing
/// `method` fields are silently skipped; they do not void extraction for
/// sibling entries.
pub fn extract_methods(body: &RpcBody) -> Vec<String> {
    match body {
        RpcBody::Single(value) => method_of(value).into_iter().collect(),
        RpcBody::Batch(items) => items.iter().filter_map(method_of).collect(),
        RpcBody::Malformed => Vec::new(),
    }
}

fn method_of(value: &Value) -> Option<String> {
    value.get("method")?.as_str().map(str::to_string)
}

/// Error code for malformed JSON.
pub const PARSE_ERROR: i64 = -32700;
/// Error code for a request shape that is not a valid JSON-RPC envelope.
pub const INVALID_REQUEST: i64 = -32600;
/// Error code for a method rejected by the global allowlist or route table.
pub const METHOD_NOT_ALLOWED: i64 = -32601;

fn id_of(value: &Value) -> Value {
    value.get("id").cloned().unwrap_or(Value::Null)
}

fn error_object(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message.into(),
        }
    })
}

/// Shape a gateway-originated JSON-RPC error for the given body: a single
/// object for a single request, or one error object per batch entry
/// (carrying that entry's `id` when present).
pub fn shape_error(body: &RpcBody, code: i64, message: impl Into<String> + Clone) -> Value {
    match body {
        RpcBody::Single(value) => error_object(id_of(value), code, message),
        RpcBody::Batch(items) => Value::Array(
            items
                .iter()
                .map(|item| error_object(id_of(item), code, message.clone()))
                .collect(),
        ),
        RpcBody::Malformed => error_object(Value::Null, code, message),
    }
}
