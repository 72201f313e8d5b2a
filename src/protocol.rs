// ---------------------------------------------------------------------------
// JSON-RPC 2.0 message shapes
// ---------------------------------------------------------------------------
//
// Plain serde structs for request, response, error body, and notification,
// plus the standard JSON-RPC error codes and one addition: a `SIM_ERROR`
// application code for engine-level failures.
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const SIM_ERROR: i64 = -32000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
	pub jsonrpc: String,
	pub method: String,
	#[serde(default)]
	pub params: Value,
	/// Absent for notifications.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorBody {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
	pub jsonrpc: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<JsonRpcErrorBody>,
	pub id: Value,
}

impl JsonRpcResponse {
	pub fn ok(id: Value, result: Value) -> Self {
		Self {
			jsonrpc: "2.0".to_string(),
			result: Some(result),
			error: None,
			id,
		}
	}

	pub fn err(id: Value, code: i64, message: String, data: Option<Value>) -> Self {
		Self {
			jsonrpc: "2.0".to_string(),
			result: None,
			error: Some(JsonRpcErrorBody { code, message, data }),
			id,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
	pub jsonrpc: String,
	pub method: String,
	#[serde(default)]
	pub params: Value,
}

/// Translate an engine failure into a JSON-RPC error body, carrying the
/// engine's own machine-readable `code()` tag in `data`.
pub fn engine_error_body(err: &crate::error::EngineError) -> JsonRpcErrorBody {
	JsonRpcErrorBody {
		code: SIM_ERROR,
		message: err.to_string(),
		data: Some(err.to_json_rpc_data()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn request_round_trips_through_json() {
		let raw = r#"{"jsonrpc":"2.0","method":"query","params":{"q":"hello"},"id":1}"#;
		let req: JsonRpcRequest = serde_json::from_str(raw).unwrap();
		assert_eq!(req.method, "query");
		assert_eq!(req.id, Some(Value::from(1)));
	}

	#[test]
	fn notification_has_no_id() {
		let raw = r#"{"jsonrpc":"2.0","method":"ping","params":null}"#;
		let req: JsonRpcRequest = serde_json::from_str(raw).unwrap();
		assert!(req.id.is_none());
	}

	#[test]
	fn response_serializes_without_the_unused_variant() {
		let resp = JsonRpcResponse::ok(Value::from(1), serde_json::json!({"hits": []}));
		let s = serde_json::to_string(&resp).unwrap();
		assert!(!s.contains("error"));
	}
}
