//! JSON-RPC 2.0 message types.
//!
//! Outbound requests are built from borrowed parts; inbound data frames are
//! classified into responses (matched by id) and requests from the gateway
//! (push notifications, keyed by method name).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::JsonCodec;
use crate::error::{EdgeError, Result};

/// JSON-RPC protocol version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC "method not found" error code.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Outbound request.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a Value,
    id: u64,
}

impl<'a> RpcRequest<'a> {
    /// Create a request with the given id.
    pub fn new(id: u64, method: &'a str, params: &'a Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
            id,
        }
    }
}

/// Error object carried in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    /// Error code.
    pub code: i64,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Optional extra data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Outbound response to a gateway request.
#[derive(Debug, Serialize)]
pub struct RpcResponse<'a> {
    jsonrpc: &'static str,
    id: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcErrorObject>,
}

impl<'a> RpcResponse<'a> {
    /// Successful response.
    pub fn ok(id: &'a Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response.
    pub fn error(id: &'a Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(RpcErrorObject {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// Wire shape shared by every inbound message.
#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// Classified inbound message.
#[derive(Debug)]
pub enum Inbound {
    /// Response to one of our calls.
    Response {
        /// Id of the call being answered; `None` if not a u64.
        id: Option<u64>,
        /// Result (`result` or `data`) or the gateway's error.
        outcome: Result<Value>,
    },
    /// Request or notification from the gateway.
    Request {
        /// Present when the gateway expects an answer.
        id: Option<Value>,
        /// Method name.
        method: String,
        /// Parameters.
        params: Value,
    },
}

impl Inbound {
    /// Parse and classify a data frame payload.
    ///
    /// # Errors
    ///
    /// Returns `Json` for malformed text, `ProtocolViolation` for a message
    /// that is neither a request nor a response.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let raw: RawMessage = JsonCodec::decode(bytes)?;

        if let Some(method) = raw.method {
            return Ok(Inbound::Request {
                id: raw.id,
                method,
                params: raw.params,
            });
        }

        let id = match raw.id {
            Some(id) => id.as_u64(),
            None => {
                return Err(EdgeError::ProtocolViolation(
                    "message has neither method nor id".into(),
                ))
            }
        };

        let outcome = match raw.error {
            Some(err) => Err(EdgeError::Rpc {
                code: err.code,
                message: err.message,
            }),
            None => Ok(raw.result.or(raw.data).unwrap_or(Value::Null)),
        };

        Ok(Inbound::Response { id, outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let params = json!({"name": "bridge"});
        let req = RpcRequest::new(1, "protocol_translator_register", &params);
        let text = serde_json::to_string(&req).unwrap();
        assert_eq!(
            text,
            r#"{"jsonrpc":"2.0","method":"protocol_translator_register","params":{"name":"bridge"},"id":1}"#
        );
    }

    #[test]
    fn test_response_serialization() {
        let id = json!(7);
        let ok = serde_json::to_value(RpcResponse::ok(&id, json!("ok"))).unwrap();
        assert_eq!(ok, json!({"jsonrpc": "2.0", "id": 7, "result": "ok"}));

        let err = serde_json::to_value(RpcResponse::error(&id, METHOD_NOT_FOUND, "nope")).unwrap();
        assert_eq!(err["error"]["code"], -32601);
        assert!(err.get("result").is_none());
    }

    #[test]
    fn test_parse_response_with_result() {
        let inbound = Inbound::parse(br#"{"jsonrpc":"2.0","id":3,"result":"ok"}"#).unwrap();
        match inbound {
            Inbound::Response { id, outcome } => {
                assert_eq!(id, Some(3));
                assert_eq!(outcome.unwrap(), json!("ok"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_response_with_data() {
        let inbound = Inbound::parse(br#"{"jsonrpc":"2.0","id":4,"data":{"x":1}}"#).unwrap();
        match inbound {
            Inbound::Response { id, outcome } => {
                assert_eq!(id, Some(4));
                assert_eq!(outcome.unwrap(), json!({"x": 1}));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_response() {
        let inbound = Inbound::parse(
            br#"{"jsonrpc":"2.0","id":5,"error":{"code":-30000,"message":"Protocol translator not registered"}}"#,
        )
        .unwrap();
        match inbound {
            Inbound::Response { id, outcome } => {
                assert_eq!(id, Some(5));
                assert!(matches!(outcome, Err(EdgeError::Rpc { code: -30000, .. })));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_request() {
        let inbound =
            Inbound::parse(br#"{"jsonrpc":"2.0","id":"x1","method":"write","params":{}}"#)
                .unwrap();
        match inbound {
            Inbound::Request { id, method, .. } => {
                assert_eq!(id, Some(json!("x1")));
                assert_eq!(method, "write");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_non_numeric_response_id() {
        let inbound = Inbound::parse(br#"{"jsonrpc":"2.0","id":"abc","result":1}"#).unwrap();
        assert!(matches!(inbound, Inbound::Response { id: None, .. }));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Inbound::parse(br#"{"jsonrpc":"2.0"}"#),
            Err(EdgeError::ProtocolViolation(_))
        ));
        assert!(matches!(Inbound::parse(b"not json"), Err(EdgeError::Json(_))));
    }
}
