//! JSON-RPC 2.0 message model for the language-server wire protocol.
//!
//! Three shapes travel over the stream:
//! - **Request**: `{"jsonrpc":"2.0","id":N,"method":M,"params":P}`
//! - **Response**: `{"jsonrpc":"2.0","id":N,"result":R}` or `{...,"error":{...}}`
//! - **Notification**: a request without an `id`
//!
//! The untagged union relies on variant order: a request carries both `id` and
//! `method`, a response carries `id` but no `method`, a notification carries
//! `method` but no `id`.

use serde::{Deserialize, Serialize};

/// JSON-RPC error code for an unsupported method, used to answer
/// server-to-client requests we do not implement.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// The literal `"2.0"` version tag. Deserialization rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Version;

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("2.0")
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        if tag == "2.0" {
            Ok(Version)
        } else {
            Err(serde::de::Error::custom(format!(
                "unsupported jsonrpc version {tag:?}"
            )))
        }
    }
}

/// Request identifier. This client allocates positive integers, but a server
/// may address us with string ids, so both shapes must parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    Text(String),
}

impl RequestId {
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: Version,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: Version,
    pub id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: Version,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

/// A decoded wire message. Variant order matters for untagged deserialization;
/// see the module docs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Request(Request),
    Response(Response),
    Notification(Notification),
}

impl Message {
    pub fn request(id: i64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self::Request(Request {
            jsonrpc: Version,
            id: RequestId::Number(id),
            method: method.into(),
            params,
        })
    }

    pub fn notification(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self::Notification(Notification {
            jsonrpc: Version,
            method: method.into(),
            params,
        })
    }

    /// Error response for a server-to-client request we do not handle.
    pub fn method_not_found(id: RequestId, method: &str) -> Self {
        Self::Response(Response {
            jsonrpc: Version,
            id,
            result: None,
            error: Some(ResponseError {
                code: METHOD_NOT_FOUND,
                message: format!("method not supported: {method}"),
                data: None,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_to_jsonrpc_shape() {
        let msg = Message::request(7, "textDocument/documentSymbol", Some(json!({"x": 1})));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "textDocument/documentSymbol",
                "params": {"x": 1},
            })
        );
    }

    #[test]
    fn notification_omits_id_and_empty_params() {
        let msg = Message::notification("initialized", None);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "method": "initialized"}));
    }

    #[test]
    fn response_with_result_parses_as_response() {
        let raw = r#"{"jsonrpc":"2.0","id":3,"result":{"ok":true}}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        match msg {
            Message::Response(resp) => {
                assert_eq!(resp.id, RequestId::Number(3));
                assert_eq!(resp.result, Some(json!({"ok": true})));
                assert!(resp.error.is_none());
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn response_with_error_parses_as_response() {
        let raw = r#"{"jsonrpc":"2.0","id":4,"error":{"code":-32601,"message":"nope"}}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        match msg {
            Message::Response(resp) => {
                let err = resp.error.unwrap();
                assert_eq!(err.code, -32601);
                assert_eq!(err.message, "nope");
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn server_request_is_not_mistaken_for_a_response() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"method":"client/registerCapability","params":{}}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg, Message::Request(_)));
    }

    #[test]
    fn notification_without_id_parses_as_notification() {
        let raw = r#"{"jsonrpc":"2.0","method":"textDocument/publishDiagnostics","params":{"uri":"file:///a.md"}}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        match msg {
            Message::Notification(n) => {
                assert_eq!(n.method, "textDocument/publishDiagnostics");
            }
            other => panic!("expected notification, got {other:?}"),
        }
    }

    #[test]
    fn string_request_id_round_trips() {
        let raw = r#"{"jsonrpc":"2.0","id":"srv-1","method":"workspace/configuration"}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        match &msg {
            Message::Request(req) => assert_eq!(req.id, RequestId::Text("srv-1".into())),
            other => panic!("expected request, got {other:?}"),
        }
        let back = serde_json::to_string(&msg).unwrap();
        let reparsed: Message = serde_json::from_str(&back).unwrap();
        assert_eq!(msg, reparsed);
    }

    #[test]
    fn wrong_version_tag_is_rejected() {
        let raw = r#"{"jsonrpc":"1.0","id":1,"method":"initialize"}"#;
        assert!(serde_json::from_str::<Message>(raw).is_err());
    }
}
