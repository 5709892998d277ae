//! The minimal JSON-RPC message shape the transport needs to understand.
//!
//! The transport does not interpret JSON-RPC semantics beyond what is needed
//! to route a message: whether it carries an `id` (request), an `id` plus a
//! `result`/`error` (response), or neither (notification). Method names and
//! params/result payloads are passed through as opaque [`serde_json::Value`].

use std::fmt;

use serde::{Deserialize, Serialize, de::Error as _};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";
pub const INITIALIZE_METHOD: &str = "initialize";

/// A JSON-RPC request id: either a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

/// A JSON-RPC error object, `{ "code": ..., "message": ..., "data": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// Well-known JSON-RPC error codes used by the transport itself.
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const SERVER_ERROR: i64 = -32000;
    pub const SESSION_NOT_FOUND: i64 = -32001;
}

/// A single JSON-RPC message, classified by shape rather than by direction.
#[derive(Debug, Clone)]
pub enum Message {
    Request {
        id: RequestId,
        method: String,
        params: Option<Value>,
    },
    Response {
        id: RequestId,
        result: Option<Value>,
        error: Option<ErrorObject>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
}

impl Message {
    pub fn request(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Message::Request {
            id,
            method: method.into(),
            params,
        }
    }

    pub fn response_result(id: RequestId, result: Value) -> Self {
        Message::Response {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn response_error(id: RequestId, error: ErrorObject) -> Self {
        Message::Response {
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Message::Notification {
            method: method.into(),
            params,
        }
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Message::Request { id, .. } | Message::Response { id, .. } => Some(id),
            Message::Notification { .. } => None,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, Message::Request { .. })
    }

    pub fn is_response(&self) -> bool {
        matches!(self, Message::Response { .. })
    }

    pub fn is_initialize_request(&self) -> bool {
        matches!(self, Message::Request { method, .. } if method == INITIALIZE_METHOD)
    }
}

/// Wire shape used only for (de)serialization; validated into [`Message`].
#[derive(Debug, Serialize, Deserialize)]
struct RawMessage {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorObject>,
}

#[derive(Debug, thiserror::Error)]
pub enum MessageShapeError {
    #[error("message is missing or has the wrong \"jsonrpc\" version")]
    BadVersion,
    #[error("message has neither a \"method\" nor an \"id\" with \"result\"/\"error\"")]
    Unclassifiable,
}

impl TryFrom<RawMessage> for Message {
    type Error = MessageShapeError;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        if raw.jsonrpc != JSONRPC_VERSION {
            return Err(MessageShapeError::BadVersion);
        }
        match (raw.id, raw.method) {
            (Some(id), Some(method)) => Ok(Message::Request {
                id,
                method,
                params: raw.params,
            }),
            (None, Some(method)) => Ok(Message::Notification {
                method,
                params: raw.params,
            }),
            (Some(id), None) if raw.result.is_some() || raw.error.is_some() => {
                Ok(Message::Response {
                    id,
                    result: raw.result,
                    error: raw.error,
                })
            }
            _ => Err(MessageShapeError::Unclassifiable),
        }
    }
}

impl From<&Message> for RawMessage {
    fn from(message: &Message) -> Self {
        match message {
            Message::Request { id, method, params } => RawMessage {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id: Some(id.clone()),
                method: Some(method.clone()),
                params: params.clone(),
                result: None,
                error: None,
            },
            Message::Response { id, result, error } => RawMessage {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id: Some(id.clone()),
                method: None,
                params: None,
                result: result.clone(),
                error: error.clone(),
            },
            Message::Notification { method, params } => RawMessage {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id: None,
                method: Some(method.clone()),
                params: params.clone(),
                result: None,
                error: None,
            },
        }
    }
}

impl Serialize for Message {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        RawMessage::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawMessage::deserialize(deserializer)?;
        Message::try_from(raw).map_err(D::Error::custom)
    }
}

/// The body of a POST request: either a single message or a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Batch {
    Single(Message),
    Many(Vec<Message>),
}

impl Batch {
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            Batch::Single(message) => vec![message],
            Batch::Many(messages) => messages,
        }
    }
}
