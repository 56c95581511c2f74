use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{NodeError, Result};

pub type NodeId = String;

/// Value carried by `broadcast` messages
pub type BroadcastValue = i64;

/// Envelope exchanged with the harness, one JSON object per line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub src: NodeId,
    pub dest: NodeId,
    pub body: Body,
}

/// Open message body.
///
/// Only the discriminator and the correlation ids are interpreted here; every
/// other field is kept verbatim so that replies derived from a request carry
/// the request's extra fields along.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<u64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Body {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            msg_id: None,
            in_reply_to: None,
            fields: Map::new(),
        }
    }

    /// Copy of this body with the discriminator rewritten
    pub fn with_kind(&self, kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..self.clone()
        }
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn error(code: ErrorCode, text: impl Into<String>) -> Self {
        let text: String = text.into();
        let mut body = Self::new("error");
        body.insert("code", code.as_u64()).insert("text", text);
        body
    }

    pub fn is_error(&self) -> bool {
        self.kind == "error"
    }

    /// Numeric `code` of an error body, if present
    pub fn error_code(&self) -> Option<u64> {
        self.get("code").and_then(Value::as_u64)
    }

    pub fn error_text(&self) -> String {
        self.get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }
}

/// Typed view of the inbound message types this node serves
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Init {
        node_id: NodeId,
        node_ids: Vec<NodeId>,
    },
    Echo,
    Generate,
    Broadcast {
        #[serde(deserialize_with = "deserialize_broadcast_value")]
        message: BroadcastValue,
    },
    Read,
    Topology {
        topology: HashMap<NodeId, Vec<NodeId>>,
    },
}

/// Accepts JSON integers and floats with no fractional part
fn deserialize_broadcast_value<'de, D>(deserializer: D) -> std::result::Result<BroadcastValue, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(value) = number.as_i64() {
        return Ok(value);
    }

    match number.as_f64() {
        Some(value) if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 => {
            Ok(value as i64)
        }
        _ => Err(de::Error::custom(format!("expected an integral number, got {}", number))),
    }
}

const REQUEST_KINDS: &[&str] = &["init", "echo", "generate", "broadcast", "read", "topology"];

impl Request {
    /// Validates a body against the schema of its message type
    pub fn decode(body: &Body) -> Result<Self> {
        if !REQUEST_KINDS.contains(&body.kind.as_str()) {
            return Err(NodeError::NotSupported(body.kind.clone()));
        }

        let value = serde_json::to_value(body)?;
        serde_json::from_value(value)
            .map_err(|e| NodeError::MalformedRequest(format!("{}: {}", body.kind, e)))
    }
}

/// Error codes understood by the cluster harness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Timeout,
    NodeNotFound,
    NotSupported,
    TemporarilyUnavailable,
    MalformedRequest,
    Crash,
    Abort,
    KeyDoesNotExist,
    KeyAlreadyExists,
    PreconditionFailed,
    TxnConflict,
}

impl ErrorCode {
    pub fn as_u64(self) -> u64 {
        match self {
            ErrorCode::Timeout => 0,
            ErrorCode::NodeNotFound => 1,
            ErrorCode::NotSupported => 10,
            ErrorCode::TemporarilyUnavailable => 11,
            ErrorCode::MalformedRequest => 12,
            ErrorCode::Crash => 13,
            ErrorCode::Abort => 14,
            ErrorCode::KeyDoesNotExist => 20,
            ErrorCode::KeyAlreadyExists => 21,
            ErrorCode::PreconditionFailed => 22,
            ErrorCode::TxnConflict => 30,
        }
    }
}
