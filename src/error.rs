use thiserror::Error;

use crate::message::ErrorCode;

pub type Result<T> = std::result::Result<T, NodeError>;

/// Errors raised while handling a single message or running the node
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Expected field missing or of the wrong type
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("No handler for message type: {0}")]
    NotSupported(String),

    #[error("Transport closed")]
    TransportClosed,

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl NodeError {
    /// Error code to answer the sender with, if this failure warrants a reply
    pub fn reply_code(&self) -> Option<ErrorCode> {
        match self {
            NodeError::NotSupported(_) => Some(ErrorCode::NotSupported),
            _ => None,
        }
    }

    /// Whether the process can keep serving after this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            NodeError::Io(_) | NodeError::TransportClosed | NodeError::Task(_)
        )
    }
}

/// Failures of a request/response exchange with another node
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("{dest} replied with error {code}: {text}")]
    Remote { dest: String, code: u64, text: String },

    #[error("transport closed before {0} replied")]
    Closed(String),
}
