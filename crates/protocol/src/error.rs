use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RouterError>;

/// Stable error kinds surfaced to callers of `semantic_router`.
///
/// Kinds render SCREAMING_SNAKE so error texts stay greppable across
/// releases; messages are free-form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ConfigError,
    UnknownServer,
    UnknownTool,
    Blocked,
    ServerUnavailable,
    ServerCrashed,
    ProtocolError,
    Timeout,
    Backpressure,
    StorageError,
    UpstreamLlmError,
    InvalidArgument,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigError => "CONFIG_ERROR",
            ErrorKind::UnknownServer => "UNKNOWN_SERVER",
            ErrorKind::UnknownTool => "UNKNOWN_TOOL",
            ErrorKind::Blocked => "BLOCKED",
            ErrorKind::ServerUnavailable => "SERVER_UNAVAILABLE",
            ErrorKind::ServerCrashed => "SERVER_CRASHED",
            ErrorKind::ProtocolError => "PROTOCOL_ERROR",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Backpressure => "BACKPRESSURE",
            ErrorKind::StorageError => "STORAGE_ERROR",
            ErrorKind::UpstreamLlmError => "UPSTREAM_LLM_ERROR",
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error the router reports back to the calling model.
///
/// These never become transport-level failures: the dispatcher renders them
/// as a single `ERROR:<KIND>: <message>` text part in an otherwise
/// well-formed tool result.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct RouterError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RouterError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigError, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// The caller-facing rendering of this error.
    pub fn to_text(&self) -> String {
        format!("ERROR:{}: {}", self.kind, self.message)
    }
}
