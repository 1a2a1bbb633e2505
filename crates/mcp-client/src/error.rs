use router_protocol::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, McpClientError>;

#[derive(Error, Debug)]
pub enum McpClientError {
    #[error("failed to spawn server '{name}': {reason}")]
    SpawnFailed { name: String, reason: String },

    #[error("server '{name}' did not become ready within {timeout_seconds}s")]
    StartupTimeout { name: String, timeout_seconds: u64 },

    #[error("server '{name}' handshake failed: {reason}")]
    InitFailed { name: String, reason: String },

    #[error("server '{name}' crashed")]
    Crashed { name: String },

    #[error("protocol error on server '{name}': {reason}")]
    Protocol { name: String, reason: String },

    #[error("tool '{tool}' on server '{name}' timed out after {timeout_seconds}s")]
    CallTimeout {
        name: String,
        tool: String,
        timeout_seconds: u64,
    },
}

impl McpClientError {
    /// The router-facing error kind for this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            McpClientError::SpawnFailed { .. }
            | McpClientError::StartupTimeout { .. }
            | McpClientError::InitFailed { .. } => ErrorKind::ServerUnavailable,
            McpClientError::Crashed { .. } => ErrorKind::ServerCrashed,
            McpClientError::Protocol { .. } => ErrorKind::ProtocolError,
            McpClientError::CallTimeout { .. } => ErrorKind::Timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_router_kinds() {
        let unavailable = McpClientError::StartupTimeout {
            name: "fs".into(),
            timeout_seconds: 30,
        };
        assert_eq!(unavailable.kind(), ErrorKind::ServerUnavailable);
        assert_eq!(
            McpClientError::Crashed { name: "fs".into() }.kind(),
            ErrorKind::ServerCrashed
        );
        assert_eq!(
            McpClientError::CallTimeout {
                name: "fs".into(),
                tool: "read_file".into(),
                timeout_seconds: 120,
            }
            .kind(),
            ErrorKind::Timeout
        );
    }
}
