use router_mcp_client::McpClientError;
use router_protocol::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SupervisorError>;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("unknown server: '{0}'")]
    UnknownServer(String),

    #[error(transparent)]
    Session(#[from] McpClientError),
}

impl SupervisorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SupervisorError::UnknownServer(_) => ErrorKind::UnknownServer,
            SupervisorError::Session(e) => e.kind(),
        }
    }
}
