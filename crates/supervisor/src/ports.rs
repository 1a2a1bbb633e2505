use async_trait::async_trait;
use router_mcp_client::{McpClientError, McpSession, TerminationCallback};
use router_protocol::{RawToolResult, ServerConfig, ToolSpec};
use std::sync::Arc;
use std::time::Duration;

/// What the supervisor needs from a live session.
#[async_trait]
pub trait ToolSession: Send + Sync {
    async fn list_tools(&self, timeout: Duration) -> Result<Vec<ToolSpec>, McpClientError>;

    async fn call_tool(
        &self,
        tool: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
        timeout: Duration,
    ) -> Result<RawToolResult, McpClientError>;

    async fn shutdown(&self);
}

/// Creates sessions. The supervisor passes its termination callback here so
/// crash notification is wired up at construction time.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn start(
        &self,
        config: &ServerConfig,
        on_terminated: TerminationCallback,
    ) -> Result<Arc<dyn ToolSession>, McpClientError>;
}

#[async_trait]
impl ToolSession for McpSession {
    async fn list_tools(&self, timeout: Duration) -> Result<Vec<ToolSpec>, McpClientError> {
        McpSession::list_tools(self, timeout).await
    }

    async fn call_tool(
        &self,
        tool: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
        timeout: Duration,
    ) -> Result<RawToolResult, McpClientError> {
        McpSession::call_tool(self, tool, arguments, timeout).await
    }

    async fn shutdown(&self) {
        McpSession::shutdown(self).await;
    }
}

/// The production factory: spawns real child processes via rmcp.
#[derive(Debug, Default, Clone, Copy)]
pub struct RmcpSessionFactory;

#[async_trait]
impl SessionFactory for RmcpSessionFactory {
    async fn start(
        &self,
        config: &ServerConfig,
        on_terminated: TerminationCallback,
    ) -> Result<Arc<dyn ToolSession>, McpClientError> {
        let session = McpSession::start(config, Some(on_terminated)).await?;
        Ok(Arc::new(session))
    }
}
