use crate::error::{McpClientError, Result};
use rmcp::model::{CallToolRequestParam, CallToolResult, RawContent};
use rmcp::service::{Peer, RoleClient, ServiceExt};
use rmcp::service::RunningServiceCancellationToken;
use rmcp::transport::TokioChildProcess;
use router_protocol::{RawPart, RawToolResult, ServerConfig, ToolSpec};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;

/// Callback port invoked when a session terminates without an explicit
/// shutdown. Registered by the supervisor at construction time; the session
/// never holds a pointer back into supervisor state.
pub type TerminationCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// A live MCP session over a spawned child process.
pub struct McpSession {
    name: String,
    peer: Peer<RoleClient>,
    cancel: tokio::sync::Mutex<Option<RunningServiceCancellationToken>>,
    shutting_down: Arc<AtomicBool>,
    terminated: Arc<AtomicBool>,
    monitor: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl McpSession {
    /// Spawn the child process and complete the MCP handshake.
    ///
    /// The handshake must finish within `config.timeout_seconds`, otherwise
    /// the child is torn down and the start fails as unavailable.
    pub async fn start(
        config: &ServerConfig,
        on_terminated: Option<TerminationCallback>,
    ) -> Result<Self> {
        let name = config.name.clone();

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);
        cmd.envs(&config.env);

        let transport = TokioChildProcess::new(cmd).map_err(|e| McpClientError::SpawnFailed {
            name: name.clone(),
            reason: e.to_string(),
        })?;

        let service = tokio::time::timeout(
            Duration::from_secs(config.timeout_seconds),
            ().serve(transport),
        )
        .await
        .map_err(|_| McpClientError::StartupTimeout {
            name: name.clone(),
            timeout_seconds: config.timeout_seconds,
        })?
        .map_err(|e| McpClientError::InitFailed {
            name: name.clone(),
            reason: e.to_string(),
        })?;

        log::info!("server '{name}' session ready");

        let peer = service.peer().clone();
        let cancel = service.cancellation_token();
        let shutting_down = Arc::new(AtomicBool::new(false));
        let terminated = Arc::new(AtomicBool::new(false));

        // The monitor owns the running service. It resolves when the child
        // exits or the session is cancelled, and reports crashes upward.
        let monitor = {
            let name = name.clone();
            let shutting_down = shutting_down.clone();
            let terminated = terminated.clone();
            tokio::spawn(async move {
                let quit = service.waiting().await;
                terminated.store(true, Ordering::SeqCst);
                if shutting_down.load(Ordering::SeqCst) {
                    log::info!("server '{name}' session closed");
                    return;
                }
                log::warn!("server '{name}' session terminated unexpectedly: {quit:?}");
                if let Some(callback) = on_terminated {
                    callback(&name);
                }
            })
        };

        Ok(Self {
            name,
            peer,
            cancel: tokio::sync::Mutex::new(Some(cancel)),
            shutting_down,
            terminated,
            monitor: tokio::sync::Mutex::new(Some(monitor)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_alive(&self) -> bool {
        !self.terminated.load(Ordering::SeqCst)
    }

    /// Enumerate the server's tools.
    pub async fn list_tools(&self, timeout: Duration) -> Result<Vec<ToolSpec>> {
        let listed = tokio::time::timeout(timeout, self.peer.list_tools(Default::default()))
            .await
            .map_err(|_| McpClientError::CallTimeout {
                name: self.name.clone(),
                tool: "tools/list".into(),
                timeout_seconds: timeout.as_secs(),
            })?
            .map_err(|e| self.call_error(e))?;

        Ok(listed
            .tools
            .into_iter()
            .map(|tool| ToolSpec {
                name: tool.name.to_string(),
                description: tool
                    .description
                    .as_deref()
                    .unwrap_or_default()
                    .to_string(),
                input_schema: serde_json::Value::Object((*tool.input_schema).clone()),
            })
            .collect())
    }

    /// Invoke one tool. Concurrent calls multiplex onto the single session;
    /// request correlation is the protocol layer's job.
    pub async fn call_tool(
        &self,
        tool: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
        timeout: Duration,
    ) -> Result<RawToolResult> {
        let result = tokio::time::timeout(
            timeout,
            self.peer.call_tool(CallToolRequestParam {
                name: tool.to_string().into(),
                arguments,
            }),
        )
        .await
        .map_err(|_| McpClientError::CallTimeout {
            name: self.name.clone(),
            tool: tool.to_string(),
            timeout_seconds: timeout.as_secs(),
        })?
        .map_err(|e| self.call_error(e))?;

        Ok(convert_result(result))
    }

    /// Stop the session and reap the child. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        if let Some(cancel) = self.cancel.lock().await.take() {
            cancel.cancel();
        }
        if let Some(handle) = self.monitor.lock().await.take() {
            if let Err(e) = handle.await {
                log::warn!("server '{}' monitor task failed: {e}", self.name);
            }
        }
    }

    fn call_error(&self, e: rmcp::service::ServiceError) -> McpClientError {
        if self.terminated.load(Ordering::SeqCst) {
            McpClientError::Crashed {
                name: self.name.clone(),
            }
        } else {
            McpClientError::Protocol {
                name: self.name.clone(),
                reason: e.to_string(),
            }
        }
    }
}

/// Decouple the upstream result from the wire library's types, preserving
/// part order.
fn convert_result(result: CallToolResult) -> RawToolResult {
    let is_error = result.is_error.unwrap_or(false);
    let parts = result
        .content
        .into_iter()
        .map(|content| match content.raw {
            RawContent::Text(text) => RawPart::Text { text: text.text },
            RawContent::Image(image) => RawPart::Image {
                data: image.data,
                mime: image.mime_type,
            },
            RawContent::Audio(audio) => RawPart::Audio {
                data: audio.data,
                mime: audio.mime_type,
            },
            other => RawPart::Other {
                value: serde_json::to_value(&other).unwrap_or(serde_json::Value::Null),
            },
        })
        .collect();
    RawToolResult { parts, is_error }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::Content;

    #[test]
    fn convert_preserves_part_order_and_error_flag() {
        let result = CallToolResult::error(vec![Content::text("one"), Content::text("two")]);
        let raw = convert_result(result);
        assert!(raw.is_error);
        assert_eq!(
            raw.parts,
            vec![
                RawPart::Text { text: "one".into() },
                RawPart::Text { text: "two".into() },
            ]
        );
    }

    #[test]
    fn convert_success_has_no_error_flag() {
        let result = CallToolResult::success(vec![Content::text("ok")]);
        let raw = convert_result(result);
        assert!(!raw.is_error);
        assert_eq!(raw.parts, vec![RawPart::Text { text: "ok".into() }]);
    }
}
