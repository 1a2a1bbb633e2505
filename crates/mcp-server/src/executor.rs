use crate::processor::ResultProcessor;
use async_trait::async_trait;
use router_protocol::{ErrorKind, Result, ResultEnvelope, RouterError};
use router_supervisor::{ServerSupervisor, SupervisorError};
use router_task_pool::ToolRunner;
use router_vector_store::{ToolFilter, VectorStore};
use std::sync::Arc;
use std::time::Duration;

/// Synchronous execution path: policy check, session acquisition, the
/// upstream call, result processing.
pub struct ToolExecutor {
    supervisor: ServerSupervisor,
    index: Arc<dyn VectorStore>,
    processor: Arc<ResultProcessor>,
    call_timeout: Duration,
}

impl ToolExecutor {
    pub fn new(
        supervisor: ServerSupervisor,
        index: Arc<dyn VectorStore>,
        processor: Arc<ResultProcessor>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            supervisor,
            index,
            processor,
            call_timeout,
        }
    }

    /// The set of tools accepted for execution is exactly the set indexed
    /// and not blocked. Runs before any server is started.
    pub async fn check_policy(&self, server_name: &str, tool_name: &str) -> Result<()> {
        let records = self
            .index
            .scroll(&ToolFilter::server(server_name))
            .await
            .map_err(|e| RouterError::new(ErrorKind::Internal, e.to_string()))?;
        let record = records
            .iter()
            .find(|record| record.payload.tool_name == tool_name)
            .ok_or_else(|| {
                RouterError::new(
                    ErrorKind::UnknownTool,
                    format!("tool '{tool_name}' on server '{server_name}' is not indexed"),
                )
            })?;
        if record.payload.blocked {
            return Err(RouterError::new(
                ErrorKind::Blocked,
                format!("tool '{tool_name}' on server '{server_name}' is blocked by configuration"),
            ));
        }
        Ok(())
    }

    pub async fn execute(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<ResultEnvelope> {
        self.check_policy(server_name, tool_name).await?;

        // A failed start gets one fresh attempt; anything else surfaces.
        let lease = match self.supervisor.acquire(server_name).await {
            Ok(lease) => lease,
            Err(e @ SupervisorError::UnknownServer(_)) => return Err(supervisor_error(e)),
            Err(first) => {
                log::warn!("start of '{server_name}' failed ({first}), retrying once");
                self.supervisor
                    .acquire(server_name)
                    .await
                    .map_err(supervisor_error)?
            }
        };

        let raw = lease
            .session()
            .call_tool(tool_name, arguments, self.call_timeout)
            .await;
        drop(lease);

        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => {
                let kind = e.kind();
                if kind == ErrorKind::ServerCrashed {
                    // Clear the dead slot so the next call starts fresh.
                    self.supervisor.invalidate(server_name);
                }
                return Err(RouterError::new(kind, e.to_string()));
            }
        };

        self.processor.process(raw).await
    }
}

fn supervisor_error(e: SupervisorError) -> RouterError {
    RouterError::new(e.kind(), e.to_string())
}

#[async_trait]
impl ToolRunner for ToolExecutor {
    async fn run_tool(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<ResultEnvelope> {
        self.execute(server_name, tool_name, arguments).await
    }
}
