use crate::executor::ToolExecutor;
use crate::ops::{self, ManageAction, Operation, ROUTER_TOOL_NAME};
use crate::render::{envelope_contents, json_content};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler};
use router_content_store::{ContentChunk, ContentStore, ContentStoreError};
use router_llm::{Describer, Embedder};
use router_protocol::{ErrorKind, Result, RouterError, ServersConfig};
use router_supervisor::ServerSupervisor;
use router_task_pool::TaskPool;
use router_vector_store::{ToolFilter, VectorStore};
use std::collections::HashMap;
use std::sync::Arc;

const SHORT_DESCRIPTION_CHARS: usize = 200;

/// Total deadline for one router operation, over and above the per-call
/// upstream timeouts. An operation that blows through this comes back as
/// TIMEOUT; any upstream request it was waiting on is abandoned.
const OPERATION_DEADLINE: std::time::Duration = std::time::Duration::from_secs(180);

/// The meta-tool dispatcher. Clones share all underlying services.
#[derive(Clone)]
pub struct RouterService {
    configs: Arc<ServersConfig>,
    index: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    describer: Option<Arc<dyn Describer>>,
    supervisor: ServerSupervisor,
    tasks: Arc<TaskPool>,
    content: Arc<ContentStore>,
    executor: Arc<ToolExecutor>,
}

impl RouterService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        configs: Arc<ServersConfig>,
        index: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        describer: Option<Arc<dyn Describer>>,
        supervisor: ServerSupervisor,
        tasks: Arc<TaskPool>,
        content: Arc<ContentStore>,
        executor: Arc<ToolExecutor>,
    ) -> Self {
        Self {
            configs,
            index,
            embedder,
            describer,
            supervisor,
            tasks,
            content,
            executor,
        }
    }

    /// Dispatch one operation envelope. This is the whole router contract:
    /// whatever happens, the result is a well-formed tool result, with
    /// failures rendered as a single `ERROR:<KIND>: <message>` text part.
    pub async fn handle(
        &self,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> CallToolResult {
        let outcome = match Operation::parse(arguments) {
            Ok(operation) => {
                match tokio::time::timeout(OPERATION_DEADLINE, self.dispatch(operation)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(RouterError::new(
                        ErrorKind::Timeout,
                        format!("operation exceeded {}s deadline", OPERATION_DEADLINE.as_secs()),
                    )),
                }
            }
            Err(e) => Err(e),
        };
        match outcome {
            Ok(contents) => CallToolResult::success(contents),
            Err(e) => {
                log::debug!("operation failed: {e}");
                CallToolResult::error(vec![Content::text(e.to_text())])
            }
        }
    }

    /// The outward tool description: contract summary plus a live directory
    /// of indexed servers and their hints, rebuilt on every `tools/list`.
    pub async fn tool_description(&self) -> String {
        let mut text = String::from(
            "Semantic router over an ecosystem of MCP tool servers. \
             Pass an 'operation' plus its fields.\n\
             Discovery: search_tools(query, top_k?, server_filter?, expand_query?), \
             get_server_info(server_name), list_server_tools(server_name), \
             get_tool_details(server_name, tool_name).\n\
             Lifecycle: manage_server(server_name, action: start|shutdown), \
             list_running_servers.\n\
             Execution: execute_tool(server_name, tool_name, arguments?, \
             in_background?, priority?), poll_task_result(task_id).\n\
             Content: get_content(ref_id, chunk_index?) for offloaded results.\n",
        );

        let counts = self.tool_counts().await;
        let servers = self.configs.active_servers();
        if servers.is_empty() {
            text.push_str("No servers configured.");
            return text;
        }
        text.push_str("Configured servers:\n");
        for server in servers {
            let count = counts.get(&server.name).copied().unwrap_or(0);
            text.push_str(&format!("- {} ({count} tools indexed)", server.name));
            if !server.hints.is_empty() {
                text.push_str(&format!(": {}", server.hints.join("; ")));
            }
            text.push('\n');
        }
        text
    }

    async fn tool_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        match self.index.scroll(&ToolFilter::default()).await {
            Ok(records) => {
                for record in records {
                    *counts.entry(record.payload.server_name).or_insert(0) += 1;
                }
            }
            Err(e) => log::warn!("tool directory unavailable: {e}"),
        }
        counts
    }

    async fn dispatch(&self, operation: Operation) -> Result<Vec<Content>> {
        match operation {
            Operation::SearchTools {
                query,
                top_k,
                server_filter,
                expand_query,
            } => self.search_tools(query, top_k, server_filter, expand_query).await,
            Operation::GetServerInfo { server_name } => self.get_server_info(&server_name).await,
            Operation::ListServerTools { server_name } => {
                self.list_server_tools(&server_name).await
            }
            Operation::GetToolDetails {
                server_name,
                tool_name,
            } => self.get_tool_details(&server_name, &tool_name).await,
            Operation::ManageServer {
                server_name,
                action,
            } => self.manage_server(&server_name, action).await,
            Operation::ListRunningServers => Ok(json_content(&self.supervisor.list_running())),
            Operation::ExecuteTool {
                server_name,
                tool_name,
                arguments,
                in_background,
                priority,
            } => {
                self.execute_tool(&server_name, &tool_name, arguments, in_background, priority)
                    .await
            }
            Operation::PollTaskResult { task_id } => self.poll_task_result(&task_id),
            Operation::GetContent {
                ref_id,
                chunk_index,
            } => self.get_content(&ref_id, chunk_index).await,
        }
    }

    async fn search_tools(
        &self,
        query: String,
        top_k: Option<usize>,
        server_filter: Option<String>,
        expand_query: bool,
    ) -> Result<Vec<Content>> {
        let top_k = top_k.unwrap_or(ops::DEFAULT_TOP_K);
        if top_k > ops::MAX_TOP_K {
            return Err(RouterError::invalid_argument(format!(
                "top_k must be at most {} (got {top_k})",
                ops::MAX_TOP_K
            )));
        }
        if top_k == 0 {
            return Ok(json_content(&Vec::<serde_json::Value>::new()));
        }

        let effective_query = match (&self.describer, expand_query) {
            (Some(describer), true) => match describer.expand_query(&query).await {
                Ok(expanded) => expanded,
                Err(e) => {
                    log::warn!("query expansion failed, using raw query: {e}");
                    query.clone()
                }
            },
            _ => query.clone(),
        };

        let vectors = self
            .embedder
            .embed(&[effective_query])
            .await
            .map_err(|e| RouterError::new(ErrorKind::UpstreamLlmError, e.to_string()))?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| RouterError::new(ErrorKind::UpstreamLlmError, "no embedding returned"))?;

        let filter = ToolFilter {
            server_name: server_filter,
        };
        let hits = self
            .index
            .search(&vector, top_k, &filter)
            .await
            .map_err(|e| RouterError::internal(e.to_string()))?;

        let results: Vec<serde_json::Value> = hits
            .iter()
            .map(|hit| {
                serde_json::json!({
                    "server_name": hit.payload.server_name,
                    "tool_name": hit.payload.tool_name,
                    "score": hit.score,
                    "enriched_description": hit.payload.enriched_description,
                })
            })
            .collect();
        Ok(json_content(&results))
    }

    async fn get_server_info(&self, server_name: &str) -> Result<Vec<Content>> {
        let config = self
            .configs
            .get(server_name)
            .ok_or_else(|| unknown_server(server_name))?;
        let records = self
            .index
            .scroll(&ToolFilter::server(server_name))
            .await
            .map_err(|e| RouterError::internal(e.to_string()))?;

        Ok(json_content(&serde_json::json!({
            "server_name": server_name,
            "command": config.command,
            "hints": config.hints,
            "tool_count": records.len(),
            "blocked_tools": config.blocked_tools,
            "ignored": config.ignore,
        })))
    }

    async fn list_server_tools(&self, server_name: &str) -> Result<Vec<Content>> {
        if self.configs.get(server_name).is_none() {
            return Err(unknown_server(server_name));
        }
        let records = self
            .index
            .scroll(&ToolFilter::server(server_name))
            .await
            .map_err(|e| RouterError::internal(e.to_string()))?;

        let tools: Vec<serde_json::Value> = records
            .iter()
            .map(|record| {
                serde_json::json!({
                    "tool_name": record.payload.tool_name,
                    "description": short_description(&record.payload.original_description,
                                                     &record.payload.enriched_description),
                    "blocked": record.payload.blocked,
                })
            })
            .collect();
        Ok(json_content(&serde_json::json!({
            "server_name": server_name,
            "tools": tools,
        })))
    }

    async fn get_tool_details(&self, server_name: &str, tool_name: &str) -> Result<Vec<Content>> {
        let records = self
            .index
            .scroll(&ToolFilter::server(server_name))
            .await
            .map_err(|e| RouterError::internal(e.to_string()))?;
        let record = records
            .iter()
            .find(|record| record.payload.tool_name == tool_name)
            .ok_or_else(|| {
                RouterError::new(
                    ErrorKind::UnknownTool,
                    format!("tool '{tool_name}' on server '{server_name}' is not indexed"),
                )
            })?;

        let schema = serde_json::to_string_pretty(&record.payload.input_schema)
            .unwrap_or_else(|_| record.payload.input_schema.to_string());
        Ok(vec![Content::text(format!(
            "Tool: {tool_name} (server: {server_name})\nblocked: {}\n\n{}\n\nInput schema:\n{schema}",
            record.payload.blocked, record.payload.enriched_description,
        ))])
    }

    async fn manage_server(&self, server_name: &str, action: ManageAction) -> Result<Vec<Content>> {
        match action {
            ManageAction::Start => {
                let snapshot = self
                    .supervisor
                    .start(server_name)
                    .await
                    .map_err(|e| RouterError::new(e.kind(), e.to_string()))?;
                Ok(json_content(&snapshot))
            }
            ManageAction::Shutdown => {
                let was_running = self
                    .supervisor
                    .shutdown(server_name)
                    .await
                    .map_err(|e| RouterError::new(e.kind(), e.to_string()))?;
                let message = if was_running {
                    format!("server '{server_name}' shut down")
                } else {
                    format!("server '{server_name}' was not running")
                };
                Ok(vec![Content::text(message)])
            }
        }
    }

    async fn execute_tool(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
        in_background: bool,
        priority: i32,
    ) -> Result<Vec<Content>> {
        if in_background {
            // Policy is enforced at submit time so a blocked or unknown tool
            // never occupies the queue.
            self.executor.check_policy(server_name, tool_name).await?;
            let task_id = self.tasks.submit(server_name, tool_name, arguments, priority)?;
            return Ok(json_content(&serde_json::json!({
                "task_id": task_id,
                "status": "QUEUED",
            })));
        }

        let envelope = self
            .executor
            .execute(server_name, tool_name, arguments)
            .await?;
        Ok(envelope_contents(&envelope))
    }

    fn poll_task_result(&self, task_id: &str) -> Result<Vec<Content>> {
        let snapshot = self.tasks.poll(task_id).ok_or_else(|| {
            RouterError::invalid_argument(format!("no task with id '{task_id}'"))
        })?;

        let mut contents = json_content(&serde_json::json!({
            "task_id": snapshot.task_id,
            "status": snapshot.status,
            "server_name": snapshot.server_name,
            "tool_name": snapshot.tool_name,
        }));
        if let Some(envelope) = &snapshot.result {
            contents.extend(envelope_contents(envelope));
        }
        if let Some(error) = &snapshot.error {
            contents.push(Content::text(error.clone()));
        }
        Ok(contents)
    }

    async fn get_content(&self, ref_id: &str, chunk_index: usize) -> Result<Vec<Content>> {
        let (chunk, manifest) = self
            .content
            .get(ref_id, chunk_index)
            .await
            .map_err(content_error)?;

        let mut contents = json_content(&manifest);
        match chunk {
            ContentChunk::Text(text) => contents.push(Content::text(text)),
            ContentChunk::Binary(bytes) => {
                use base64::Engine as _;
                contents.push(Content::text(
                    base64::engine::general_purpose::STANDARD.encode(bytes),
                ));
            }
        }
        Ok(contents)
    }
}

fn unknown_server(server_name: &str) -> RouterError {
    RouterError::new(
        ErrorKind::UnknownServer,
        format!("server '{server_name}' is not configured"),
    )
}

fn content_error(e: ContentStoreError) -> RouterError {
    match e {
        ContentStoreError::OutOfRange { requested, total } => RouterError::invalid_argument(
            format!("chunk index {requested} out of range (total_chunks={total})"),
        ),
        other => RouterError::new(ErrorKind::StorageError, other.to_string()),
    }
}

fn short_description(original: &str, enriched: &str) -> String {
    let source = if original.trim().is_empty() {
        enriched
    } else {
        original
    };
    let mut short: String = source.chars().take(SHORT_DESCRIPTION_CHARS).collect();
    if source.chars().count() > SHORT_DESCRIPTION_CHARS {
        short.push('…');
    }
    short
}

impl ServerHandler for RouterService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Semantic router for MCP ecosystems. Start with \
                 semantic_router({operation: 'search_tools', query: ...}) to find tools, \
                 inspect them with get_tool_details, then run them with execute_tool. \
                 Long results come back as content refs; fetch them with get_content. \
                 Use in_background: true plus poll_task_result for long-running tools."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, McpError> {
        let tool = Tool::new(
            ROUTER_TOOL_NAME,
            self.tool_description().await,
            Arc::new(ops::router_input_schema()),
        );
        Ok(ListToolsResult {
            next_cursor: None,
            tools: vec![tool],
            ..Default::default()
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, McpError> {
        if request.name != ROUTER_TOOL_NAME {
            return Err(McpError::invalid_params(
                format!("unknown tool '{}'", request.name),
                None,
            ));
        }

        Ok(self.handle(request.arguments).await)
    }
}
