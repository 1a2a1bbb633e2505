use crate::document::description_document;
use crate::error::{IndexerError, Result};
use crate::stats::{IndexOutcome, IndexReport};
use async_trait::async_trait;
use router_llm::{Describer, Embedder};
use router_mcp_client::McpSession;
use router_protocol::{ServerConfig, ToolSpec};
use router_vector_store::{tool_point_id, ToolFilter, ToolPayload, ToolPoint, VectorStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Where the indexer gets a server's tool list from. The production
/// implementation opens a short-lived MCP session; tests stub this.
#[async_trait]
pub trait ToolSource: Send + Sync {
    async fn list_server_tools(&self, config: &ServerConfig) -> Result<Vec<ToolSpec>>;
}

/// Opens a temporary session per server, lists tools, closes it.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionToolSource;

#[async_trait]
impl ToolSource for SessionToolSource {
    async fn list_server_tools(&self, config: &ServerConfig) -> Result<Vec<ToolSpec>> {
        let session = McpSession::start(config, None).await?;
        let listed = session
            .list_tools(Duration::from_secs(config.timeout_seconds))
            .await;
        session.shutdown().await;
        Ok(listed?)
    }
}

/// The enrich-embed-upsert pipeline.
pub struct ToolIndexer {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    describer: Option<Arc<dyn Describer>>,
    source: Arc<dyn ToolSource>,
}

impl ToolIndexer {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        describer: Option<Arc<dyn Describer>>,
        source: Arc<dyn ToolSource>,
    ) -> Self {
        Self {
            store,
            embedder,
            describer,
            source,
        }
    }

    /// Index every non-ignored server. Per-server failures are recorded and
    /// do not stop the run; the report says what happened where.
    pub async fn index(&self, configs: &[ServerConfig], force: bool) -> Result<IndexReport> {
        self.store.ensure_ready(self.embedder.dimensions()).await?;

        let mut report = IndexReport::default();
        for config in configs {
            if config.ignore {
                continue;
            }
            match self.index_server(config, force, &mut report).await {
                Ok(outcome) => {
                    log::info!("server '{}': {outcome:?}", config.name);
                    report.record(&config.name, outcome);
                }
                Err(e) => {
                    log::error!("server '{}': indexing failed: {e}", config.name);
                    report.record(
                        &config.name,
                        IndexOutcome::Failed {
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }
        Ok(report)
    }

    async fn index_server(
        &self,
        config: &ServerConfig,
        force: bool,
        report: &mut IndexReport,
    ) -> Result<IndexOutcome> {
        let existing = self
            .store
            .scroll(&ToolFilter::server(&config.name))
            .await?;
        if !existing.is_empty() && !config.overwrite && !force {
            log::info!("server '{}' already indexed, skipping", config.name);
            return Ok(IndexOutcome::Skipped);
        }

        let tools = self.source.list_server_tools(config).await?;
        log::info!(
            "server '{}': {} tools upstream, {} records indexed",
            config.name,
            tools.len(),
            existing.len()
        );

        let mut points = Vec::with_capacity(tools.len());
        for tool in &tools {
            match self.build_point(config, tool).await {
                Ok(point) => points.push(point),
                Err(e) => {
                    log::warn!(
                        "server '{}': skipping tool '{}': {e}",
                        config.name,
                        tool.name
                    );
                    report.record_tool_failure(&config.name, &tool.name, e.to_string());
                }
            }
        }
        let indexed = points.len();
        self.store.upsert(points).await?;

        // Reconcile: records whose tool no longer exists upstream go away.
        let upstream: HashSet<&str> = tools.iter().map(|tool| tool.name.as_str()).collect();
        let stale: Vec<String> = existing
            .iter()
            .filter(|record| !upstream.contains(record.payload.tool_name.as_str()))
            .map(|record| record.id.clone())
            .collect();
        let stale_removed = stale.len();
        if stale_removed > 0 {
            log::info!(
                "server '{}': deleting {stale_removed} stale records",
                config.name
            );
            self.store.delete(&stale).await?;
        }

        Ok(IndexOutcome::Indexed {
            tools: indexed,
            stale_removed,
        })
    }

    async fn build_point(&self, config: &ServerConfig, tool: &ToolSpec) -> Result<ToolPoint> {
        let document = description_document(config, tool);

        let enriched = match &self.describer {
            Some(describer) => match describer.describe_tool(&document).await {
                Ok(text) if !text.trim().is_empty() => text,
                Ok(_) => document.clone(),
                Err(e) => {
                    // The describer is an enrichment, not a dependency; fall
                    // back to the raw document and keep going.
                    log::warn!(
                        "describer unavailable for '{}.{}', using raw document: {e}",
                        config.name,
                        tool.name
                    );
                    document.clone()
                }
            },
            None => document.clone(),
        };

        let mut vectors = self.embedder.embed(&[enriched.clone()]).await?;
        let vector = vectors
            .pop()
            .ok_or(router_llm::LlmError::EmptyResponse { expected: 1 })?;
        if vector.len() != self.embedder.dimensions() {
            return Err(IndexerError::InvalidDimension {
                expected: self.embedder.dimensions(),
                actual: vector.len(),
            });
        }

        Ok(ToolPoint {
            id: tool_point_id(&config.name, &tool.name),
            vector,
            payload: ToolPayload {
                server_name: config.name.clone(),
                tool_name: tool.name.clone(),
                original_description: tool.description.clone(),
                input_schema: tool.input_schema.clone(),
                enriched_description: enriched,
                blocked: config.blocked_tools.contains(&tool.name),
            },
        })
    }
}
