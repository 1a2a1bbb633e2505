use async_trait::async_trait;
use router_indexer::{IndexOutcome, Result as IndexerResult, ToolIndexer, ToolSource};
use router_llm::{Describer, Embedder, LlmError};
use router_mcp_client::McpClientError;
use router_protocol::{ServerConfig, ToolSpec};
use router_vector_store::{EmbeddedStore, ToolFilter, VectorStore};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct StubEmbedder {
    calls: AtomicUsize,
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.calls.fetch_add(texts.len(), Ordering::SeqCst);
        texts
            .iter()
            .map(|text| {
                if text.contains("poison") {
                    Err(LlmError::Transport("embedding backend down".into()))
                } else {
                    Ok(vec![1.0, (text.len() % 7) as f32])
                }
            })
            .collect()
    }

    fn dimensions(&self) -> usize {
        2
    }
}

struct StubDescriber {
    fail: bool,
}

#[async_trait]
impl Describer for StubDescriber {
    async fn describe_tool(&self, document: &str) -> Result<String, LlmError> {
        if self.fail {
            return Err(LlmError::Http {
                status: 500,
                body: "upstream".into(),
            });
        }
        Ok(format!("ENRICHED {document}"))
    }

    async fn expand_query(&self, query: &str) -> Result<String, LlmError> {
        Ok(query.to_string())
    }
}

#[derive(Default)]
struct StubSource {
    tools: Mutex<HashMap<String, Vec<ToolSpec>>>,
    fail_servers: Vec<String>,
}

#[async_trait]
impl ToolSource for StubSource {
    async fn list_server_tools(&self, config: &ServerConfig) -> IndexerResult<Vec<ToolSpec>> {
        if self.fail_servers.contains(&config.name) {
            return Err(McpClientError::StartupTimeout {
                name: config.name.clone(),
                timeout_seconds: config.timeout_seconds,
            }
            .into());
        }
        Ok(self
            .tools
            .lock()
            .unwrap()
            .get(&config.name)
            .cloned()
            .unwrap_or_default())
    }
}

fn tool(name: &str, description: &str) -> ToolSpec {
    ToolSpec {
        name: name.into(),
        description: description.into(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {"path": {"type": "string"}}
        }),
    }
}

fn server(name: &str, blocked: &[&str], overwrite: bool) -> ServerConfig {
    ServerConfig {
        name: name.into(),
        command: "stub".into(),
        args: vec![],
        env: BTreeMap::new(),
        timeout_seconds: 5,
        hints: vec!["test hints".into()],
        blocked_tools: blocked.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
        ignore: false,
        overwrite,
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    store: Arc<EmbeddedStore>,
    source: Arc<StubSource>,
    embedder: Arc<StubEmbedder>,
}

async fn fixture(describer_fails: bool) -> (Fixture, ToolIndexer) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(EmbeddedStore::open(dir.path()).await.unwrap());
    let source = Arc::new(StubSource::default());
    let embedder = Arc::new(StubEmbedder {
        calls: AtomicUsize::new(0),
    });
    let indexer = ToolIndexer::new(
        store.clone(),
        embedder.clone(),
        Some(Arc::new(StubDescriber {
            fail: describer_fails,
        })),
        source.clone(),
    );
    (
        Fixture {
            _dir: dir,
            store,
            source,
            embedder,
        },
        indexer,
    )
}

#[tokio::test]
async fn indexes_tools_with_enrichment_and_blocked_marking() {
    let (fx, indexer) = fixture(false).await;
    fx.source.tools.lock().unwrap().insert(
        "gh".into(),
        vec![
            tool("create_issue", "open an issue"),
            tool("delete_repository", "delete a repository"),
        ],
    );

    let report = indexer
        .index(&[server("gh", &["delete_repository"], false)], false)
        .await
        .unwrap();
    assert!(!report.has_failures());
    assert_eq!(report.indexed_tools(), 2);

    let records = fx.store.scroll(&ToolFilter::server("gh")).await.unwrap();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert!(!record.payload.enriched_description.is_empty());
        assert!(record.payload.enriched_description.starts_with("ENRICHED"));
    }
    let blocked: Vec<bool> = records.iter().map(|r| r.payload.blocked).collect();
    // scroll is ordered by tool name: create_issue, delete_repository.
    assert_eq!(blocked, vec![false, true]);
}

#[tokio::test]
async fn existing_records_skip_unless_overwrite_or_force() {
    let (fx, indexer) = fixture(false).await;
    fx.source
        .tools
        .lock()
        .unwrap()
        .insert("fs".into(), vec![tool("read_file", "read a file")]);

    let configs = [server("fs", &[], false)];
    let report = indexer.index(&configs, false).await.unwrap();
    assert!(matches!(
        report.outcomes[0].1,
        IndexOutcome::Indexed { tools: 1, .. }
    ));

    let report = indexer.index(&configs, false).await.unwrap();
    assert_eq!(report.outcomes[0].1, IndexOutcome::Skipped);

    let report = indexer.index(&configs, true).await.unwrap();
    assert!(matches!(
        report.outcomes[0].1,
        IndexOutcome::Indexed { tools: 1, .. }
    ));
    // Re-indexing the same upstream leaves one record (idempotent identity).
    assert_eq!(fx.store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn overwrite_deletes_records_for_tools_gone_upstream() {
    let (fx, indexer) = fixture(false).await;
    fx.source.tools.lock().unwrap().insert(
        "fs".into(),
        vec![tool("read_file", "read"), tool("write_file", "write")],
    );
    indexer
        .index(&[server("fs", &[], false)], false)
        .await
        .unwrap();
    assert_eq!(fx.store.count().await.unwrap(), 2);

    fx.source
        .tools
        .lock()
        .unwrap()
        .insert("fs".into(), vec![tool("read_file", "read")]);
    let report = indexer
        .index(&[server("fs", &[], true)], false)
        .await
        .unwrap();
    assert!(matches!(
        report.outcomes[0].1,
        IndexOutcome::Indexed { tools: 1, stale_removed: 1 }
    ));

    let records = fx.store.scroll(&ToolFilter::server("fs")).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].payload.tool_name, "read_file");
}

#[tokio::test]
async fn describer_failure_falls_back_to_raw_document() {
    let (fx, indexer) = fixture(true).await;
    fx.source
        .tools
        .lock()
        .unwrap()
        .insert("fs".into(), vec![tool("read_file", "read a file")]);

    let report = indexer
        .index(&[server("fs", &[], false)], false)
        .await
        .unwrap();
    // Fallback is a warning, not a failure.
    assert!(!report.has_failures());

    let records = fx.store.scroll(&ToolFilter::server("fs")).await.unwrap();
    assert!(records[0]
        .payload
        .enriched_description
        .contains("server: fs"));
    assert!(records[0]
        .payload
        .enriched_description
        .contains("tool: read_file"));
}

#[tokio::test]
async fn per_tool_embedding_failure_is_isolated() {
    let (fx, indexer) = fixture(false).await;
    fx.source.tools.lock().unwrap().insert(
        "fs".into(),
        vec![
            tool("read_file", "read a file"),
            tool("poison_pill", "poison this document"),
        ],
    );

    let report = indexer
        .index(&[server("fs", &[], false)], false)
        .await
        .unwrap();
    assert!(report.has_failures());
    assert_eq!(report.indexed_tools(), 1);
    assert_eq!(report.tool_failures.len(), 1);
    assert_eq!(report.tool_failures[0].1, "poison_pill");

    let records = fx.store.scroll(&ToolFilter::server("fs")).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].payload.tool_name, "read_file");
}

#[tokio::test]
async fn server_failure_does_not_stop_other_servers() {
    let (fx, _) = fixture(false).await;
    fx.source
        .tools
        .lock()
        .unwrap()
        .insert("ok".into(), vec![tool("ping", "ping")]);

    let source = Arc::new(StubSource {
        tools: Mutex::new(fx.source.tools.lock().unwrap().clone()),
        fail_servers: vec!["broken".into()],
    });
    let indexer = ToolIndexer::new(
        fx.store.clone(),
        fx.embedder.clone(),
        None,
        source,
    );

    let report = indexer
        .index(&[server("broken", &[], false), server("ok", &[], false)], false)
        .await
        .unwrap();
    assert!(report.has_failures());
    assert_eq!(report.indexed_tools(), 1);
    let failed = report
        .outcomes
        .iter()
        .find(|(name, _)| name == "broken")
        .unwrap();
    assert!(matches!(failed.1, IndexOutcome::Failed { .. }));
}
