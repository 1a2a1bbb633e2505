use router_vector_store::{
    tool_point_id, EmbeddedStore, ToolFilter, ToolPayload, ToolPoint, VectorStore,
    VectorStoreError,
};

fn point(server: &str, tool: &str, vector: Vec<f32>, blocked: bool) -> ToolPoint {
    ToolPoint {
        id: tool_point_id(server, tool),
        vector,
        payload: ToolPayload {
            server_name: server.to_string(),
            tool_name: tool.to_string(),
            original_description: format!("{tool} original"),
            input_schema: serde_json::json!({"type": "object"}),
            enriched_description: format!("{tool} enriched"),
            blocked,
        },
    }
}

#[tokio::test]
async fn search_orders_by_cosine_similarity() {
    let dir = tempfile::tempdir().unwrap();
    let store = EmbeddedStore::open(dir.path()).await.unwrap();
    store.ensure_ready(2).await.unwrap();

    store
        .upsert(vec![
            point("fs", "read_file", vec![1.0, 0.0], false),
            point("gh", "create_issue", vec![0.0, 1.0], false),
            point("fs", "write_file", vec![0.7, 0.7], false),
        ])
        .await
        .unwrap();

    let hits = store
        .search(&[1.0, 0.1], 3, &ToolFilter::default())
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].payload.tool_name, "read_file");
    assert_eq!(hits[2].payload.tool_name, "create_issue");
    assert!(hits[0].score >= hits[1].score && hits[1].score >= hits[2].score);
}

#[tokio::test]
async fn search_respects_server_filter_and_top_k() {
    let dir = tempfile::tempdir().unwrap();
    let store = EmbeddedStore::open(dir.path()).await.unwrap();
    store.ensure_ready(2).await.unwrap();
    store
        .upsert(vec![
            point("fs", "read_file", vec![1.0, 0.0], false),
            point("gh", "create_issue", vec![1.0, 0.0], false),
        ])
        .await
        .unwrap();

    let hits = store
        .search(&[1.0, 0.0], 10, &ToolFilter::server("gh"))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].payload.server_name, "gh");

    let hits = store
        .search(&[1.0, 0.0], 0, &ToolFilter::default())
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn upsert_by_same_identity_replaces_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = EmbeddedStore::open(dir.path()).await.unwrap();
    store.ensure_ready(2).await.unwrap();

    store
        .upsert(vec![point("fs", "read_file", vec![1.0, 0.0], false)])
        .await
        .unwrap();
    store
        .upsert(vec![point("fs", "read_file", vec![0.0, 1.0], true)])
        .await
        .unwrap();

    assert_eq!(store.count().await.unwrap(), 1);
    let records = store.scroll(&ToolFilter::default()).await.unwrap();
    assert!(records[0].payload.blocked);
}

#[tokio::test]
async fn rejects_wrong_dimensionality() {
    let dir = tempfile::tempdir().unwrap();
    let store = EmbeddedStore::open(dir.path()).await.unwrap();
    store.ensure_ready(3).await.unwrap();

    let err = store
        .upsert(vec![point("fs", "read_file", vec![1.0, 0.0], false)])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VectorStoreError::InvalidDimension { expected: 3, actual: 2 }
    ));
}

#[tokio::test]
async fn scroll_is_ordered_and_delete_by_server_removes_all() {
    let dir = tempfile::tempdir().unwrap();
    let store = EmbeddedStore::open(dir.path()).await.unwrap();
    store.ensure_ready(2).await.unwrap();
    store
        .upsert(vec![
            point("gh", "create_issue", vec![0.0, 1.0], false),
            point("fs", "write_file", vec![0.5, 0.5], false),
            point("fs", "read_file", vec![1.0, 0.0], false),
        ])
        .await
        .unwrap();

    let records = store.scroll(&ToolFilter::default()).await.unwrap();
    let names: Vec<_> = records
        .iter()
        .map(|r| (r.payload.server_name.as_str(), r.payload.tool_name.as_str()))
        .collect();
    assert_eq!(
        names,
        vec![("fs", "read_file"), ("fs", "write_file"), ("gh", "create_issue")]
    );

    store.delete_by_server("fs").await.unwrap();
    assert_eq!(store.count().await.unwrap(), 1);
    assert!(store
        .scroll(&ToolFilter::server("fs"))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn index_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = EmbeddedStore::open(dir.path()).await.unwrap();
        store.ensure_ready(2).await.unwrap();
        store
            .upsert(vec![point("fs", "read_file", vec![1.0, 0.0], false)])
            .await
            .unwrap();
    }
    let store = EmbeddedStore::open(dir.path()).await.unwrap();
    store.ensure_ready(2).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 1);

    let err = store.ensure_ready(4).await.unwrap_err();
    assert!(matches!(err, VectorStoreError::InvalidDimension { .. }));
}
