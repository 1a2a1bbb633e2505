use crate::error::{Result, VectorStoreError};
use crate::store::VectorStore;
use crate::types::{ScoredTool, StoredTool, ToolFilter, ToolPayload, ToolPoint};
use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointId, PointStruct, PointsIdsList, ScrollPointsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use std::collections::HashMap;

const SCROLL_PAGE: u32 = 256;

/// Remote Qdrant collection adapter.
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
}

impl QdrantStore {
    pub fn connect(url: &str, collection: impl Into<String>) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
        Ok(Self {
            client,
            collection: collection.into(),
        })
    }

    fn filter_for(filter: &ToolFilter) -> Option<Filter> {
        filter
            .server_name
            .as_ref()
            .map(|server| Filter::must([Condition::matches("server_name", server.clone())]))
    }
}

fn backend(e: impl std::fmt::Display) -> VectorStoreError {
    VectorStoreError::Backend(e.to_string())
}

fn payload_for(point: &ToolPoint) -> Result<Payload> {
    // input_schema travels as a JSON string: it is opaque to the index and
    // this keeps the stored payload flat for filtering.
    let value = serde_json::json!({
        "server_name": point.payload.server_name,
        "tool_name": point.payload.tool_name,
        "original_description": point.payload.original_description,
        "input_schema": point.payload.input_schema.to_string(),
        "enriched_description": point.payload.enriched_description,
        "blocked": point.payload.blocked,
    });
    Payload::try_from(value).map_err(backend)
}

fn get_str(payload: &HashMap<String, Value>, key: &str) -> String {
    match payload.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(s)) => s.clone(),
        _ => String::new(),
    }
}

fn get_bool(payload: &HashMap<String, Value>, key: &str) -> bool {
    matches!(
        payload.get(key).and_then(|v| v.kind.as_ref()),
        Some(Kind::BoolValue(true))
    )
}

fn payload_from(payload: &HashMap<String, Value>) -> ToolPayload {
    let raw_schema = get_str(payload, "input_schema");
    ToolPayload {
        server_name: get_str(payload, "server_name"),
        tool_name: get_str(payload, "tool_name"),
        original_description: get_str(payload, "original_description"),
        input_schema: serde_json::from_str(&raw_schema)
            .unwrap_or(serde_json::Value::Object(Default::default())),
        enriched_description: get_str(payload, "enriched_description"),
        blocked: get_bool(payload, "blocked"),
    }
}

fn id_string(id: Option<&PointId>) -> String {
    match id.and_then(|p| p.point_id_options.as_ref()) {
        Some(PointIdOptions::Uuid(uuid)) => uuid.clone(),
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_ready(&self, dimensions: usize) -> Result<()> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(backend)?;
        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection).vectors_config(
                        VectorParamsBuilder::new(dimensions as u64, Distance::Cosine),
                    ),
                )
                .await
                .map_err(backend)?;
            log::info!(
                "created qdrant collection '{}' (dims={dimensions}, cosine)",
                self.collection
            );
        }
        Ok(())
    }

    async fn upsert(&self, points: Vec<ToolPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let mut structs = Vec::with_capacity(points.len());
        for point in &points {
            structs.push(PointStruct::new(
                point.id.clone(),
                point.vector.clone(),
                payload_for(point)?,
            ));
        }
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, structs).wait(true))
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filter: &ToolFilter,
    ) -> Result<Vec<ScoredTool>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let mut request = SearchPointsBuilder::new(
            &self.collection,
            query_vector.to_vec(),
            top_k as u64,
        )
        .with_payload(true);
        if let Some(filter) = Self::filter_for(filter) {
            request = request.filter(filter);
        }
        let response = self.client.search_points(request).await.map_err(backend)?;
        Ok(response
            .result
            .into_iter()
            .map(|hit| ScoredTool {
                id: id_string(hit.id.as_ref()),
                score: hit.score,
                payload: payload_from(&hit.payload),
            })
            .collect())
    }

    async fn scroll(&self, filter: &ToolFilter) -> Result<Vec<StoredTool>> {
        let mut records = Vec::new();
        let mut offset: Option<PointId> = None;
        loop {
            let mut request = ScrollPointsBuilder::new(&self.collection)
                .with_payload(true)
                .limit(SCROLL_PAGE);
            if let Some(filter) = Self::filter_for(filter) {
                request = request.filter(filter);
            }
            if let Some(offset) = offset.take() {
                request = request.offset(offset);
            }
            let response = self.client.scroll(request).await.map_err(backend)?;
            for point in response.result {
                records.push(StoredTool {
                    id: id_string(point.id.as_ref()),
                    payload: payload_from(&point.payload),
                });
            }
            match response.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        records.sort_by(|a, b| {
            (&a.payload.server_name, &a.payload.tool_name)
                .cmp(&(&b.payload.server_name, &b.payload.tool_name))
        });
        Ok(records)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<PointId> = ids.iter().map(|id| PointId::from(id.clone())).collect();
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(PointsIdsList { ids })
                    .wait(true),
            )
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn delete_by_server(&self, server_name: &str) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(Filter::must([Condition::matches(
                        "server_name",
                        server_name.to_string(),
                    )]))
                    .wait(true),
            )
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(backend)?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}
