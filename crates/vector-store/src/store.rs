use crate::error::Result;
use crate::types::{ScoredTool, StoredTool, ToolFilter, ToolPoint};
use async_trait::async_trait;

/// Narrow port over the vector database.
///
/// Upserts are idempotent by point id; `search` returns hits ordered by
/// descending cosine similarity.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection on first use; validates dimensionality after.
    async fn ensure_ready(&self, dimensions: usize) -> Result<()>;

    async fn upsert(&self, points: Vec<ToolPoint>) -> Result<()>;

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filter: &ToolFilter,
    ) -> Result<Vec<ScoredTool>>;

    /// All records matching the filter, in stable (server, tool) order.
    async fn scroll(&self, filter: &ToolFilter) -> Result<Vec<StoredTool>>;

    async fn delete(&self, ids: &[String]) -> Result<()>;

    async fn delete_by_server(&self, server_name: &str) -> Result<()>;

    async fn count(&self) -> Result<usize>;
}
