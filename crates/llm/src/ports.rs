use crate::error::Result;
use async_trait::async_trait;

/// Turns texts into fixed-dimensionality vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// The dimensionality every returned vector is guaranteed to have.
    fn dimensions(&self) -> usize;
}

/// Produces polished natural-language descriptions.
#[async_trait]
pub trait Describer: Send + Sync {
    /// Rewrite a raw tool description document into searchable prose.
    async fn describe_tool(&self, document: &str) -> Result<String>;

    /// Expand a terse user query into a richer search query.
    async fn expand_query(&self, query: &str) -> Result<String>;
}

/// Captions images.
#[async_trait]
pub trait Vision: Send + Sync {
    async fn describe_image(&self, bytes: &[u8], mime: &str) -> Result<String>;
}
