use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("server error: {0}")]
    Server(#[from] router_mcp_client::McpClientError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] router_vector_store::VectorStoreError),

    #[error("embedding error: {0}")]
    Embedding(#[from] router_llm::LlmError),

    #[error("invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
}
