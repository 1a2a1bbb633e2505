use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContentStoreError>;

#[derive(Error, Debug)]
pub enum ContentStoreError {
    #[error("content ref not found: {0}")]
    NotFound(String),

    #[error("chunk index {requested} out of range (total_chunks={total})")]
    OutOfRange { requested: usize, total: usize },

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}
