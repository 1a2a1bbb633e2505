//! Vector index of MCP tool records.
//!
//! One collection of tool points, keyed by a deterministic id derived from
//! `(server_name, tool_name)`. Consumers talk to the narrow [`VectorStore`]
//! trait; two adapters exist:
//!
//! - [`EmbeddedStore`] — a JSON-persisted store with brute-force cosine
//!   scoring, for `QDRANT_STORAGE_PATH` setups and tests.
//! - [`QdrantStore`] — a remote Qdrant collection for `QDRANT_URL` setups.

mod embedded;
mod error;
mod qdrant;
mod store;
mod types;

pub use embedded::EmbeddedStore;
pub use error::{Result, VectorStoreError};
pub use qdrant::QdrantStore;
pub use store::VectorStore;
pub use types::{tool_point_id, ScoredTool, StoredTool, ToolFilter, ToolPayload, ToolPoint};
