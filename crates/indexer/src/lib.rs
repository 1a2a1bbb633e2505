//! Offline indexing pipeline.
//!
//! For each configured server: open a temporary session, enumerate its
//! tools, build a description document per tool, enrich it through the
//! describer (falling back to the raw document), embed it, and upsert into
//! the vector store under a deterministic id. Records for tools that no
//! longer exist upstream are deleted.

mod document;
mod error;
mod indexer;
mod stats;

pub use document::description_document;
pub use error::{IndexerError, Result};
pub use indexer::{SessionToolSource, ToolIndexer, ToolSource};
pub use stats::{IndexOutcome, IndexReport};
