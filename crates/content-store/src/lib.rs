//! Durable content store for offloaded tool results.
//!
//! Large text payloads are split into ordered chunks, binary payloads are
//! stored verbatim, and every ref gets a `manifest.json` sidecar. Writes go
//! through a temp directory and are renamed into place so readers see either
//! a complete ref or none at all.

mod error;
mod store;

pub use error::{ContentStoreError, Result};
pub use store::{ContentChunk, ContentStore, TextOutcome, PREVIEW_CHARS};
