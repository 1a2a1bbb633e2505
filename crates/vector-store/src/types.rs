use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Payload stored alongside each tool vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolPayload {
    pub server_name: String,
    pub tool_name: String,
    pub original_description: String,
    pub input_schema: serde_json::Value,
    pub enriched_description: String,
    pub blocked: bool,
}

/// One record in the collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: ToolPayload,
}

/// A search hit, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTool {
    pub id: String,
    pub score: f32,
    pub payload: ToolPayload,
}

/// A record as returned by `scroll`; vectors stay in the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTool {
    pub id: String,
    pub payload: ToolPayload,
}

/// Record filter. Blocked tools are intentionally not filterable here:
/// they stay discoverable and are refused at execution time instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolFilter {
    pub server_name: Option<String>,
}

impl ToolFilter {
    pub fn server(name: impl Into<String>) -> Self {
        Self {
            server_name: Some(name.into()),
        }
    }

    pub fn matches(&self, payload: &ToolPayload) -> bool {
        match &self.server_name {
            Some(server) => payload.server_name == *server,
            None => true,
        }
    }
}

/// Deterministic point id for a tool: a UUID carved out of the SHA-256 of
/// `"{server}::{tool}"`, so re-indexing upserts in place.
pub fn tool_point_id(server_name: &str, tool_name: &str) -> String {
    let digest = Sha256::digest(format!("{server_name}::{tool_name}").as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}
