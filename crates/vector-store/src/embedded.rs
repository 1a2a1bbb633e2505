use crate::error::{Result, VectorStoreError};
use crate::store::VectorStore;
use crate::types::{ScoredTool, StoredTool, ToolFilter, ToolPoint};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

const INDEX_FILE: &str = "tools.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedIndex {
    dimensions: usize,
    records: Vec<ToolPoint>,
}

struct EmbeddedState {
    dimensions: usize,
    records: BTreeMap<String, ToolPoint>,
}

/// JSON-persisted store with brute-force cosine scoring.
///
/// Fine for the catalog sizes this system indexes (hundreds of tools);
/// saves are atomic (temp file + rename) so a crashed process never leaves
/// a torn index behind.
pub struct EmbeddedStore {
    path: PathBuf,
    state: RwLock<EmbeddedState>,
}

impl EmbeddedStore {
    /// Open (or lazily create) the index under `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(INDEX_FILE);

        let state = match tokio::fs::read(&path).await {
            Ok(raw) => {
                let persisted: PersistedIndex = serde_json::from_slice(&raw)?;
                EmbeddedState {
                    dimensions: persisted.dimensions,
                    records: persisted
                        .records
                        .into_iter()
                        .map(|p| (p.id.clone(), p))
                        .collect(),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => EmbeddedState {
                dimensions: 0,
                records: BTreeMap::new(),
            },
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    async fn save(&self, state: &EmbeddedState) -> Result<()> {
        let persisted = PersistedIndex {
            dimensions: state.dimensions,
            records: state.records.values().cloned().collect(),
        };
        let raw = serde_json::to_vec(&persisted)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for EmbeddedStore {
    async fn ensure_ready(&self, dimensions: usize) -> Result<()> {
        let mut state = self.state.write().await;
        if state.dimensions == 0 {
            state.dimensions = dimensions;
            self.save(&state).await?;
        } else if state.dimensions != dimensions {
            return Err(VectorStoreError::InvalidDimension {
                expected: state.dimensions,
                actual: dimensions,
            });
        }
        Ok(())
    }

    async fn upsert(&self, points: Vec<ToolPoint>) -> Result<()> {
        let mut state = self.state.write().await;
        for point in points {
            if state.dimensions != 0 && point.vector.len() != state.dimensions {
                return Err(VectorStoreError::InvalidDimension {
                    expected: state.dimensions,
                    actual: point.vector.len(),
                });
            }
            state.records.insert(point.id.clone(), point);
        }
        self.save(&state).await
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filter: &ToolFilter,
    ) -> Result<Vec<ScoredTool>> {
        let state = self.state.read().await;
        if state.dimensions != 0 && query_vector.len() != state.dimensions {
            return Err(VectorStoreError::InvalidDimension {
                expected: state.dimensions,
                actual: query_vector.len(),
            });
        }

        let mut hits: Vec<ScoredTool> = state
            .records
            .values()
            .filter(|point| filter.matches(&point.payload))
            .map(|point| ScoredTool {
                id: point.id.clone(),
                score: cosine(query_vector, &point.vector),
                payload: point.payload.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn scroll(&self, filter: &ToolFilter) -> Result<Vec<StoredTool>> {
        let state = self.state.read().await;
        let mut records: Vec<StoredTool> = state
            .records
            .values()
            .filter(|point| filter.matches(&point.payload))
            .map(|point| StoredTool {
                id: point.id.clone(),
                payload: point.payload.clone(),
            })
            .collect();
        records.sort_by(|a, b| {
            (&a.payload.server_name, &a.payload.tool_name)
                .cmp(&(&b.payload.server_name, &b.payload.tool_name))
        });
        Ok(records)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut state = self.state.write().await;
        for id in ids {
            state.records.remove(id);
        }
        self.save(&state).await
    }

    async fn delete_by_server(&self, server_name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .records
            .retain(|_, point| point.payload.server_name != server_name);
        self.save(&state).await
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.state.read().await.records.len())
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.6, 0.8];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn cosine_handles_zero_vector() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
