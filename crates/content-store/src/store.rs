use crate::error::{ContentStoreError, Result};
use router_protocol::{estimate_tokens, ContentKind, ContentRef};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Preview length for offloaded text, in characters.
pub const PREVIEW_CHARS: usize = 500;

const MANIFEST_FILE: &str = "manifest.json";
const TMP_PREFIX: &str = ".tmp-";

/// Result of `put_text`: small payloads stay inline, large ones are
/// offloaded and come back as a ref plus a preview.
#[derive(Debug, Clone, PartialEq)]
pub enum TextOutcome {
    Inline(String),
    Offloaded {
        reference: ContentRef,
        preview: String,
    },
}

/// One retrieved chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentChunk {
    Text(String),
    Binary(Vec<u8>),
}

/// Filesystem-backed blob store rooted at one directory, one subdirectory
/// per ref.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
    max_result_tokens: usize,
}

impl ContentStore {
    pub async fn new(root: impl AsRef<Path>, max_result_tokens: usize) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            max_result_tokens,
        })
    }

    /// Store text, inlining when it fits the token budget.
    ///
    /// Chunk size is `max_result_tokens * 4` characters, matching the
    /// `estimate_tokens` heuristic, so each chunk fits the budget on read.
    pub async fn put_text(&self, text: &str, call_id: Option<&str>) -> Result<TextOutcome> {
        if estimate_tokens(text) <= self.max_result_tokens {
            return Ok(TextOutcome::Inline(text.to_string()));
        }

        let chunks = chunk_text(text, self.max_result_tokens * 4);
        let reference = ContentRef {
            ref_id: Uuid::new_v4().to_string(),
            kind: ContentKind::TextChunked,
            total_chunks: chunks.len(),
            mime: "text/plain".to_string(),
            size_bytes: text.len(),
            vision_description: None,
            created_at: unix_now(),
            call_id: call_id.map(str::to_string),
        };

        self.publish(&reference, |tmp| {
            let chunks = chunks.clone();
            async move {
                for (index, chunk) in chunks.iter().enumerate() {
                    tokio::fs::write(tmp.join(chunk_file_name(ContentKind::TextChunked, index)), chunk)
                        .await?;
                }
                Ok(())
            }
        })
        .await?;

        let preview: String = chunks[0].chars().take(PREVIEW_CHARS).collect();
        Ok(TextOutcome::Offloaded { reference, preview })
    }

    /// Store a binary payload verbatim as a single-chunk ref.
    pub async fn put_binary(
        &self,
        bytes: Vec<u8>,
        mime: &str,
        kind: ContentKind,
        call_id: Option<&str>,
    ) -> Result<ContentRef> {
        let reference = ContentRef {
            ref_id: Uuid::new_v4().to_string(),
            kind,
            total_chunks: 1,
            mime: mime.to_string(),
            size_bytes: bytes.len(),
            vision_description: None,
            created_at: unix_now(),
            call_id: call_id.map(str::to_string),
        };

        self.publish(&reference, |tmp| {
            let bytes = bytes.clone();
            async move {
                tokio::fs::write(tmp.join(chunk_file_name(kind, 0)), &bytes).await?;
                Ok(())
            }
        })
        .await?;

        Ok(reference)
    }

    /// Attach a vision description to an already-published ref by rewriting
    /// its manifest. The payload chunks stay untouched.
    pub async fn set_vision_description(&self, ref_id: &str, description: &str) -> Result<ContentRef> {
        let mut manifest = self.manifest(ref_id).await?;
        manifest.vision_description = Some(description.to_string());
        let raw = serde_json::to_vec_pretty(&manifest)?;
        tokio::fs::write(self.ref_dir(ref_id)?.join(MANIFEST_FILE), raw).await?;
        Ok(manifest)
    }

    /// Fetch one chunk and the ref's manifest.
    pub async fn get(&self, ref_id: &str, chunk_index: usize) -> Result<(ContentChunk, ContentRef)> {
        let manifest = self.manifest(ref_id).await?;
        if chunk_index >= manifest.total_chunks {
            return Err(ContentStoreError::OutOfRange {
                requested: chunk_index,
                total: manifest.total_chunks,
            });
        }

        let path = self
            .ref_dir(ref_id)?
            .join(chunk_file_name(manifest.kind, chunk_index));
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| ContentStoreError::NotFound(ref_id.to_string()))?;

        let chunk = match manifest.kind {
            ContentKind::TextChunked => ContentChunk::Text(
                String::from_utf8(bytes)
                    .map_err(|_| ContentStoreError::NotFound(ref_id.to_string()))?,
            ),
            _ => ContentChunk::Binary(bytes),
        };
        Ok((chunk, manifest))
    }

    /// Enumerate all published refs. Unreadable manifests are skipped.
    pub async fn list_refs(&self) -> Result<Vec<ContentRef>> {
        let mut refs = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(TMP_PREFIX) || !entry.file_type().await?.is_dir() {
                continue;
            }
            match self.manifest(&name).await {
                Ok(manifest) => refs.push(manifest),
                Err(e) => log::warn!("skipping unreadable content ref '{name}': {e}"),
            }
        }
        refs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.ref_id.cmp(&b.ref_id)));
        Ok(refs)
    }

    /// Remove one ref. Returns false when it did not exist.
    pub async fn delete(&self, ref_id: &str) -> Result<bool> {
        let dir = self.ref_dir(ref_id)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every ref, returning how many were deleted.
    pub async fn clear(&self) -> Result<usize> {
        let refs = self.list_refs().await?;
        let mut removed = 0;
        for reference in refs {
            if self.delete(&reference.ref_id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn manifest(&self, ref_id: &str) -> Result<ContentRef> {
        let path = self.ref_dir(ref_id)?.join(MANIFEST_FILE);
        let raw = tokio::fs::read(&path)
            .await
            .map_err(|_| ContentStoreError::NotFound(ref_id.to_string()))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    fn ref_dir(&self, ref_id: &str) -> Result<PathBuf> {
        // Refs are UUID-shaped; anything path-like is treated as unknown.
        if ref_id.is_empty()
            || ref_id
                .chars()
                .any(|c| !(c.is_ascii_alphanumeric() || c == '-'))
        {
            return Err(ContentStoreError::NotFound(ref_id.to_string()));
        }
        Ok(self.root.join(ref_id))
    }

    /// Write a ref under a temp directory, then rename it into place.
    /// The temp directory is removed on any failure.
    async fn publish<F, Fut>(&self, reference: &ContentRef, write_chunks: F) -> Result<()>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let tmp = self
            .root
            .join(format!("{TMP_PREFIX}{}", reference.ref_id));
        tokio::fs::create_dir_all(&tmp).await?;

        let result: Result<()> = async {
            write_chunks(tmp.clone()).await?;
            let manifest = serde_json::to_vec_pretty(reference)?;
            tokio::fs::write(tmp.join(MANIFEST_FILE), manifest).await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            let _ = tokio::fs::remove_dir_all(&tmp).await;
            return Err(e);
        }

        let target = self.root.join(&reference.ref_id);
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_dir_all(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

fn chunk_file_name(kind: ContentKind, index: usize) -> String {
    match kind {
        ContentKind::TextChunked => format!("chunk_{index}.txt"),
        _ => format!("chunk_{index}.bin"),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Split text into ordered chunks of at most `max_chars` characters,
/// preserving every character exactly once.
fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == max_chars {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    if chunks.is_empty() {
        chunks.push(String::new());
    }
    chunks
}
