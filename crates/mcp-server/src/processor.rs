use base64::Engine as _;
use router_content_store::{ContentStore, TextOutcome};
use router_llm::Vision;
use router_protocol::{
    ContentKind, EnvelopePart, ErrorKind, RawPart, RawToolResult, Result, ResultEnvelope,
    RouterError,
};
use std::sync::Arc;
use uuid::Uuid;

/// Post-processes raw upstream tool results into bounded envelopes.
///
/// Text passes through the content store's inline/offload decision; binary
/// parts are always offloaded. Part order is preserved. All refs produced
/// by one call share a call id in their manifests.
pub struct ResultProcessor {
    content: Arc<ContentStore>,
    vision: Option<Arc<dyn Vision>>,
}

impl ResultProcessor {
    pub fn new(content: Arc<ContentStore>, vision: Option<Arc<dyn Vision>>) -> Self {
        Self { content, vision }
    }

    pub async fn process(&self, raw: RawToolResult) -> Result<ResultEnvelope> {
        let call_id = Uuid::new_v4().to_string();
        let mut parts = Vec::with_capacity(raw.parts.len());
        for part in raw.parts {
            parts.push(self.process_part(part, &call_id).await?);
        }
        Ok(ResultEnvelope { parts })
    }

    async fn process_part(&self, part: RawPart, call_id: &str) -> Result<EnvelopePart> {
        match part {
            RawPart::Text { text } => {
                match self
                    .content
                    .put_text(&text, Some(call_id))
                    .await
                    .map_err(storage_error)?
                {
                    TextOutcome::Inline(text) => Ok(EnvelopePart::InlineText { text }),
                    TextOutcome::Offloaded { reference, preview } => {
                        Ok(EnvelopePart::ContentRefPreview {
                            ref_id: reference.ref_id,
                            kind: reference.kind,
                            preview,
                            total_chunks: reference.total_chunks,
                            mime: reference.mime,
                        })
                    }
                }
            }
            RawPart::Image { data, mime } => {
                let bytes = decode_base64(&data)?;
                let reference = self
                    .content
                    .put_binary(bytes.clone(), &mime, ContentKind::Image, Some(call_id))
                    .await
                    .map_err(storage_error)?;

                let preview = match &self.vision {
                    Some(vision) => match vision.describe_image(&bytes, &mime).await {
                        Ok(description) => {
                            self.content
                                .set_vision_description(&reference.ref_id, &description)
                                .await
                                .map_err(storage_error)?;
                            description
                        }
                        Err(e) => {
                            // A missing caption degrades the preview, not
                            // the call.
                            log::warn!("vision description failed: {e}");
                            String::new()
                        }
                    },
                    None => String::new(),
                };

                Ok(EnvelopePart::ContentRefPreview {
                    ref_id: reference.ref_id,
                    kind: ContentKind::Image,
                    preview,
                    total_chunks: reference.total_chunks,
                    mime: reference.mime,
                })
            }
            RawPart::Audio { data, mime } => {
                let bytes = decode_base64(&data)?;
                let reference = self
                    .content
                    .put_binary(bytes, &mime, ContentKind::Audio, Some(call_id))
                    .await
                    .map_err(storage_error)?;
                Ok(EnvelopePart::ContentRefPreview {
                    ref_id: reference.ref_id,
                    kind: ContentKind::Audio,
                    preview: String::new(),
                    total_chunks: reference.total_chunks,
                    mime: reference.mime,
                })
            }
            RawPart::Other { value } => Ok(EnvelopePart::InlineText {
                text: value.to_string(),
            }),
        }
    }
}

fn decode_base64(data: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| {
            RouterError::new(
                ErrorKind::ProtocolError,
                format!("invalid base64 payload from upstream: {e}"),
            )
        })
}

fn storage_error(e: router_content_store::ContentStoreError) -> RouterError {
    RouterError::new(ErrorKind::StorageError, e.to_string())
}
