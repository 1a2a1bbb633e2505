use rmcp::model::Content;
use router_content_store::PREVIEW_CHARS;
use router_protocol::{EnvelopePart, ResultEnvelope};

/// Render a processed envelope as MCP text content parts, preserving
/// upstream part order.
pub fn envelope_contents(envelope: &ResultEnvelope) -> Vec<Content> {
    envelope.parts.iter().map(part_content).collect()
}

fn part_content(part: &EnvelopePart) -> Content {
    match part {
        EnvelopePart::InlineText { text } => Content::text(text.clone()),
        EnvelopePart::ContentRefPreview {
            ref_id,
            kind,
            preview,
            total_chunks,
            mime,
        } => {
            let mut text = format!(
                "[offloaded {}] Reference: {ref_id}\nmime: {mime}, chunks: {total_chunks}\n",
                kind.as_str()
            );
            if !preview.is_empty() {
                text.push_str(&format!("preview (first {PREVIEW_CHARS} chars):\n{preview}\n"));
            }
            text.push_str(&format!(
                "Retrieve with get_content(ref_id: '{ref_id}', chunk_index: 0..{})",
                total_chunks.saturating_sub(1)
            ));
            Content::text(text)
        }
    }
}

/// Render a serializable value as one pretty-JSON text part.
pub fn json_content<T: serde::Serialize>(value: &T) -> Vec<Content> {
    vec![Content::text(
        serde_json::to_string_pretty(value).unwrap_or_default(),
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use router_protocol::ContentKind;

    #[test]
    fn ref_preview_mentions_reference_and_retrieval_route() {
        let envelope = ResultEnvelope {
            parts: vec![EnvelopePart::ContentRefPreview {
                ref_id: "abc-123".into(),
                kind: ContentKind::TextChunked,
                preview: "first words".into(),
                total_chunks: 4,
                mime: "text/plain".into(),
            }],
        };
        let contents = envelope_contents(&envelope);
        assert_eq!(contents.len(), 1);
        let text = contents[0].as_text().map(|t| t.text.clone()).unwrap_or_default();
        assert!(text.contains("Reference: abc-123"));
        assert!(text.contains("first words"));
        assert!(text.contains("get_content"));
        assert!(text.contains("chunks: 4"));
    }
}
