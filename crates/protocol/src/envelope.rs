use serde::{Deserialize, Serialize};

/// What kind of payload a content ref points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    TextChunked,
    Image,
    Audio,
    Binary,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::TextChunked => "text_chunked",
            ContentKind::Image => "image",
            ContentKind::Audio => "audio",
            ContentKind::Binary => "binary",
        }
    }
}

/// Durable record describing one offloaded payload.
///
/// Immutable once published; serialized as the `manifest.json` sidecar next
/// to the chunk files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentRef {
    pub ref_id: String,
    pub kind: ContentKind,
    pub total_chunks: usize,
    pub mime: String,
    pub size_bytes: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision_description: Option<String>,
    /// Unix seconds.
    pub created_at: u64,
    /// Groups all refs produced by one tool call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

/// One part of a processed tool result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnvelopePart {
    InlineText {
        text: String,
    },
    ContentRefPreview {
        ref_id: String,
        kind: ContentKind,
        preview: String,
        total_chunks: usize,
        mime: String,
    },
}

/// The bounded response object returned to the calling model.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ResultEnvelope {
    pub parts: Vec<EnvelopePart>,
}

impl ResultEnvelope {
    pub fn inline_text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![EnvelopePart::InlineText { text: text.into() }],
        }
    }
}

/// A raw content part as returned by an upstream MCP tool, decoupled from
/// the wire library's types. Order is preserved through processing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawPart {
    Text { text: String },
    /// Base64 payload as carried on the wire.
    Image { data: String, mime: String },
    Audio { data: String, mime: String },
    Other { value: serde_json::Value },
}

/// An upstream tool result before post-processing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawToolResult {
    pub parts: Vec<RawPart>,
    pub is_error: bool,
}

/// A tool as enumerated from an upstream server's `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parts_round_trip_as_tagged_json() {
        let envelope = ResultEnvelope {
            parts: vec![
                EnvelopePart::InlineText {
                    text: "hello".into(),
                },
                EnvelopePart::ContentRefPreview {
                    ref_id: "abc".into(),
                    kind: ContentKind::TextChunked,
                    preview: "first...".into(),
                    total_chunks: 4,
                    mime: "text/plain".into(),
                },
            ],
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["parts"][0]["type"], "inline_text");
        assert_eq!(json["parts"][1]["type"], "content_ref_preview");
        assert_eq!(json["parts"][1]["kind"], "text_chunked");
        let back: ResultEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn manifest_omits_absent_optionals() {
        let reference = ContentRef {
            ref_id: "r".into(),
            kind: ContentKind::Binary,
            total_chunks: 1,
            mime: "application/octet-stream".into(),
            size_bytes: 3,
            vision_description: None,
            created_at: 0,
            call_id: None,
        };
        let json = serde_json::to_string(&reference).unwrap();
        assert!(!json.contains("vision_description"));
        assert!(!json.contains("call_id"));
    }
}
