use crate::error::{LlmError, Result};
use crate::ports::{Describer, Embedder, Vision};
use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DESCRIBE_MAX_TOKENS: u32 = 384;

const DESCRIBE_TOOL_PROMPT: &str = "You write search documents for software tools. \
Rewrite the following tool description into one dense paragraph that states what the tool does, \
when to use it, and what its parameters mean. Mention the server it belongs to. \
No markdown, no lists, no preamble.";

const EXPAND_QUERY_PROMPT: &str = "Expand the following tool-search query into a short, \
information-dense sentence naming the capability being looked for and likely synonyms. \
Reply with the expanded query only.";

const VISION_PROMPT: &str = "Describe this image in two or three sentences so a reader who \
cannot see it understands its content.";

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    pub descriptor_model: String,
    pub vision_model: String,
    pub dimensions: usize,
}

/// One client implements all three ports; embeddings and chat completions
/// share the connection pool.
pub struct OpenAiClient {
    http: reqwest::Client,
    config: OpenAiConfig,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: serde_json::Value,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// POST with a single retry on transport-level failures. HTTP error
    /// statuses are not retried; the provider already saw the request.
    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        let mut last_transport_error = None;
        for attempt in 0..2 {
            if attempt > 0 {
                log::warn!("retrying LLM request to {path} after transport error");
            }
            let sent = self
                .http
                .post(self.url(path))
                .bearer_auth(&self.config.api_key)
                .json(body)
                .send()
                .await;
            let response = match sent {
                Ok(response) => response,
                Err(e) => {
                    last_transport_error = Some(LlmError::Transport(e.to_string()));
                    continue;
                }
            };
            let status = response.status();
            let raw = response
                .text()
                .await
                .map_err(|e| LlmError::Transport(e.to_string()))?;
            if !status.is_success() {
                return Err(LlmError::Http {
                    status: status.as_u16(),
                    body: raw,
                });
            }
            return serde_json::from_str(&raw).map_err(|e| LlmError::Decode(e.to_string()));
        }
        Err(last_transport_error.unwrap_or_else(|| LlmError::Transport("unreachable".into())))
    }

    async fn chat(&self, model: &str, messages: Vec<ChatMessage>) -> Result<String> {
        let request = ChatRequest {
            model,
            messages,
            max_tokens: DESCRIBE_MAX_TOKENS,
        };
        let response: ChatResponse = self.post_json("chat/completions", &request).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(LlmError::EmptyResponse { expected: 1 })?;
        Ok(content)
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbeddingRequest {
            input: texts,
            model: &self.config.embedding_model,
            dimensions: self.config.dimensions,
        };
        let response: EmbeddingResponse = self.post_json("embeddings", &request).await?;
        if response.data.len() != texts.len() {
            return Err(LlmError::EmptyResponse {
                expected: texts.len(),
            });
        }

        let mut items = response.data;
        items.sort_by_key(|item| item.index);
        for item in &items {
            if item.embedding.len() != self.config.dimensions {
                return Err(LlmError::DimensionMismatch {
                    expected: self.config.dimensions,
                    actual: item.embedding.len(),
                });
            }
        }
        Ok(items.into_iter().map(|item| item.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }
}

#[async_trait]
impl Describer for OpenAiClient {
    async fn describe_tool(&self, document: &str) -> Result<String> {
        self.chat(
            &self.config.descriptor_model,
            vec![ChatMessage {
                role: "user",
                content: serde_json::Value::String(format!("{DESCRIBE_TOOL_PROMPT}\n\n{document}")),
            }],
        )
        .await
    }

    async fn expand_query(&self, query: &str) -> Result<String> {
        self.chat(
            &self.config.descriptor_model,
            vec![ChatMessage {
                role: "user",
                content: serde_json::Value::String(format!("{EXPAND_QUERY_PROMPT}\n\n{query}")),
            }],
        )
        .await
    }
}

#[async_trait]
impl Vision for OpenAiClient {
    async fn describe_image(&self, bytes: &[u8], mime: &str) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        let content = serde_json::json!([
            {"type": "text", "text": VISION_PROMPT},
            {"type": "image_url", "image_url": {"url": format!("data:{mime};base64,{encoded}")}}
        ]);
        self.chat(
            &self.config.vision_model,
            vec![ChatMessage {
                role: "user",
                content,
            }],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_response_parses_and_preserves_input_order() {
        let raw = r#"{"data": [
            {"index": 1, "embedding": [0.4, 0.5]},
            {"index": 0, "embedding": [0.1, 0.2]}
        ]}"#;
        let mut response: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        response.data.sort_by_key(|item| item.index);
        assert_eq!(response.data[0].embedding, vec![0.1, 0.2]);
        assert_eq!(response.data[1].embedding, vec![0.4, 0.5]);
    }

    #[test]
    fn chat_response_yields_trimmed_content() {
        let raw = r#"{"choices": [{"message": {"content": "  expanded query \n"}}]}"#;
        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        let content = response.choices[0].message.content.as_deref().unwrap();
        assert_eq!(content.trim(), "expanded query");
    }

    #[test]
    fn base_url_joins_without_double_slash() {
        let client = OpenAiClient::new(OpenAiConfig {
            api_key: "k".into(),
            base_url: "https://api.openai.com/v1/".into(),
            embedding_model: "text-embedding-3-small".into(),
            descriptor_model: "gpt-4.1-mini".into(),
            vision_model: "gpt-4.1-mini".into(),
            dimensions: 1024,
        })
        .unwrap();
        assert_eq!(client.url("embeddings"), "https://api.openai.com/v1/embeddings");
    }
}
