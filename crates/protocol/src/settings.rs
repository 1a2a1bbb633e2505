use crate::error::{Result, RouterError};
use std::path::PathBuf;
use std::str::FromStr;

/// Runtime settings, read from the environment once at startup and passed
/// down as explicit constructor arguments.
#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: String,
    pub openai_base_url: String,

    /// Exactly one of these selects the vector-store backend.
    pub qdrant_url: Option<String>,
    pub qdrant_storage_path: Option<PathBuf>,

    pub content_storage_path: PathBuf,

    pub embedding_model: String,
    pub descriptor_model: String,
    pub vision_model: String,

    pub max_result_tokens: usize,
    pub describe_images: bool,
    pub dimensions: usize,

    pub collection_name: String,
    pub idle_ttl_seconds: u64,
    pub call_timeout_seconds: u64,
    pub task_pool_workers: usize,
    pub task_queue_size: usize,
}

fn required(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RouterError::config(format!("{name} must be set")))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(name: &str, default: T) -> Result<T> {
    match optional(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| RouterError::config(format!("{name}: invalid value '{raw}'"))),
    }
}

fn flag(name: &str, default: bool) -> bool {
    match optional(name) {
        None => default,
        Some(raw) => !(raw == "0" || raw.eq_ignore_ascii_case("false")),
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let qdrant_url = optional("QDRANT_URL");
        let qdrant_storage_path = optional("QDRANT_STORAGE_PATH").map(PathBuf::from);
        if qdrant_url.is_none() && qdrant_storage_path.is_none() {
            return Err(RouterError::config(
                "one of QDRANT_URL or QDRANT_STORAGE_PATH must be set",
            ));
        }

        Ok(Self {
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_base_url: optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            qdrant_url,
            qdrant_storage_path,
            content_storage_path: PathBuf::from(required("CONTENT_STORAGE_PATH")?),
            embedding_model: optional("EMBEDDING_MODEL_NAME")
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            descriptor_model: optional("DESCRIPTOR_MODEL_NAME")
                .unwrap_or_else(|| "gpt-4.1-mini".to_string()),
            vision_model: optional("VISION_MODEL_NAME")
                .unwrap_or_else(|| "gpt-4.1-mini".to_string()),
            max_result_tokens: parsed("MAX_RESULT_TOKENS", 5_000)?,
            describe_images: flag("DESCRIBE_IMAGES", true),
            dimensions: parsed("DIMENSIONS", 1_024)?,
            collection_name: optional("INDEX_COLLECTION_NAME")
                .unwrap_or_else(|| "mcp_tools".to_string()),
            idle_ttl_seconds: parsed("SERVER_IDLE_TTL_SECONDS", 300)?,
            call_timeout_seconds: parsed("CALL_TIMEOUT_SECONDS", 120)?,
            task_pool_workers: parsed("TASK_POOL_WORKERS", 4)?,
            task_queue_size: parsed("TASK_POOL_QUEUE_SIZE", 1_024)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Settings tests mutate the process environment; keep them in one test
    // so they cannot race each other under the parallel test runner.
    #[test]
    fn settings_from_env_round_trip() {
        let vars = [
            ("OPENAI_API_KEY", "sk-test"),
            ("QDRANT_STORAGE_PATH", "/tmp/qdrant"),
            ("CONTENT_STORAGE_PATH", "/tmp/content"),
            ("MAX_RESULT_TOKENS", "123"),
            ("DESCRIBE_IMAGES", "false"),
            ("DIMENSIONS", "256"),
        ];
        for (k, v) in vars {
            std::env::set_var(k, v);
        }

        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.openai_api_key, "sk-test");
        assert_eq!(settings.openai_base_url, "https://api.openai.com/v1");
        assert_eq!(settings.qdrant_storage_path, Some(PathBuf::from("/tmp/qdrant")));
        assert_eq!(settings.max_result_tokens, 123);
        assert!(!settings.describe_images);
        assert_eq!(settings.dimensions, 256);
        assert_eq!(settings.embedding_model, "text-embedding-3-small");
        assert_eq!(settings.idle_ttl_seconds, 300);
        assert_eq!(settings.task_pool_workers, 4);

        std::env::set_var("MAX_RESULT_TOKENS", "not-a-number");
        let err = Settings::from_env().unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::ConfigError);
        std::env::remove_var("MAX_RESULT_TOKENS");

        std::env::remove_var("QDRANT_STORAGE_PATH");
        let err = Settings::from_env().unwrap_err();
        assert!(err.message.contains("QDRANT_URL"));

        for (k, _) in vars {
            std::env::remove_var(k);
        }
    }
}
