use std::time::Duration;

use crate::error::ProviderError;

const DEFAULT_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Clone)]
pub struct OpenAiCompatibleConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub task_similarity: Option<String>,
    pub normalized_default: Option<bool>,
}

impl OpenAiCompatibleConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com".to_string(),
            model: model.into(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            task_similarity: None,
            normalized_default: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub enum EmbeddingProviderConfig {
    OpenAiCompatible(OpenAiCompatibleConfig),
    Jina(OpenAiCompatibleConfig),
    Gemini(GeminiConfig),
}

impl EmbeddingProviderConfig {
    /// Reads the provider selection from `GOLDEN_RULE_EMBED_*` variables.
    ///
    /// `GOLDEN_RULE_EMBED_PROVIDER` picks `openai-compatible` (default),
    /// `jina` or `gemini`. The API key falls back to the provider's
    /// conventional variable (`OPENAI_API_KEY`, `JINA_API_KEY`,
    /// `GEMINI_API_KEY`).
    pub fn from_env() -> Result<Self, ProviderError> {
        let provider = env_string("GOLDEN_RULE_EMBED_PROVIDER")
            .unwrap_or_else(|| "openai-compatible".to_string())
            .to_ascii_lowercase();
        let timeout = Duration::from_millis(
            env_string("GOLDEN_RULE_EMBED_TIMEOUT_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(DEFAULT_TIMEOUT_MS)
                .clamp(500, 300_000),
        );
        let base_url = env_string("GOLDEN_RULE_EMBED_BASE_URL");
        let model = env_string("GOLDEN_RULE_EMBED_MODEL");

        match provider.as_str() {
            "openai-compatible" | "openai" => {
                let api_key = api_key_from_env("OPENAI_API_KEY")?;
                let mut cfg = OpenAiCompatibleConfig::new(
                    api_key,
                    model.unwrap_or_else(|| "text-embedding-3-small".to_string()),
                );
                if let Some(base_url) = base_url {
                    cfg.base_url = base_url;
                }
                cfg.timeout = timeout;
                Ok(Self::OpenAiCompatible(cfg))
            }
            "jina" => {
                let api_key = api_key_from_env("JINA_API_KEY")?;
                let mut cfg = OpenAiCompatibleConfig::new(
                    api_key,
                    model.unwrap_or_else(|| "jina-embeddings-v3".to_string()),
                );
                cfg.base_url = base_url.unwrap_or_else(|| "https://api.jina.ai".to_string());
                cfg.task_similarity = Some("text-matching".to_string());
                cfg.timeout = timeout;
                Ok(Self::Jina(cfg))
            }
            "gemini" => {
                let api_key = api_key_from_env("GEMINI_API_KEY")?;
                let mut cfg = GeminiConfig::new(
                    api_key,
                    model.unwrap_or_else(|| "gemini-embedding-001".to_string()),
                );
                if let Some(base_url) = base_url {
                    cfg.base_url = base_url;
                }
                cfg.timeout = timeout;
                Ok(Self::Gemini(cfg))
            }
            other => Err(ProviderError::Config(format!(
                "unsupported embedding provider `{other}`; use openai-compatible, jina, or gemini"
            ))),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn api_key_from_env(fallback: &str) -> Result<String, ProviderError> {
    env_string("GOLDEN_RULE_EMBED_API_KEY")
        .or_else(|| env_string(fallback))
        .ok_or_else(|| {
            ProviderError::Config(format!(
                "GOLDEN_RULE_EMBED_API_KEY or {fallback} is not configured"
            ))
        })
}
