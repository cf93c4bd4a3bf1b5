use std::time::Duration;

use crate::error::ProviderError;

#[derive(Debug, Clone)]
pub struct OpenAiChatConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl OpenAiChatConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com".to_string(),
            model: model.into(),
            timeout: Duration::from_secs(90),
        }
    }
}

#[derive(Debug, Clone)]
pub enum CompletionProviderConfig {
    OpenAiCompatible(OpenAiChatConfig),
}

impl CompletionProviderConfig {
    /// Reads `GOLDEN_RULE_LLM_API_KEY` (falling back to `OPENAI_API_KEY`),
    /// `GOLDEN_RULE_LLM_MODEL`, `GOLDEN_RULE_LLM_BASE_URL` and
    /// `GOLDEN_RULE_LLM_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = env_string("GOLDEN_RULE_LLM_API_KEY")
            .or_else(|| env_string("OPENAI_API_KEY"))
            .ok_or_else(|| {
                ProviderError::Config(
                    "GOLDEN_RULE_LLM_API_KEY or OPENAI_API_KEY is not configured".to_string(),
                )
            })?;
        let model =
            env_string("GOLDEN_RULE_LLM_MODEL").unwrap_or_else(|| "gpt-4-turbo-preview".to_string());
        let mut cfg = OpenAiChatConfig::new(api_key, model);
        if let Some(base_url) = env_string("GOLDEN_RULE_LLM_BASE_URL") {
            cfg.base_url = base_url;
        }
        if let Some(ms) = env_string("GOLDEN_RULE_LLM_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok())
        {
            cfg.timeout = Duration::from_millis(ms.clamp(1_000, 600_000));
        }
        Ok(Self::OpenAiCompatible(cfg))
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
