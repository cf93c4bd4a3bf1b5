use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::OpenAiChatConfig;
use crate::error::ProviderError;
use crate::traits::CompletionProvider;
use crate::types::{CompletionRequest, CompletionResponse};

#[derive(Clone)]
pub struct OpenAiChatProvider {
    config: OpenAiChatConfig,
    client: Client,
}

impl OpenAiChatProvider {
    pub fn new(config: OpenAiChatConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn build_payload<'a>(&'a self, request: &'a CompletionRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: request.temperature,
        }
    }
}

#[async_trait::async_trait]
impl CompletionProvider for OpenAiChatProvider {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        if request.messages.is_empty() {
            return Err(ProviderError::Config(
                "completion request has no messages".to_string(),
            ));
        }

        let res = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&self.build_payload(&request))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        let parsed: ChatResponse = res.json().await?;
        parse_first_choice(parsed, self.name(), &self.config.model)
    }
}

fn parse_first_choice(
    parsed: ChatResponse,
    provider: &str,
    fallback_model: &str,
) -> Result<CompletionResponse, ProviderError> {
    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::InvalidResponse("no choices in response".to_string()))?;
    Ok(CompletionResponse {
        provider: provider.to_string(),
        model: parsed.model.unwrap_or_else(|| fallback_model.to_string()),
        text: text.trim().to_string(),
        usage_tokens: parsed.usage.and_then(|u| u.total_tokens),
    })
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: Option<u64>,
}
