use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::GeminiConfig;
use crate::error::ProviderError;
use crate::traits::EmbeddingProvider;
use crate::types::{EmbeddingRequest, EmbeddingResponse, EmbeddingTask};

#[derive(Clone)]
pub struct GeminiEmbeddingProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiEmbeddingProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn batch_embed_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:batchEmbedContents",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
        )
    }

    const fn map_task(task: Option<EmbeddingTask>) -> Option<&'static str> {
        match task {
            Some(EmbeddingTask::Similarity) => Some("SEMANTIC_SIMILARITY"),
            None => None,
        }
    }

    fn build_payload(&self, request: &EmbeddingRequest) -> GeminiBatchEmbedRequest {
        let task_type = Self::map_task(request.task);
        let requests = request
            .inputs
            .iter()
            .map(|input| GeminiEmbedRequest {
                model: format!("models/{}", self.config.model),
                content: Content {
                    parts: vec![Part {
                        text: input.clone(),
                    }],
                },
                task_type,
            })
            .collect();
        GeminiBatchEmbedRequest { requests }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        if request.inputs.is_empty() {
            return Err(ProviderError::Config(
                "embedding input is empty".to_string(),
            ));
        }

        // The batch endpoint also serves single inputs, so one code path is enough.
        let res = self
            .client
            .post(self.batch_embed_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&self.build_payload(&request))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        let parsed: GeminiBatchEmbedResponse = res.json().await?;
        if parsed.embeddings.len() != request.inputs.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                request.inputs.len(),
                parsed.embeddings.len()
            )));
        }

        Ok(EmbeddingResponse {
            provider: self.name().to_string(),
            model: self.config.model.clone(),
            vectors: parsed.embeddings.into_iter().map(|e| e.values).collect(),
            usage_tokens: None,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiEmbedRequest {
    model: String,
    content: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_type: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct GeminiBatchEmbedRequest {
    requests: Vec<GeminiEmbedRequest>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiBatchEmbedResponse {
    embeddings: Vec<GeminiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedding {
    values: Vec<f32>,
}
