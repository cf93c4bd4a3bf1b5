use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{EmbeddingRequest, EmbeddingResponse, EmbeddingTask};

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError>;

    /// Embeds a single text and returns its vector.
    async fn embed_one(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>, ProviderError> {
        let response = self
            .embed(EmbeddingRequest::single(text).with_task(task))
            .await?;
        response
            .vectors
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("empty embedding vector".to_string()))
    }
}
