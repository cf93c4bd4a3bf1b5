//! The refinement pipeline: rank categories, compose the instruction prompt,
//! ask the completion provider for the rewrite.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use golden_rule_llm::{CompletionProvider, CompletionRequest, REFINE_TEMPERATURE};
use golden_rule_patterns::{EditCategory, PromptComposer, RetrievalEngine, RetrievalError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RefineError {
    #[error("embedding failed: {0}")]
    Embedding(golden_rule_embed::ProviderError),
    #[error("retrieval failed: {0}")]
    Retrieval(RetrievalError),
    #[error("completion failed: {0}")]
    Completion(#[from] golden_rule_llm::ProviderError),
    #[error("completion provider returned an empty rewrite")]
    EmptyRewrite,
    #[error("refinement timed out after {0:?}")]
    Timeout(Duration),
}

impl From<RetrievalError> for RefineError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::Embedding(inner) => Self::Embedding(inner),
            other => Self::Retrieval(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    pub text: String,
    /// Categories whose patterns shaped the prompt, best match first.
    pub categories: Vec<EditCategory>,
}

pub struct Refiner {
    engine: RetrievalEngine,
    composer: PromptComposer,
    completion: Arc<dyn CompletionProvider>,
    timeout: Option<Duration>,
}

impl fmt::Debug for Refiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refiner")
            .field("engine", &self.engine)
            .field("completion", &self.completion.name())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Refiner {
    pub fn new(
        engine: RetrievalEngine,
        composer: PromptComposer,
        completion: Arc<dyn CompletionProvider>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            engine,
            composer,
            completion,
            timeout,
        }
    }

    /// Number of categories with a fingerprint.
    pub fn category_count(&self) -> usize {
        self.engine.len()
    }

    /// Refines `text`. Blank input yields `Ok(None)` without contacting
    /// either provider.
    pub async fn refine(&self, text: &str) -> Result<Option<Refinement>, RefineError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let started = Instant::now();
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(text))
                .await
                .unwrap_or_else(|_| Err(RefineError::Timeout(limit))),
            None => self.run(text).await,
        };
        match &outcome {
            Ok(refinement) => tracing::info!(
                categories = ?refinement.categories,
                input_chars = text.chars().count(),
                output_chars = refinement.text.chars().count(),
                elapsed_ms = started.elapsed().as_millis(),
                "refinement complete"
            ),
            Err(err) => tracing::warn!(
                error = %err,
                elapsed_ms = started.elapsed().as_millis(),
                "refinement failed"
            ),
        }
        outcome.map(Some)
    }

    async fn run(&self, text: &str) -> Result<Refinement, RefineError> {
        let categories = self.engine.rank(text).await?;
        tracing::debug!(?categories, "ranked edit categories");
        let prompt = self.composer.compose(text, &categories);
        let request = CompletionRequest::user(prompt).with_temperature(REFINE_TEMPERATURE);
        let response = self.completion.complete(request).await?;
        if response.text.is_empty() {
            return Err(RefineError::EmptyRewrite);
        }
        Ok(Refinement {
            text: response.text,
            categories,
        })
    }
}
