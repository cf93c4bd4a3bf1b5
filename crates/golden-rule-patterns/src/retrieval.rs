use std::fmt;
use std::sync::Arc;

use golden_rule_embed::{EmbeddingProvider, EmbeddingRequest, EmbeddingTask, ProviderError};
use thiserror::Error;

use crate::category::EditCategory;
use crate::fingerprint::{CategoryFingerprint, cosine_similarity};
use crate::store::PatternStore;

/// Number of patterns applied to one refinement.
pub const DEFAULT_TOP_N: usize = 3;

const EMBED_BATCH: usize = 64;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] ProviderError),
    #[error("embedding dimensions do not match: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding provider returned {actual} vectors for {expected} inputs")]
    VectorCount { expected: usize, actual: usize },
    #[error("category has no examples")]
    EmptyCategory,
    #[error("embedding provider returned an empty vector")]
    EmptyVector,
    #[error("pattern store has no usable categories")]
    NoCategories,
}

/// Ranks edit categories against a text by cosine similarity between the
/// text's embedding and each category's fingerprint.
///
/// Fingerprints are computed once and never change, so ranking the same
/// text twice yields the same order.
pub struct RetrievalEngine {
    fingerprints: Vec<CategoryFingerprint>,
    embedder: Arc<dyn EmbeddingProvider>,
    top_n: usize,
}

impl fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("categories", &self.fingerprints.len())
            .field("embedder", &self.embedder.name())
            .field("top_n", &self.top_n)
            .finish()
    }
}

impl RetrievalEngine {
    /// Embeds every example description and averages them per category.
    pub async fn build(
        store: &PatternStore,
        embedder: Arc<dyn EmbeddingProvider>,
        top_n: usize,
    ) -> Result<Self, RetrievalError> {
        let mut fingerprints = Vec::with_capacity(store.len());
        for (category, examples) in store.categories() {
            let descriptions = examples
                .iter()
                .map(|e| e.description.clone())
                .collect::<Vec<_>>();
            let mut vectors = Vec::with_capacity(descriptions.len());
            for chunk in descriptions.chunks(EMBED_BATCH) {
                let response = embedder
                    .embed(
                        EmbeddingRequest::batch(chunk.to_vec())
                            .with_task(EmbeddingTask::Similarity),
                    )
                    .await?;
                if response.vectors.len() != chunk.len() {
                    return Err(RetrievalError::VectorCount {
                        expected: chunk.len(),
                        actual: response.vectors.len(),
                    });
                }
                vectors.extend(response.vectors);
            }
            let fingerprint = CategoryFingerprint::from_vectors(category, &vectors)?;
            tracing::debug!(
                category = %category,
                examples = vectors.len(),
                dimensions = fingerprint.dimensions(),
                "category fingerprint computed"
            );
            fingerprints.push(fingerprint);
        }
        Self::with_fingerprints(fingerprints, embedder, top_n)
    }

    /// Builds an engine from precomputed fingerprints.
    pub fn with_fingerprints(
        mut fingerprints: Vec<CategoryFingerprint>,
        embedder: Arc<dyn EmbeddingProvider>,
        top_n: usize,
    ) -> Result<Self, RetrievalError> {
        let Some(first) = fingerprints.first() else {
            return Err(RetrievalError::NoCategories);
        };
        let dims = first.dimensions();
        if dims == 0 {
            return Err(RetrievalError::EmptyVector);
        }
        if let Some(bad) = fingerprints.iter().find(|f| f.dimensions() != dims) {
            return Err(RetrievalError::DimensionMismatch {
                expected: dims,
                actual: bad.dimensions(),
            });
        }
        fingerprints.sort_by_key(|f| f.category);
        fingerprints.dedup_by_key(|f| f.category);
        Ok(Self {
            fingerprints,
            embedder,
            top_n: top_n.max(1),
        })
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    /// Embeds `text` and returns the `top_n` most similar categories.
    pub async fn rank(&self, text: &str) -> Result<Vec<EditCategory>, RetrievalError> {
        let vector = self
            .embedder
            .embed_one(text, EmbeddingTask::Similarity)
            .await?;
        self.rank_vector(&vector)
    }

    /// Ranking without I/O: highest similarity first, ties in category order.
    pub fn rank_vector(&self, query: &[f32]) -> Result<Vec<EditCategory>, RetrievalError> {
        let scored = self.scores(query)?;
        Ok(scored
            .into_iter()
            .take(self.top_n)
            .map(|(category, _)| category)
            .collect())
    }

    /// Every category with its similarity, best first.
    pub fn scores(&self, query: &[f32]) -> Result<Vec<(EditCategory, f32)>, RetrievalError> {
        let mut scored = self
            .fingerprints
            .iter()
            .map(|f| cosine_similarity(query, &f.vector).map(|s| (f.category, s)))
            .collect::<Result<Vec<_>, _>>()?;
        // Stable sort over category-ordered input keeps ties in declaration order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(scored)
    }
}
