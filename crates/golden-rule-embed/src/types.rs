/// What the vector will be compared against. Providers that support task
/// hints map these onto their own names; others ignore them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingTask {
    /// Symmetric text-to-text comparison.
    Similarity,
}

#[derive(Debug, Clone)]
pub struct EmbeddingRequest {
    pub inputs: Vec<String>,
    pub task: Option<EmbeddingTask>,
}

impl EmbeddingRequest {
    pub fn single(input: impl Into<String>) -> Self {
        Self::batch(vec![input.into()])
    }

    pub fn batch(inputs: Vec<String>) -> Self {
        Self {
            inputs,
            task: None,
        }
    }

    #[must_use]
    pub fn with_task(mut self, task: EmbeddingTask) -> Self {
        self.task = Some(task);
        self
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingResponse {
    pub provider: String,
    pub model: String,
    pub vectors: Vec<Vec<f32>>,
    pub usage_tokens: Option<u64>,
}
