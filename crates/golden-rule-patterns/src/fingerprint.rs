use crate::category::EditCategory;
use crate::retrieval::RetrievalError;

/// Mean description vector of one category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryFingerprint {
    pub category: EditCategory,
    pub vector: Vec<f32>,
}

impl CategoryFingerprint {
    pub fn from_vectors(
        category: EditCategory,
        vectors: &[Vec<f32>],
    ) -> Result<Self, RetrievalError> {
        Ok(Self {
            category,
            vector: mean_vector(vectors)?,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

/// Component-wise mean. All vectors must share one non-zero dimension.
pub fn mean_vector(vectors: &[Vec<f32>]) -> Result<Vec<f32>, RetrievalError> {
    let Some(first) = vectors.first() else {
        return Err(RetrievalError::EmptyCategory);
    };
    let dims = first.len();
    if dims == 0 {
        return Err(RetrievalError::EmptyVector);
    }
    let mut sum = vec![0.0_f64; dims];
    for vector in vectors {
        if vector.len() != dims {
            return Err(RetrievalError::DimensionMismatch {
                expected: dims,
                actual: vector.len(),
            });
        }
        for (acc, value) in sum.iter_mut().zip(vector) {
            *acc += f64::from(*value);
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let count = vectors.len() as f64;
    #[allow(clippy::cast_possible_truncation)]
    let mean = sum.into_iter().map(|v| (v / count) as f32).collect();
    Ok(mean)
}

/// Cosine of the angle between `a` and `b`; zero when either has no length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, RetrievalError> {
    if a.len() != b.len() {
        return Err(RetrievalError::DimensionMismatch {
            expected: b.len(),
            actual: a.len(),
        });
    }
    let mut dot = 0.0_f32;
    let mut na = 0.0_f32;
    let mut nb = 0.0_f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / denom)
}
