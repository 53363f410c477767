use std::sync::Arc;

use crate::distance;
use crate::error::{Result, VectorDbError};

const UNIT_NORM_TOLERANCE: f64 = 1e-3;

/// An L2-normalized embedding. Immutable once built; clones share storage.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector {
    values: Arc<[f32]>,
}

impl EmbeddingVector {
    /// Normalize `raw` to unit length.
    ///
    /// Rejects empty vectors, non-finite components, and vectors whose norm is
    /// zero or overflows.
    pub fn normalize(mut raw: Vec<f32>) -> Result<Self> {
        if raw.is_empty() {
            return Err(VectorDbError::EmptyVector);
        }
        if raw.iter().any(|x| !x.is_finite()) {
            return Err(VectorDbError::NonFinite);
        }
        let norm = distance::normalize_vector(&mut raw);
        if !norm.is_finite() {
            return Err(VectorDbError::NonFinite);
        }
        if norm == 0.0 {
            return Err(VectorDbError::ZeroNorm);
        }
        Ok(Self { values: raw.into() })
    }

    /// Wrap values that are already unit length (e.g. read back from the
    /// embedding cache) without touching their bits.
    pub fn from_normalized(values: Vec<f32>) -> Result<Self> {
        if values.is_empty() {
            return Err(VectorDbError::EmptyVector);
        }
        if values.iter().any(|x| !x.is_finite()) {
            return Err(VectorDbError::NonFinite);
        }
        let norm = distance::l2_norm(&values);
        if (norm - 1.0).abs() > UNIT_NORM_TOLERANCE {
            return Err(VectorDbError::NotNormalized(norm));
        }
        Ok(Self { values: values.into() })
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Dot product; equals cosine similarity because both sides are unit length.
    /// No clamping, so rounding can push the result slightly outside [-1, 1].
    #[inline]
    pub fn dot(&self, other: &EmbeddingVector) -> f32 {
        distance::inner_product(&self.values, &other.values)
    }

    pub fn norm(&self) -> f64 {
        distance::l2_norm(&self.values)
    }
}

impl AsRef<[f32]> for EmbeddingVector {
    fn as_ref(&self) -> &[f32] {
        self.as_slice()
    }
}
