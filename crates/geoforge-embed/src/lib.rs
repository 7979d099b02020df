//! Text embedding for example retrieval
//!
//! Provides the embedding seam used by the retrieval engine:
//! - `TextEncoder`: external learned-encoder boundary
//! - `EmbeddingProvider`: model-backed embedding with a sticky downgrade
//!   to a deterministic hashed fallback
//! - Cosine similarity over the resulting vectors
//!
//! Both variants emit vectors of the same dimension, so similarity math is
//! variant-agnostic.

mod hashed;
mod provider;

pub use hashed::HashedEmbedder;
pub use provider::{EmbeddingConfig, EmbeddingProvider, TextEncoder};

/// Embedding errors
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// External encoder failed
    #[error("encoder failed: {0}")]
    EncoderFailed(String),

    /// Encoder returned a vector of unexpected dimension
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured dimension
        expected: usize,
        /// Dimension the encoder produced
        actual: usize,
    },
}

/// Cosine similarity between two vectors of equal dimension.
///
/// Returns 0.0 when either vector has zero norm or dimensions differ,
/// so degenerate inputs rank last instead of poisoning the ordering.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.5, 0.5, 0.5, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_opposed_vectors_is_negative() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![-1.0, -2.0, -3.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_handles_zero_norm() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn cosine_handles_dimension_mismatch() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}
