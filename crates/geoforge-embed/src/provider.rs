//! Embedding provider with sticky fallback
//!
//! Wraps an optional external learned encoder. On the first encoder
//! failure the provider downgrades permanently (for the process lifetime)
//! to the hashed fallback, so one flaky backend call does not add a health
//! probe to every subsequent embed.

use crate::hashed::HashedEmbedder;
use crate::EmbedError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// External learned text encoder.
///
/// Implementations tokenize, encode and mean-pool token states into a
/// single vector. The provider verifies the dimension on every call.
pub trait TextEncoder: Send + Sync {
    /// Encode text into a dense vector.
    ///
    /// # Errors
    /// Any failure (model not loaded, runtime fault); the provider treats
    /// the first error as a permanent downgrade signal.
    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Output dimension of this encoder.
    fn dimension(&self) -> usize;
}

/// Embedding configuration
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Vector dimension emitted by both variants
    pub dimension: usize,
}

impl EmbeddingConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With vector dimension
    #[inline]
    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { dimension: 256 }
    }
}

/// Embedding provider: model-backed when healthy, hashed otherwise.
///
/// The downgrade is one-way by design: a per-call health check would add
/// latency to every embedding, and mixed-variant vectors within one process
/// would corrupt similarity math.
pub struct EmbeddingProvider {
    encoder: Option<Arc<dyn TextEncoder>>,
    fallback: HashedEmbedder,
    degraded: AtomicBool,
    config: EmbeddingConfig,
}

impl std::fmt::Debug for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingProvider")
            .field("dimension", &self.config.dimension)
            .field("has_encoder", &self.encoder.is_some())
            .field("degraded", &self.degraded.load(Ordering::Relaxed))
            .finish()
    }
}

impl EmbeddingProvider {
    /// Create a provider backed by an external encoder.
    ///
    /// The encoder's dimension overrides the configured one so both
    /// variants stay dimension-compatible.
    #[must_use]
    pub fn with_encoder(encoder: Arc<dyn TextEncoder>, config: EmbeddingConfig) -> Self {
        let dimension = encoder.dimension();
        Self {
            encoder: Some(encoder),
            fallback: HashedEmbedder::new(dimension),
            degraded: AtomicBool::new(false),
            config: config.with_dimension(dimension),
        }
    }

    /// Create a provider that only ever uses the hashed fallback.
    #[inline]
    #[must_use]
    pub fn hashed_only(config: EmbeddingConfig) -> Self {
        Self {
            encoder: None,
            fallback: HashedEmbedder::new(config.dimension),
            degraded: AtomicBool::new(true),
            config,
        }
    }

    /// Embed text into a fixed-dimension vector.
    ///
    /// Never fails: encoder errors trigger the sticky downgrade and the
    /// hashed fallback answers instead.
    #[must_use]
    pub fn embed(&self, text: &str) -> Vec<f32> {
        if !self.degraded.load(Ordering::Relaxed) {
            if let Some(encoder) = &self.encoder {
                match encoder.encode(text) {
                    Ok(vector) if vector.len() == self.config.dimension => return vector,
                    Ok(vector) => {
                        let err = EmbedError::DimensionMismatch {
                            expected: self.config.dimension,
                            actual: vector.len(),
                        };
                        tracing::warn!(
                            error = %err,
                            "downgrading to hashed embeddings"
                        );
                        self.degraded.store(true, Ordering::SeqCst);
                    }
                    Err(err) => {
                        tracing::warn!(
                            error = %err,
                            "encoder failed, downgrading to hashed embeddings"
                        );
                        self.degraded.store(true, Ordering::SeqCst);
                    }
                }
            }
        }
        self.fallback.embed(text)
    }

    /// Output vector dimension.
    #[inline]
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Whether the provider has fallen back to hashed embeddings.
    #[inline]
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }
}
