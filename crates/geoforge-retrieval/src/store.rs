//! Example store with probe-and-degrade startup
//!
//! Owns the live vector index and the embedding provider. If the external
//! index does not answer the startup probe within a short timeout, the
//! store degrades to the in-process index behind the same interface. The
//! degradation is logged, not surfaced as an error.

use crate::index::{IndexMatch, MemoryIndex, VectorIndex};
use crate::StoreError;
use geoforge_embed::EmbeddingProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use ulid::Ulid;

/// A persisted successful generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleRecord {
    /// Stable record id
    pub id: String,
    /// The request prompt that produced this code
    pub prompt: String,
    /// The final verified code
    pub code: String,
    /// Domain category tag
    pub category: String,
    /// Complexity score of the originating request, in [0, 10]
    pub complexity: f32,
    /// Overall validation score the code achieved, in [0, 100]
    pub quality_score: f32,
}

impl ExampleRecord {
    /// Create a record with a fresh ULID id.
    #[must_use]
    pub fn new(
        prompt: impl Into<String>,
        code: impl Into<String>,
        category: impl Into<String>,
        complexity: f32,
        quality_score: f32,
    ) -> Self {
        Self {
            id: Ulid::new().to_string(),
            prompt: prompt.into(),
            code: code.into(),
            category: category.into(),
            complexity,
            quality_score,
        }
    }

    /// With explicit id (tests, re-ingestion).
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// External index reachability probe budget
    pub probe_timeout: Duration,
    /// Minimum overall score for write-back persistence
    pub persist_threshold: f32,
}

impl StoreConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With probe timeout
    #[inline]
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(500),
            persist_threshold: 80.0,
        }
    }
}

/// Example store: embedding provider + live vector index.
///
/// Constructed at startup and owned by the orchestrator, never an ambient
/// singleton, so tests can instantiate isolated instances.
pub struct ExampleStore {
    embeddings: Arc<EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    config: StoreConfig,
    degraded: bool,
}

impl std::fmt::Debug for ExampleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExampleStore")
            .field("degraded", &self.degraded)
            .finish()
    }
}

impl ExampleStore {
    /// Connect to an external index, degrading to in-process storage if the
    /// probe fails or times out.
    pub async fn connect(
        embeddings: Arc<EmbeddingProvider>,
        external: Arc<dyn VectorIndex>,
        config: StoreConfig,
    ) -> Self {
        let probe = tokio::time::timeout(config.probe_timeout, external.create_index()).await;
        match probe {
            Ok(Ok(())) => {
                tracing::info!("example store connected to external vector index");
                Self {
                    embeddings,
                    index: external,
                    config,
                    degraded: false,
                }
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "vector index probe failed, using in-process index");
                Self::in_memory_inner(embeddings, config)
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = config.probe_timeout.as_millis() as u64,
                    "vector index probe timed out, using in-process index"
                );
                Self::in_memory_inner(embeddings, config)
            }
        }
    }

    /// Create a store backed by the in-process index directly.
    #[must_use]
    pub fn in_memory(embeddings: Arc<EmbeddingProvider>, config: StoreConfig) -> Self {
        Self::in_memory_inner(embeddings, config)
    }

    fn in_memory_inner(embeddings: Arc<EmbeddingProvider>, config: StoreConfig) -> Self {
        Self {
            embeddings,
            index: Arc::new(MemoryIndex::new()),
            config,
            degraded: true,
        }
    }

    /// Persist a successful generation.
    ///
    /// Callers gate on `persist_threshold`; the store re-checks so a bug
    /// upstream cannot pollute retrieval with low-quality examples.
    pub async fn record_success(&self, record: ExampleRecord) -> Result<bool, StoreError> {
        if record.quality_score < self.config.persist_threshold {
            tracing::debug!(
                score = record.quality_score,
                threshold = self.config.persist_threshold,
                "skipping persistence of sub-threshold example"
            );
            return Ok(false);
        }

        let vector = self.embeddings.embed(&record.prompt);
        self.index.upsert(vector, record).await?;
        Ok(true)
    }

    /// Nearest neighbors of a free-text query.
    pub async fn nearest(&self, text: &str, k: usize) -> Result<Vec<IndexMatch>, StoreError> {
        let vector = self.embeddings.embed(text);
        self.index.query(&vector, k).await
    }

    /// Number of stored examples.
    pub async fn len(&self) -> usize {
        self.index.len().await
    }

    /// Whether the store holds no examples.
    pub async fn is_empty(&self) -> bool {
        self.index.is_empty().await
    }

    /// Whether the store fell back to the in-process index.
    #[inline]
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Store configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use geoforge_embed::EmbeddingConfig;

    fn test_store() -> ExampleStore {
        let embeddings = Arc::new(EmbeddingProvider::hashed_only(
            EmbeddingConfig::new().with_dimension(64),
        ));
        ExampleStore::in_memory(embeddings, StoreConfig::new())
    }

    /// Index whose probe never answers.
    struct HangingIndex;

    #[async_trait]
    impl VectorIndex for HangingIndex {
        async fn create_index(&self) -> Result<(), StoreError> {
            std::future::pending().await
        }
        async fn upsert(&self, _v: Vec<f32>, _r: ExampleRecord) -> Result<(), StoreError> {
            unreachable!("degraded store must not reach the external index")
        }
        async fn query(&self, _v: &[f32], _k: usize) -> Result<Vec<IndexMatch>, StoreError> {
            unreachable!("degraded store must not reach the external index")
        }
        async fn len(&self) -> usize {
            0
        }
    }

    #[tokio::test]
    async fn probe_timeout_degrades_to_memory_index() {
        let embeddings = Arc::new(EmbeddingProvider::hashed_only(EmbeddingConfig::new()));
        let config = StoreConfig::new().with_probe_timeout(Duration::from_millis(20));
        let store = ExampleStore::connect(embeddings, Arc::new(HangingIndex), config).await;

        assert!(store.is_degraded());
        // Degraded store is fully functional.
        let stored = store
            .record_success(ExampleRecord::new("a box", "code", "box", 2.0, 90.0))
            .await
            .unwrap();
        assert!(stored);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn sub_threshold_records_are_not_persisted() {
        let store = test_store();
        let stored = store
            .record_success(ExampleRecord::new("a box", "code", "box", 2.0, 79.0))
            .await
            .unwrap();
        assert!(!stored);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn threshold_boundary_is_inclusive() {
        let store = test_store();
        let stored = store
            .record_success(ExampleRecord::new("a box", "code", "box", 2.0, 80.0))
            .await
            .unwrap();
        assert!(stored);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn nearest_ranks_similar_prompts_first() {
        let store = test_store();
        store
            .record_success(ExampleRecord::new(
                "a simple rectangular box enclosure",
                "box_code",
                "box",
                2.0,
                90.0,
            ))
            .await
            .unwrap();
        store
            .record_success(ExampleRecord::new(
                "a twisted decorative flower vase",
                "vase_code",
                "vase",
                6.0,
                88.0,
            ))
            .await
            .unwrap();

        let matches = store.nearest("rectangular box with enclosure lid", 2).await.unwrap();
        assert_eq!(matches[0].record.code, "box_code");
    }
}
