//! Retrieval engine: similarity fetch plus fit re-ranking
//!
//! Pipeline: embed the request → fetch top-`fetch_k` by similarity →
//! re-rank by category match and complexity closeness → return the top
//! `return_k`. Ties preserve the original similarity order, so the
//! re-rank is stable.

use crate::store::ExampleStore;
use crate::StoreError;
use serde::{Deserialize, Serialize};

/// An example selected for prompt construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedExample {
    /// Stored record id
    pub id: String,
    /// Original prompt text
    pub prompt: String,
    /// Verified code
    pub code: String,
    /// Domain category tag
    pub category: String,
    /// Quality score the example earned when persisted
    pub quality_score: f32,
    /// Query-specific cosine similarity, in [-1, 1]
    pub similarity: f32,
}

/// Retrieval configuration
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Candidates fetched from the store by raw similarity
    pub fetch_k: usize,
    /// Examples returned after re-ranking
    pub return_k: usize,
    /// Additive boost for a category match
    pub category_boost: f32,
    /// Multiplier applied to |Δcomplexity| as a penalty
    pub complexity_penalty: f32,
}

impl RetrievalConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            fetch_k: 5,
            return_k: 3,
            category_boost: 0.15,
            complexity_penalty: 0.02,
        }
    }
}

/// Re-ranks store hits by fit to the current request.
#[derive(Debug, Clone)]
pub struct RetrievalEngine {
    config: RetrievalConfig,
}

impl RetrievalEngine {
    /// Create an engine with the given configuration.
    #[inline]
    #[must_use]
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    /// Retrieve the best-fitting examples for a request.
    ///
    /// `category` and `complexity` come from the request's Analysis and
    /// bias the ranking toward examples of the same kind and scale.
    pub async fn retrieve(
        &self,
        store: &ExampleStore,
        request_text: &str,
        category: &str,
        complexity: f32,
    ) -> Result<Vec<RetrievedExample>, StoreError> {
        let matches = store.nearest(request_text, self.config.fetch_k).await?;
        if matches.is_empty() {
            tracing::debug!("no stored examples to retrieve");
            return Ok(Vec::new());
        }

        // Original similarity rank is the tie-break, captured before
        // re-ordering.
        let mut scored: Vec<(f32, usize, RetrievedExample)> = matches
            .into_iter()
            .enumerate()
            .map(|(rank, hit)| {
                let mut fit = hit.similarity;
                if hit.record.category == category {
                    fit += self.config.category_boost;
                }
                fit -= self.config.complexity_penalty
                    * (hit.record.complexity - complexity).abs();

                let example = RetrievedExample {
                    id: hit.record.id,
                    prompt: hit.record.prompt,
                    code: hit.record.code,
                    category: hit.record.category,
                    quality_score: hit.record.quality_score,
                    similarity: hit.similarity,
                };
                (fit, rank, example)
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        scored.truncate(self.config.return_k);

        tracing::debug!(
            returned = scored.len(),
            category,
            complexity,
            "retrieval re-rank complete"
        );

        Ok(scored.into_iter().map(|(_, _, example)| example).collect())
    }

    /// Engine configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }
}

impl Default for RetrievalEngine {
    fn default() -> Self {
        Self::new(RetrievalConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ExampleRecord, StoreConfig};
    use geoforge_embed::{EmbeddingConfig, EmbeddingProvider};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    async fn seeded_store(records: Vec<ExampleRecord>) -> ExampleStore {
        let embeddings = Arc::new(EmbeddingProvider::hashed_only(
            EmbeddingConfig::new().with_dimension(128),
        ));
        let store = ExampleStore::in_memory(embeddings, StoreConfig::new());
        for record in records {
            store.record_success(record).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn category_match_outranks_similar_stranger() {
        // Two records with near-identical prompts; only the category
        // differs, so the boost decides.
        let store = seeded_store(vec![
            ExampleRecord::new("mounting plate with holes", "a", "bracket", 3.0, 90.0)
                .with_id("bracket"),
            ExampleRecord::new("mounting plate with holes", "b", "vase", 3.0, 90.0)
                .with_id("vase"),
        ])
        .await;

        let engine = RetrievalEngine::default();
        let results = engine
            .retrieve(&store, "mounting plate with holes", "bracket", 3.0)
            .await
            .unwrap();

        assert_eq!(results[0].id, "bracket");
    }

    #[tokio::test]
    async fn complexity_distance_penalizes() {
        let store = seeded_store(vec![
            ExampleRecord::new("gear housing shell", "a", "housing", 9.0, 90.0).with_id("far"),
            ExampleRecord::new("gear housing shell", "b", "housing", 3.5, 90.0).with_id("near"),
        ])
        .await;

        let engine = RetrievalEngine::default();
        let results = engine
            .retrieve(&store, "gear housing shell", "housing", 3.0)
            .await
            .unwrap();

        assert_eq!(results[0].id, "near");
    }

    #[tokio::test]
    async fn equal_fit_preserves_similarity_order() {
        // Identical prompts, categories and complexities: the re-rank keys
        // are equal, so the original similarity rank (here: record id via
        // the index tie-break) must be preserved.
        let store = seeded_store(vec![
            ExampleRecord::new("identical prompt", "a", "box", 2.0, 90.0).with_id("a"),
            ExampleRecord::new("identical prompt", "b", "box", 2.0, 90.0).with_id("b"),
            ExampleRecord::new("identical prompt", "c", "box", 2.0, 90.0).with_id("c"),
        ])
        .await;

        let engine = RetrievalEngine::default();
        let results = engine
            .retrieve(&store, "identical prompt", "box", 2.0)
            .await
            .unwrap();

        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn returns_at_most_return_k() {
        let records = (0..8)
            .map(|i| {
                ExampleRecord::new(format!("box variant {i}"), "code", "box", 2.0, 90.0)
                    .with_id(format!("r{i}"))
            })
            .collect();
        let store = seeded_store(records).await;

        let engine = RetrievalEngine::default();
        let results = engine
            .retrieve(&store, "box variant", "box", 2.0)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn empty_store_returns_empty() {
        let store = seeded_store(Vec::new()).await;
        let engine = RetrievalEngine::default();
        let results = engine.retrieve(&store, "anything", "box", 2.0).await.unwrap();
        assert!(results.is_empty());
    }
}
