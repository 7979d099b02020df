//! Vector index boundary and in-process fallback
//!
//! The external vector database is reached through `VectorIndex`. When it
//! is unreachable at startup, `MemoryIndex` serves the same interface with
//! a brute-force cosine scan, acceptable because example counts stay
//! small.

use crate::store::ExampleRecord;
use crate::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use geoforge_embed::cosine_similarity;

/// A query hit: stored record plus query-specific similarity.
#[derive(Debug, Clone)]
pub struct IndexMatch {
    /// The stored record
    pub record: ExampleRecord,
    /// Cosine similarity to the query vector, in [-1, 1]. Hashed-fallback
    /// vectors have non-negative components, so their similarities land in
    /// [0, 1]; learned encoders can produce negative values.
    pub similarity: f32,
}

/// Vector index boundary.
///
/// `upsert`/`query` mirror the external persistence interface; the store
/// owns which implementation is live.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create or verify the index; used as the startup reachability probe.
    async fn create_index(&self) -> Result<(), StoreError>;

    /// Insert or replace a record keyed by its id.
    async fn upsert(&self, vector: Vec<f32>, record: ExampleRecord) -> Result<(), StoreError>;

    /// Return up to `k` records ranked by similarity, best first.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<IndexMatch>, StoreError>;

    /// Number of stored records.
    async fn len(&self) -> usize;

    /// Whether the index holds no records.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// In-process vector index: DashMap plus brute-force cosine scan.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    entries: DashMap<String, (Vec<f32>, ExampleRecord)>,
}

impl MemoryIndex {
    /// Create an empty index.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn create_index(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert(&self, vector: Vec<f32>, record: ExampleRecord) -> Result<(), StoreError> {
        self.entries.insert(record.id.clone(), (vector, record));
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<IndexMatch>, StoreError> {
        let mut matches: Vec<IndexMatch> = self
            .entries
            .iter()
            .map(|entry| {
                let (stored_vector, record) = entry.value();
                IndexMatch {
                    record: record.clone(),
                    similarity: cosine_similarity(vector, stored_vector),
                }
            })
            .collect();

        // Descending similarity, id as the stable tie-break so results do
        // not depend on map iteration order.
        matches.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        matches.truncate(k);
        Ok(matches)
    }

    async fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, prompt: &str) -> ExampleRecord {
        ExampleRecord::new(prompt, "code", "bracket", 3.0, 85.0).with_id(id)
    }

    #[tokio::test]
    async fn upsert_then_query_returns_best_first() {
        let index = MemoryIndex::new();
        index
            .upsert(vec![1.0, 0.0], record("a", "x bracket"))
            .await
            .unwrap();
        index
            .upsert(vec![0.0, 1.0], record("b", "y vase"))
            .await
            .unwrap();

        let matches = index.query(&[1.0, 0.1], 2).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].record.id, "a");
        assert!(matches[0].similarity > matches[1].similarity);
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let index = MemoryIndex::new();
        index
            .upsert(vec![1.0, 0.0], record("a", "first"))
            .await
            .unwrap();
        index
            .upsert(vec![1.0, 0.0], record("a", "second"))
            .await
            .unwrap();

        assert_eq!(index.len().await, 1);
        let matches = index.query(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(matches[0].record.prompt, "second");
    }

    #[tokio::test]
    async fn query_truncates_to_k() {
        let index = MemoryIndex::new();
        for i in 0..10 {
            index
                .upsert(vec![1.0, i as f32 / 10.0], record(&format!("r{i}"), "p"))
                .await
                .unwrap();
        }
        assert_eq!(index.query(&[1.0, 0.0], 5).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn empty_index_returns_no_matches() {
        let index = MemoryIndex::new();
        assert!(index.is_empty().await);
        assert!(index.query(&[1.0], 3).await.unwrap().is_empty());
    }
}
