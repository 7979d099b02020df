//! Hashed term-frequency fallback embedder
//!
//! Produces deterministic dense vectors with no model dependency:
//! lowercase terms are hashed into fixed-dimension buckets, weighted by
//! term frequency, enriched with character shingles of longer terms, then
//! L2-normalized. Identical text yields bit-identical vectors.

use std::collections::HashMap;

/// Minimum term length kept after tokenization.
const MIN_TERM_LEN: usize = 3;

/// Terms longer than this also contribute their length-2 shingles.
const SHINGLE_TERM_LEN: usize = 4;

/// Relative weight of a shingle slot versus a whole-term slot.
const SHINGLE_WEIGHT: f32 = 0.3;

/// Deterministic hashed embedder.
///
/// Not as semantically rich as a learned encoder, but always available and
/// stable across process runs and platforms (the bucket hash is blake3).
#[derive(Debug, Clone)]
pub struct HashedEmbedder {
    dimension: usize,
}

impl HashedEmbedder {
    /// Create an embedder emitting vectors of the given dimension.
    #[inline]
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Output vector dimension.
    #[inline]
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed text into a fixed-dimension L2-normalized vector.
    ///
    /// Empty or all-stopword-length input yields the zero vector.
    #[must_use]
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let terms = tokenize(text);
        if terms.is_empty() {
            return vec![0.0; self.dimension];
        }

        let mut tf: HashMap<&str, f32> = HashMap::new();
        for term in &terms {
            *tf.entry(term.as_str()).or_default() += 1.0;
        }

        let total = terms.len() as f32;
        let mut vector = vec![0.0f32; self.dimension];

        for (term, count) in &tf {
            let weight = count / total;
            vector[self.bucket(term)] += weight;

            // Fold in character shingles so near-miss vocabulary
            // ("cylinder" vs "cylindrical") still overlaps.
            if term.len() > SHINGLE_TERM_LEN {
                let bytes = term.as_bytes();
                for window in bytes.windows(2) {
                    let shingle = [window[0], window[1]];
                    vector[self.bucket_bytes(&shingle)] += weight * SHINGLE_WEIGHT;
                }
            }
        }

        l2_normalize(&mut vector);
        vector
    }

    /// Bucket index for a term via stable hash modulo dimension.
    #[inline]
    fn bucket(&self, term: &str) -> usize {
        self.bucket_bytes(term.as_bytes())
    }

    fn bucket_bytes(&self, bytes: &[u8]) -> usize {
        let digest = blake3::hash(bytes);
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        (u64::from_le_bytes(head) as usize) % self.dimension
    }
}

/// Tokenize text into lowercase alphanumeric terms of length > 2.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.len() >= MIN_TERM_LEN)
        .map(str::to_lowercase)
        .collect()
}

/// L2-normalize a vector in place. Zero vectors are left untouched.
fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn embedding_is_deterministic() {
        let embedder = HashedEmbedder::new(256);
        let a = embedder.embed("a mounting bracket with four bolt holes");
        let b = embedder.embed("a mounting bracket with four bolt holes");
        assert_eq!(a, b);
    }

    #[test]
    fn embedding_has_configured_dimension() {
        let embedder = HashedEmbedder::new(64);
        assert_eq!(embedder.embed("simple box").len(), 64);
    }

    #[test]
    fn embedding_is_l2_normalized() {
        let embedder = HashedEmbedder::new(128);
        let vector = embedder.embed("a cylinder 30mm diameter 80mm tall");
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_input_yields_zero_vector() {
        let embedder = HashedEmbedder::new(32);
        let vector = embedder.embed("a b -- !!");
        assert!(vector.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn short_terms_are_dropped() {
        let embedder = HashedEmbedder::new(32);
        // "mm" and "of" are below the minimum term length.
        assert_eq!(embedder.embed("mm of"), vec![0.0; 32]);
    }

    #[test]
    fn related_vocabulary_overlaps_via_shingles() {
        let embedder = HashedEmbedder::new(256);
        let a = embedder.embed("cylindrical container");
        let b = embedder.embed("cylinder shaped container");
        let sim = crate::cosine_similarity(&a, &b);
        assert!(sim > 0.1, "expected shingle overlap, got {sim}");
    }

    proptest! {
        #[test]
        fn determinism_holds_for_arbitrary_text(text in "\\PC{0,200}") {
            let embedder = HashedEmbedder::new(128);
            prop_assert_eq!(embedder.embed(&text), embedder.embed(&text));
        }

        #[test]
        fn norm_is_zero_or_one(text in "\\PC{0,200}") {
            let embedder = HashedEmbedder::new(128);
            let vector = embedder.embed(&text);
            let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
            prop_assert!(norm < 1e-5 || (norm - 1.0).abs() < 1e-4);
        }
    }
}
