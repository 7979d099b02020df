//! Example store and retrieval engine
//!
//! Persists (prompt, code, category, complexity, quality) records for
//! previously successful generations and answers nearest-neighbor queries
//! over embedding vectors:
//! - `VectorIndex`: external vector-database boundary
//! - `MemoryIndex`: in-process brute-force fallback behind the same trait
//! - `ExampleStore`: probe-and-degrade startup, single write path
//! - `RetrievalEngine`: similarity fetch + category/complexity re-rank
//!
//! Retrieval quality improves monotonically with usage: the only write path
//! is the high-score write-back after a request passes validation.

mod engine;
mod index;
mod store;

pub use engine::{RetrievalConfig, RetrievalEngine, RetrievedExample};
pub use index::{IndexMatch, MemoryIndex, VectorIndex};
pub use store::{ExampleRecord, ExampleStore, StoreConfig};

/// Store and retrieval errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// External index rejected or failed an operation
    #[error("index operation failed: {0}")]
    IndexFailed(String),

    /// External index probe timed out
    #[error("index probe timed out after {timeout_ms}ms")]
    ProbeTimeout {
        /// Probe budget in milliseconds
        timeout_ms: u64,
    },

    /// Record payload could not be serialized
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
