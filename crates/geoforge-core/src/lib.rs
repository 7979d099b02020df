//! Refinement orchestration
//!
//! The control plane that turns an accepted request into verified
//! geometry code:
//! - `gateway`: prompt construction, the language-model boundary and
//!   tolerant code extraction
//! - `orchestrator`: the bounded generate → validate → repair loop
//! - `metrics`: per-request outcome accounting
//! - `events`: session-facing progress and terminal event types
//!
//! Failure is a data value at the request boundary: callers always receive
//! a renderable candidate with a score and structured history, never a
//! bare fault.

pub mod events;
pub mod gateway;
pub mod metrics;
pub mod orchestrator;

pub use events::SessionEvent;
pub use gateway::{CodeModel, GenerationGateway, ModelFailure, PromptContext};
pub use metrics::{FailureSummary, MetricsCollector, MetricsEntry, MetricsSnapshot};
pub use orchestrator::{
    CancelFlag, Candidate, FailureRecord, ForgeConfig, RefinementOrchestrator, RefinementOutcome,
};

/// Top-level orchestration errors.
///
/// Per-candidate failures never surface here; they live inside
/// `RefinementOutcome`. These are request-level faults.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    /// Request could not be analyzed at all
    #[error("planning failed: {0}")]
    Plan(#[from] geoforge_plan::PlanError),

    /// Example store infrastructure fault
    #[error("store failed: {0}")]
    Store(#[from] geoforge_retrieval::StoreError),

    /// The owning session cancelled the request
    #[error("request cancelled by session")]
    Cancelled,
}
