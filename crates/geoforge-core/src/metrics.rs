//! Per-request outcome accounting
//!
//! Exactly one entry is recorded per processed request, at terminal state.
//! The collector keeps a bounded ring of recent entries plus a bounded
//! failure tail for quick diagnosis; aggregates are computed on demand.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default ring capacity for retained entries.
const DEFAULT_CAPACITY: usize = 1024;

/// Retained failure tail length.
const FAILURE_TAIL: usize = 64;

/// One terminal-state record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsEntry {
    /// Request id
    pub request_id: String,
    /// When the request reached terminal state
    pub recorded_at: DateTime<Utc>,
    /// Wall-clock duration of the whole refinement
    pub duration_ms: u64,
    /// Iterations consumed
    pub iterations: u32,
    /// Whether the final candidate passed validation
    pub succeeded: bool,
    /// Dominating failure category name, when the request did not pass
    pub failure_category: Option<String>,
    /// Complexity score of the request
    pub complexity: f32,
    /// Final composite score
    pub score: f32,
}

/// A recent failure, kept for diagnosis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureSummary {
    /// Request id
    pub request_id: String,
    /// Failure category name
    pub category: String,
    /// Last error message observed for the request
    pub message: String,
}

/// Aggregates over the retained window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Entries in the window
    pub total: usize,
    /// Entries that passed
    pub succeeded: usize,
    /// succeeded / total, 0 when empty
    pub success_rate: f32,
    /// Mean iterations per request
    pub mean_iterations: f32,
    /// Mean wall-clock duration
    pub mean_duration_ms: f32,
}

struct Inner {
    entries: VecDeque<MetricsEntry>,
    failures: VecDeque<FailureSummary>,
}

/// Bounded collector of terminal-state entries.
pub struct MetricsCollector {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl MetricsCollector {
    /// Create a collector with the default window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a collector retaining at most `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
                failures: VecDeque::with_capacity(FAILURE_TAIL),
            }),
            capacity,
        }
    }

    /// Record a terminal-state entry. Oldest entries are evicted once the
    /// window is full.
    pub fn record(&self, entry: MetricsEntry) {
        let mut inner = self.inner.lock();
        if inner.entries.len() == self.capacity {
            inner.entries.pop_front();
        }
        tracing::debug!(
            request_id = %entry.request_id,
            succeeded = entry.succeeded,
            iterations = entry.iterations,
            score = entry.score,
            "metrics entry recorded"
        );
        inner.entries.push_back(entry);
    }

    /// Record a failure summary for the diagnosis tail.
    pub fn record_failure(&self, summary: FailureSummary) {
        let mut inner = self.inner.lock();
        if inner.failures.len() == FAILURE_TAIL {
            inner.failures.pop_front();
        }
        inner.failures.push_back(summary);
    }

    /// Aggregate the retained window.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();
        let total = inner.entries.len();
        if total == 0 {
            return MetricsSnapshot {
                total: 0,
                succeeded: 0,
                success_rate: 0.0,
                mean_iterations: 0.0,
                mean_duration_ms: 0.0,
            };
        }

        let succeeded = inner.entries.iter().filter(|e| e.succeeded).count();
        let iteration_sum: u32 = inner.entries.iter().map(|e| e.iterations).sum();
        let duration_sum: u64 = inner.entries.iter().map(|e| e.duration_ms).sum();

        MetricsSnapshot {
            total,
            succeeded,
            success_rate: succeeded as f32 / total as f32,
            mean_iterations: iteration_sum as f32 / total as f32,
            mean_duration_ms: duration_sum as f32 / total as f32,
        }
    }

    /// Recent failures, oldest first.
    #[must_use]
    pub fn recent_failures(&self) -> Vec<FailureSummary> {
        self.inner.lock().failures.iter().cloned().collect()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether no entries are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, succeeded: bool, iterations: u32, duration_ms: u64) -> MetricsEntry {
        MetricsEntry {
            request_id: id.to_string(),
            recorded_at: Utc::now(),
            duration_ms,
            iterations,
            succeeded,
            failure_category: None,
            complexity: 2.0,
            score: if succeeded { 90.0 } else { 50.0 },
        }
    }

    #[test]
    fn snapshot_aggregates_window() {
        let collector = MetricsCollector::new();
        collector.record(entry("a", true, 1, 100));
        collector.record(entry("b", false, 5, 500));

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.total, 2);
        assert_eq!(snapshot.succeeded, 1);
        assert!((snapshot.success_rate - 0.5).abs() < f32::EPSILON);
        assert!((snapshot.mean_iterations - 3.0).abs() < f32::EPSILON);
        assert!((snapshot.mean_duration_ms - 300.0).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_snapshot_is_all_zero() {
        let snapshot = MetricsCollector::new().snapshot();
        assert_eq!(snapshot.total, 0);
        assert_eq!(snapshot.success_rate, 0.0);
    }

    #[test]
    fn window_evicts_oldest() {
        let collector = MetricsCollector::with_capacity(2);
        collector.record(entry("a", true, 1, 10));
        collector.record(entry("b", true, 1, 10));
        collector.record(entry("c", true, 1, 10));
        assert_eq!(collector.len(), 2);
    }

    #[test]
    fn failure_tail_is_bounded() {
        let collector = MetricsCollector::new();
        for i in 0..(FAILURE_TAIL + 10) {
            collector.record_failure(FailureSummary {
                request_id: format!("r{i}"),
                category: "executionTimeout".to_string(),
                message: "timed out".to_string(),
            });
        }
        assert_eq!(collector.recent_failures().len(), FAILURE_TAIL);
    }
}
