//! Session-facing progress events
//!
//! The orchestrator emits these over an optional channel so the owning
//! session can stream progress. Sends are best-effort: a closed or full
//! channel never stalls or fails the refinement loop.

use geoforge_plan::{ExecutionPlan, Strategy};
use geoforge_validate::ValidationReport;
use serde::{Deserialize, Serialize};

/// Progress and terminal events for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// Planning finished; the loop is about to start.
    #[serde(rename_all = "camelCase")]
    Planning {
        /// Request id
        request_id: String,
        /// Selected strategy
        strategy: Strategy,
        /// Constraints extracted from the request
        constraint_count: usize,
    },

    /// A generation iteration began.
    #[serde(rename_all = "camelCase")]
    IterationStarted {
        /// Request id
        request_id: String,
        /// 1-based iteration number
        iteration: u32,
    },

    /// A candidate finished validation.
    #[serde(rename_all = "camelCase")]
    ValidationCompleted {
        /// Request id
        request_id: String,
        /// 1-based iteration number
        iteration: u32,
        /// Composite score
        score: f32,
        /// Whether the candidate passed
        passed: bool,
    },

    /// A targeted repair regeneration is running.
    #[serde(rename_all = "camelCase")]
    Repairing {
        /// Request id
        request_id: String,
        /// Failure category driving the repair
        category: String,
    },

    /// The request reached terminal state, carrying the full result.
    #[serde(rename_all = "camelCase")]
    Terminal {
        /// Request id
        request_id: String,
        /// Whether the final candidate passed
        passed: bool,
        /// Final candidate code
        code: String,
        /// Validation outcome of the final candidate
        report: ValidationReport,
        /// The plan that drove the loop
        plan: ExecutionPlan,
        /// Iterations consumed
        iterations: u32,
        /// Total wall-clock duration
        duration_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_tagged_camel_case() {
        let event = SessionEvent::ValidationCompleted {
            request_id: "r1".to_string(),
            iteration: 2,
            score: 75.0,
            passed: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "validationCompleted");
        assert_eq!(json["requestId"], "r1");
        assert_eq!(json["iteration"], 2);
    }

    #[test]
    fn terminal_event_round_trips() {
        let report = ValidationReport {
            syntax: geoforge_validate::LayerResult::Passed,
            static_checks: geoforge_validate::LayerResult::Passed,
            execution: geoforge_validate::LayerResult::Passed,
            geometry: geoforge_validate::LayerResult::Passed,
            constraints: geoforge_validate::LayerResult::Passed,
            constraint_score: 100.0,
            overall_score: 90.0,
            passed: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            failure: None,
            mesh: None,
        };
        let plan = geoforge_plan::plan(&geoforge_plan::Analysis {
            category: "box".to_string(),
            complexity: 1.5,
            dimensions: Vec::new(),
            features: Vec::new(),
            sub_tasks: Vec::new(),
            constraints: Vec::new(),
        });
        let event = SessionEvent::Terminal {
            request_id: "r2".to_string(),
            passed: true,
            code: "result = cq.Workplane(\"XY\").box(1, 1, 1)".to_string(),
            report,
            plan,
            iterations: 1,
            duration_ms: 1200,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: SessionEvent = serde_json::from_str(&json).unwrap();
        match back {
            SessionEvent::Terminal { passed, report, .. } => {
                assert!(passed);
                assert!((report.overall_score - 90.0).abs() < f32::EPSILON);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
