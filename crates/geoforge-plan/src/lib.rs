//! Request analysis and execution planning
//!
//! Turns a free-text design request into:
//! - an `Analysis` (domain category, complexity, dimensions, features,
//!   sub-tasks, constraints), created once and read-only afterwards
//! - an `ExecutionPlan` (strategy + ordered phases + ordered constraints)
//!
//! Strategy selection follows the complexity score: simple requests render
//! in one direct phase, mid-range requests split base geometry from
//! features, and complex requests add a refinement phase with its own
//! local iteration budget.

mod analysis;
mod planner;

pub use analysis::{
    analyze, Analysis, Constraint, ConstraintKind, ConstraintStrength, Request, SubTask,
};
pub use planner::{plan, ExecutionPlan, Phase, Strategy};

/// Planning errors
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Request text was empty or whitespace
    #[error("empty request text")]
    EmptyRequest,
}
