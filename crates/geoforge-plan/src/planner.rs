//! Execution planning
//!
//! Maps a complexity score onto a generation strategy and lays the
//! analysis out as ordered phases. Built once per request, immutable.

use crate::analysis::{Analysis, Constraint, ConstraintKind, SubTask};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Generation strategy, selected from the complexity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// One base-geometry phase; complexity < 3
    Direct,
    /// Base phase plus a features phase; complexity in [3, 7)
    Decomposed,
    /// Adds a refinement phase with a local iteration budget; complexity ≥ 7
    Progressive,
}

impl Strategy {
    /// Select a strategy for a complexity score.
    #[inline]
    #[must_use]
    pub fn for_complexity(complexity: f32) -> Self {
        if complexity < 3.0 {
            Strategy::Direct
        } else if complexity < 7.0 {
            Strategy::Decomposed
        } else {
            Strategy::Progressive
        }
    }
}

/// An ordered group of related sub-tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    /// Phase id
    pub id: String,
    /// Phase name ("base", "features", "refinement")
    pub name: String,
    /// Tasks executed within this phase
    pub tasks: Vec<SubTask>,
    /// Prompting approach for this phase
    pub approach: String,
    /// Ids of retrieved examples attached to this phase; filled in by the
    /// orchestrator once retrieval has run
    pub example_refs: Vec<String>,
    /// Local iteration budget for refinement phases (0 = none)
    pub local_iterations: u32,
}

impl Phase {
    fn new(name: &str, tasks: Vec<SubTask>, approach: &str, local_iterations: u32) -> Self {
        Self {
            id: Ulid::new().to_string(),
            name: name.to_string(),
            tasks,
            approach: approach.to_string(),
            example_refs: Vec::new(),
            local_iterations,
        }
    }
}

/// The execution plan for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Selected strategy
    pub strategy: Strategy,
    /// Ordered phases
    pub phases: Vec<Phase>,
    /// Constraints in resolution order (dimensional → geometric →
    /// manufacturing → functional)
    pub ordered_constraints: Vec<Constraint>,
}

impl ExecutionPlan {
    /// The phase currently driving generation (always the first; the
    /// orchestrator advances through phases for progressive plans).
    #[inline]
    #[must_use]
    pub fn first_phase(&self) -> Option<&Phase> {
        self.phases.first()
    }
}

/// Local iteration budget granted to a progressive refinement phase.
const REFINEMENT_LOCAL_ITERATIONS: u32 = 2;

/// Build the execution plan for an analysis.
#[must_use]
pub fn plan(analysis: &Analysis) -> ExecutionPlan {
    let strategy = Strategy::for_complexity(analysis.complexity);

    let (base_tasks, feature_tasks): (Vec<SubTask>, Vec<SubTask>) = analysis
        .sub_tasks
        .iter()
        .cloned()
        .partition(|task| task.priority == 0);

    let phases = match strategy {
        Strategy::Direct => vec![Phase::new(
            "base",
            analysis.sub_tasks.clone(),
            "generate the complete part in one pass",
            0,
        )],
        Strategy::Decomposed => vec![
            Phase::new(
                "base",
                base_tasks,
                "generate the base geometry only",
                0,
            ),
            Phase::new(
                "features",
                feature_tasks,
                "add the requested features to the base geometry",
                0,
            ),
        ],
        Strategy::Progressive => vec![
            Phase::new("base", base_tasks, "generate the base geometry only", 0),
            Phase::new(
                "features",
                feature_tasks,
                "add the requested features to the base geometry",
                0,
            ),
            Phase::new(
                "refinement",
                Vec::new(),
                "refine proportions and resolve feature interactions",
                REFINEMENT_LOCAL_ITERATIONS,
            ),
        ],
    };

    let mut ordered_constraints = analysis.constraints.clone();
    ordered_constraints.sort_by_key(|c| constraint_rank(c.kind));

    tracing::info!(
        ?strategy,
        phases = phases.len(),
        constraints = ordered_constraints.len(),
        "execution plan built"
    );

    ExecutionPlan {
        strategy,
        phases,
        ordered_constraints,
    }
}

#[inline]
fn constraint_rank(kind: ConstraintKind) -> u8 {
    match kind {
        ConstraintKind::Dimensional => 0,
        ConstraintKind::Geometric => 1,
        ConstraintKind::Manufacturing => 2,
        ConstraintKind::Functional => 3,
    }
}
