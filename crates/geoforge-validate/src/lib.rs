//! Multi-layer code validation
//!
//! Runs an ordered battery of checks over generated geometry code and
//! folds the results into one weighted composite score:
//! 1. Syntax: static rule check; invalid aborts everything, score 0
//! 2. Static: heuristic quality warnings, never blocking
//! 3. Execution: external geometry kernel with a bounded timeout
//! 4. Geometry: output mesh sanity (emptiness, ratio band, size)
//! 5. Constraints: re-check of the request's analysis constraints
//!
//! Syntax and execution failures dominate the score by construction; the
//! individual weights are a calibration choice.

mod kernel;
mod syntax;
mod taxonomy;
mod validator;

pub use kernel::{GeometryKernel, KernelFailure, MeshArtifact};
pub use syntax::{SyntaxChecker, SyntaxReport};
pub use taxonomy::{categorize_failure, repair_template, FailureCategory};
pub use validator::{LayerResult, MultiLayerValidator, ValidationReport, ValidatorConfig};
