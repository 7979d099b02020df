//! The multi-layer validator
//!
//! Orders the five layers, applies the two short-circuit points, and folds
//! the layer outcomes into the composite score. The score is a pure
//! function of layer inputs; the validator only decides which layers run.

use crate::kernel::{GeometryKernel, MeshArtifact};
use crate::syntax::SyntaxChecker;
use crate::taxonomy::{categorize_failure, FailureCategory};
use geoforge_plan::{Constraint, ConstraintKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Layer weights. Calibration choice; the invariant to preserve is that
/// syntax and execution failures dominate the composite.
const WEIGHT_SYNTAX: f32 = 20.0;
const WEIGHT_EXECUTION: f32 = 30.0;
const WEIGHT_GEOMETRY: f32 = 25.0;
const WEIGHT_CONSTRAINTS: f32 = 0.15;

/// Outcome of a single layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerResult {
    /// Layer ran and passed
    Passed,
    /// Layer ran and failed
    Failed,
    /// Layer never ran because an earlier layer short-circuited
    Skipped,
}

impl LayerResult {
    #[inline]
    fn passed(self) -> bool {
        matches!(self, LayerResult::Passed)
    }
}

/// Full validation outcome for one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Syntax layer outcome
    pub syntax: LayerResult,
    /// Static heuristics outcome (warnings only, never `Failed`)
    pub static_checks: LayerResult,
    /// Execution layer outcome
    pub execution: LayerResult,
    /// Geometry layer outcome
    pub geometry: LayerResult,
    /// Constraint layer outcome
    pub constraints: LayerResult,
    /// Constraint satisfaction in [0, 100]
    pub constraint_score: f32,
    /// Weighted composite in [0, 100]
    pub overall_score: f32,
    /// Whether the candidate is admissible
    pub passed: bool,
    /// Blocking findings across layers
    pub errors: Vec<String>,
    /// Non-blocking findings across layers
    pub warnings: Vec<String>,
    /// Category of the dominating failure, if any
    pub failure: Option<FailureCategory>,
    /// Output mesh when execution succeeded
    pub mesh: Option<MeshArtifact>,
}

/// Validator configuration
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Kernel execution budget
    pub execution_timeout: Duration,
    /// Minimum vertex count for a usable mesh. Tied to the current kernel's
    /// tessellation density; configurable, not a portable law.
    pub min_vertices: usize,
    /// Empirical face/vertex ratio band for closed triangle meshes
    pub face_vertex_ratio: (f32, f32),
    /// Minimum bounding-box extent on every axis, in mm
    pub min_extent: f32,
    /// Admission threshold on the composite score
    pub pass_threshold: f32,
}

impl ValidatorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With execution timeout
    #[inline]
    #[must_use]
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    /// With minimum vertex count
    #[inline]
    #[must_use]
    pub fn with_min_vertices(mut self, min_vertices: usize) -> Self {
        self.min_vertices = min_vertices;
        self
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            execution_timeout: Duration::from_secs(30),
            min_vertices: 100,
            face_vertex_ratio: (0.5, 4.0),
            min_extent: 1.0,
            pass_threshold: 80.0,
        }
    }
}

/// Composite score as a pure function of layer inputs.
///
/// `20·syntax + 30·execution + 25·geometry + 0.15·constraintScore`, capped
/// at 100. Exposed so the scoring law is testable in isolation.
#[must_use]
pub(crate) fn composite_score(
    syntax_ok: bool,
    execution_ok: bool,
    geometry_ok: bool,
    constraint_score: f32,
) -> f32 {
    let mut score = 0.0;
    if syntax_ok {
        score += WEIGHT_SYNTAX;
    }
    if execution_ok {
        score += WEIGHT_EXECUTION;
    }
    if geometry_ok {
        score += WEIGHT_GEOMETRY;
    }
    score += WEIGHT_CONSTRAINTS * constraint_score.clamp(0.0, 100.0);
    score.min(100.0)
}

/// Runs the ordered battery against a candidate.
pub struct MultiLayerValidator {
    kernel: Arc<dyn GeometryKernel>,
    syntax: SyntaxChecker,
    config: ValidatorConfig,
}

impl std::fmt::Debug for MultiLayerValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiLayerValidator")
            .field("config", &self.config)
            .finish()
    }
}

impl MultiLayerValidator {
    /// Create a validator bound to a geometry kernel.
    #[inline]
    #[must_use]
    pub fn new(kernel: Arc<dyn GeometryKernel>, config: ValidatorConfig) -> Self {
        Self {
            kernel,
            syntax: SyntaxChecker::new(),
            config,
        }
    }

    /// Validate one candidate against the request's constraints.
    pub async fn validate(&self, code: &str, constraints: &[Constraint]) -> ValidationReport {
        // Layer 1: syntax. Invalid aborts everything, composite 0.
        let syntax_report = self.syntax.check(code);
        if !syntax_report.valid {
            tracing::debug!(errors = syntax_report.errors.len(), "syntax layer failed");
            return ValidationReport {
                syntax: LayerResult::Failed,
                static_checks: LayerResult::Skipped,
                execution: LayerResult::Skipped,
                geometry: LayerResult::Skipped,
                constraints: LayerResult::Skipped,
                constraint_score: 0.0,
                overall_score: 0.0,
                passed: false,
                errors: syntax_report.errors,
                warnings: syntax_report.warnings,
                failure: Some(FailureCategory::SyntaxInvalid),
                mesh: None,
            };
        }

        let mut errors = syntax_report.errors;
        let mut warnings = syntax_report.warnings;

        // Layer 2: static heuristics, warnings only.
        warnings.extend(static_warnings(code));

        // Layer 3: execution under the configured budget.
        let (execution, mesh, mut failure) = self.run_execution(code, &mut errors).await;

        // Layers 4 and 5 only run on a live mesh.
        let (geometry, constraint_result, constraint_score) = match &mesh {
            Some(mesh) => {
                let geometry = self.check_geometry(mesh, &mut errors);
                if geometry == LayerResult::Failed && failure.is_none() {
                    failure = Some(FailureCategory::EmptyOrDegenerateOutput);
                }

                let (result, score) =
                    check_constraints(code, mesh, constraints, &mut errors, &mut warnings);
                if result == LayerResult::Failed && failure.is_none() {
                    failure = Some(FailureCategory::ConstraintViolation);
                }
                (geometry, result, score)
            }
            None => (LayerResult::Skipped, LayerResult::Skipped, 0.0),
        };

        let overall_score = composite_score(
            true,
            execution.passed(),
            geometry.passed(),
            if constraint_result == LayerResult::Skipped {
                0.0
            } else {
                constraint_score
            },
        );
        let passed = overall_score >= self.config.pass_threshold;

        tracing::debug!(
            overall_score,
            passed,
            ?failure,
            "validation battery complete"
        );

        ValidationReport {
            syntax: LayerResult::Passed,
            static_checks: LayerResult::Passed,
            execution,
            geometry,
            constraints: constraint_result,
            constraint_score,
            overall_score,
            passed,
            errors,
            warnings,
            failure: if passed { None } else { failure },
            mesh,
        }
    }

    async fn run_execution(
        &self,
        code: &str,
        errors: &mut Vec<String>,
    ) -> (LayerResult, Option<MeshArtifact>, Option<FailureCategory>) {
        let budget = self.config.execution_timeout;
        match tokio::time::timeout(budget, self.kernel.execute(code)).await {
            Ok(Ok(mesh)) => (LayerResult::Passed, Some(mesh), None),
            Ok(Err(failure)) => {
                let category = failure
                    .category_hint
                    .as_deref()
                    .map_or_else(|| categorize_failure(&failure.message), |hint| {
                        categorize_failure(hint)
                    });
                errors.push(format!("execution failed: {}", failure.message));
                (LayerResult::Failed, None, Some(category))
            }
            Err(_) => {
                errors.push(format!(
                    "execution timed out after {}s",
                    budget.as_secs()
                ));
                (
                    LayerResult::Failed,
                    None,
                    Some(FailureCategory::ExecutionTimeout),
                )
            }
        }
    }

    fn check_geometry(&self, mesh: &MeshArtifact, errors: &mut Vec<String>) -> LayerResult {
        let mut ok = true;

        if mesh.is_empty() {
            errors.push("mesh is empty".to_string());
            ok = false;
        }

        if mesh.vertex_count() < self.config.min_vertices {
            errors.push(format!(
                "mesh has {} vertices, expected at least {}",
                mesh.vertex_count(),
                self.config.min_vertices
            ));
            ok = false;
        }

        if !mesh.is_empty() {
            let ratio = mesh.face_count() as f32 / mesh.vertex_count() as f32;
            let (lo, hi) = self.config.face_vertex_ratio;
            if !(lo..=hi).contains(&ratio) {
                errors.push(format!(
                    "face/vertex ratio {ratio:.2} outside [{lo}, {hi}]"
                ));
                ok = false;
            }

            let extents = mesh.extents();
            if extents.iter().any(|e| *e < self.config.min_extent) {
                errors.push(format!(
                    "bounding box {extents:?} below minimum extent {}mm",
                    self.config.min_extent
                ));
                ok = false;
            }
        }

        if ok {
            LayerResult::Passed
        } else {
            LayerResult::Failed
        }
    }

    /// Probe the geometry kernel, bounded by the execution timeout.
    pub async fn kernel_healthy(&self) -> bool {
        matches!(
            tokio::time::timeout(self.config.execution_timeout, self.kernel.health()).await,
            Ok(true)
        )
    }

    /// Validator configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }
}

/// Static quality heuristics. Never blocking.
fn static_warnings(code: &str) -> Vec<String> {
    let mut warnings = Vec::new();

    if code.lines().any(|l| l.len() > 120) {
        warnings.push("line longer than 120 characters".to_string());
    }

    let chained_calls = code.matches(").").count();
    if chained_calls > 12 {
        warnings.push(format!("deep call chain ({chained_calls} links)"));
    }

    if !code.contains("show_object") && !code.contains("result =") {
        warnings.push("final result may not be exported".to_string());
    }

    warnings
}

/// Constraint layer: satisfied / total × 100.
///
/// Zero constraints score vacuously 100: an absent constraint set must not
/// be able to fail a candidate that already executed and produced sound
/// geometry.
fn check_constraints(
    code: &str,
    mesh: &MeshArtifact,
    constraints: &[Constraint],
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) -> (LayerResult, f32) {
    if constraints.is_empty() {
        return (LayerResult::Passed, 100.0);
    }

    let code_lower = code.to_lowercase();
    let mut satisfied = 0usize;
    let mut hard_violation = false;

    for constraint in constraints {
        let ok = match constraint.kind {
            ConstraintKind::Dimensional => dimensional_satisfied(&constraint.description, code, mesh),
            ConstraintKind::Geometric => {
                // "include feature: X" is satisfied when the code mentions X.
                constraint
                    .description
                    .rsplit(": ")
                    .next()
                    .is_some_and(|feature| code_lower.contains(feature.trim()))
            }
            // Not machine-checkable here; a produced mesh is the best
            // available evidence.
            ConstraintKind::Manufacturing | ConstraintKind::Functional => !mesh.is_empty(),
        };

        if ok {
            satisfied += 1;
        } else {
            let finding = format!("constraint unsatisfied: {}", constraint.description);
            match constraint.strength {
                geoforge_plan::ConstraintStrength::Hard => {
                    hard_violation = true;
                    errors.push(finding);
                }
                geoforge_plan::ConstraintStrength::Soft => warnings.push(finding),
            }
        }
    }

    let score = satisfied as f32 / constraints.len() as f32 * 100.0;
    let result = if hard_violation {
        LayerResult::Failed
    } else {
        LayerResult::Passed
    };
    (result, score)
}

/// A dimensional constraint holds when every number it states appears in
/// the code, or the mesh extents cover each stated value within 1mm.
fn dimensional_satisfied(description: &str, code: &str, mesh: &MeshArtifact) -> bool {
    let numbers: Vec<f32> = description
        .split(|c: char| !c.is_ascii_digit() && c != '.')
        .filter_map(|s| s.parse::<f32>().ok())
        .collect();
    if numbers.is_empty() {
        return true;
    }

    let extents = mesh.extents();
    numbers.iter().all(|n| {
        code.contains(&format!("{n}"))
            || code.contains(&format!("{}", *n as i64))
            || extents.iter().any(|e| (e - n).abs() <= 1.0)
    })
}
