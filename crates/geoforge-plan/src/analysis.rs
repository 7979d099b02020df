//! Request analysis
//!
//! Keyword and pattern extraction over the raw request text. One Analysis
//! per Request, immutable after creation.

use crate::PlanError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use uuid::Uuid;

/// An accepted design request. Immutable once accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Raw natural-language text
    pub raw_text: String,
    /// Owning session
    pub session_id: Uuid,
    /// Acceptance timestamp
    pub received_at: DateTime<Utc>,
}

impl Request {
    /// Create a request owned by the given session.
    #[must_use]
    pub fn new(raw_text: impl Into<String>, session_id: Uuid) -> Self {
        Self {
            raw_text: raw_text.into(),
            session_id,
            received_at: Utc::now(),
        }
    }
}

/// Constraint kinds, listed in their mandatory resolution order:
/// dimensional limits must hold before geometric relations are meaningful,
/// before manufacturing feasibility, before functional properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Explicit sizes and tolerances
    Dimensional,
    /// Shape relations (concentric, parallel, hollow)
    Geometric,
    /// Printability/machinability concerns
    Manufacturing,
    /// Fit-for-purpose properties
    Functional,
}

/// How strictly a constraint binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintStrength {
    /// Violation fails the constraint layer check
    Hard,
    /// Violation is recorded, never blocking
    Soft,
}

/// A single extracted constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    /// Constraint kind
    pub kind: ConstraintKind,
    /// Binding strength
    pub strength: ConstraintStrength,
    /// Human-readable description used in prompts and re-checks
    pub description: String,
}

impl Constraint {
    /// Create a constraint.
    #[inline]
    #[must_use]
    pub fn new(
        kind: ConstraintKind,
        strength: ConstraintStrength,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            strength,
            description: description.into(),
        }
    }
}

/// An ordered unit of work within a phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    /// Sortable task id
    pub id: String,
    /// What the task produces
    pub description: String,
    /// Lower runs earlier
    pub priority: u8,
}

impl SubTask {
    /// Create a sub-task with a fresh ULID id.
    #[must_use]
    pub fn new(description: impl Into<String>, priority: u8) -> Self {
        Self {
            id: Ulid::new().to_string(),
            description: description.into(),
            priority,
        }
    }
}

/// Read-only analysis of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    /// Domain category (box, bracket, vase, housing, gear, generic)
    pub category: String,
    /// Complexity score in [0, 10]
    pub complexity: f32,
    /// Extracted dimension literals, e.g. "50x30x20", "30mm"
    pub dimensions: Vec<String>,
    /// Extracted feature keywords, e.g. "holes", "fillet"
    pub features: Vec<String>,
    /// Ordered sub-tasks
    pub sub_tasks: Vec<SubTask>,
    /// Extracted constraints (unordered; the planner orders them)
    pub constraints: Vec<Constraint>,
}

static DIMENSION_TRIPLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b\d+(?:\.\d+)?\s*[x×]\s*\d+(?:\.\d+)?\s*[x×]\s*\d+(?:\.\d+)?\b")
        .expect("dimension triple regex")
});

static DIMENSION_UNIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b\d+(?:\.\d+)?\s*(?:mm|cm|deg)\b").expect("unit regex"));

/// Domain categories with their trigger keywords, checked in order.
const CATEGORIES: &[(&str, &[&str])] = &[
    ("box", &["box", "cube", "enclosure", "case"]),
    ("bracket", &["bracket", "mount", "holder", "stand", "hook"]),
    ("vase", &["vase", "cup", "bowl", "pot", "container"]),
    ("housing", &["housing", "shell", "cover", "lid"]),
    ("gear", &["gear", "cog", "sprocket", "thread"]),
];

/// Feature keywords that raise complexity and become features/sub-tasks.
const FEATURES: &[&str] = &[
    "hole", "holes", "slot", "slots", "fillet", "chamfer", "rounded", "hollow", "shell", "rib",
    "pattern", "twist", "taper", "thread", "boss", "pocket",
];

/// Keywords marking manufacturing constraints.
const MANUFACTURING: &[&str] = &["printable", "print", "machinable", "draft", "overhang"];

/// Keywords marking functional constraints.
const FUNCTIONAL: &[&str] = &["fit", "fits", "snap", "attach", "support", "hold", "watertight"];

/// Analyze a request into its read-only Analysis.
///
/// # Errors
/// `PlanError::EmptyRequest` when the text is empty or whitespace.
pub fn analyze(request: &Request) -> Result<Analysis, PlanError> {
    let text = request.raw_text.trim();
    if text.is_empty() {
        return Err(PlanError::EmptyRequest);
    }
    let lower = text.to_lowercase();

    let category = CATEGORIES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map_or("generic", |(name, _)| *name)
        .to_string();

    let mut dimensions: Vec<String> = DIMENSION_TRIPLE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    dimensions.extend(DIMENSION_UNIT.find_iter(text).map(|m| m.as_str().to_string()));

    let features: Vec<String> = FEATURES
        .iter()
        .filter(|f| lower.contains(*f))
        .map(|f| (*f).to_string())
        .collect();

    let complexity = score_complexity(&lower, &dimensions, &features);
    let constraints = extract_constraints(&lower, &dimensions, &features);
    let sub_tasks = build_sub_tasks(&category, &features);

    tracing::debug!(
        category = %category,
        complexity,
        dimensions = dimensions.len(),
        features = features.len(),
        "request analyzed"
    );

    Ok(Analysis {
        category,
        complexity,
        dimensions,
        features,
        sub_tasks,
        constraints,
    })
}

/// Complexity in [0, 10]: a base for any shape, plus feature count, word
/// count and combining language.
fn score_complexity(lower: &str, dimensions: &[String], features: &[String]) -> f32 {
    let mut score = 1.0f32;

    score += features.len() as f32 * 1.2;
    score += (dimensions.len() as f32 * 0.3).min(1.0);

    let words = lower.split_whitespace().count();
    score += (words as f32 / 12.0).min(2.0);

    for combiner in ["and", "with", "then", "plus"] {
        if lower.split_whitespace().any(|w| w == combiner) {
            score += 0.5;
        }
    }

    if lower.contains("assembly") || lower.contains("mechanism") || lower.contains("articulated") {
        score += 2.5;
    }

    score.clamp(0.0, 10.0)
}

fn extract_constraints(
    lower: &str,
    dimensions: &[String],
    features: &[String],
) -> Vec<Constraint> {
    let mut constraints = Vec::new();

    // Stated sizes always bind hard; features are soft by default.
    for dim in dimensions {
        constraints.push(Constraint::new(
            ConstraintKind::Dimensional,
            ConstraintStrength::Hard,
            format!("overall size {dim}"),
        ));
    }

    for feature in features {
        constraints.push(Constraint::new(
            ConstraintKind::Geometric,
            ConstraintStrength::Soft,
            format!("include feature: {feature}"),
        ));
    }

    if MANUFACTURING.iter().any(|k| lower.contains(k)) {
        constraints.push(Constraint::new(
            ConstraintKind::Manufacturing,
            ConstraintStrength::Soft,
            "must be manufacturable as described",
        ));
    }

    if FUNCTIONAL.iter().any(|k| lower.contains(k)) {
        constraints.push(Constraint::new(
            ConstraintKind::Functional,
            ConstraintStrength::Soft,
            "must serve the stated function",
        ));
    }

    constraints
}

fn build_sub_tasks(category: &str, features: &[String]) -> Vec<SubTask> {
    let mut tasks = vec![SubTask::new(format!("model the base {category} geometry"), 0)];
    for (i, feature) in features.iter().enumerate() {
        tasks.push(SubTask::new(format!("add {feature}"), (i + 1) as u8));
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze_text(text: &str) -> Analysis {
        analyze(&Request::new(text, Uuid::new_v4())).unwrap()
    }

    #[test]
    fn empty_request_is_rejected() {
        let result = analyze(&Request::new("   ", Uuid::new_v4()));
        assert!(matches!(result, Err(PlanError::EmptyRequest)));
    }

    #[test]
    fn simple_box_has_low_complexity() {
        let analysis = analyze_text("simple box 50x30x20");
        assert_eq!(analysis.category, "box");
        assert!(analysis.complexity < 3.0, "complexity={}", analysis.complexity);
        assert_eq!(analysis.dimensions, vec!["50x30x20"]);
    }

    #[test]
    fn featured_request_lands_mid_range() {
        let analysis =
            analyze_text("an enclosure with rounded corners and four mounting holes 80mm wide");
        assert_eq!(analysis.category, "box");
        assert!(
            (3.0..7.0).contains(&analysis.complexity),
            "complexity={}",
            analysis.complexity
        );
        assert!(analysis.features.contains(&"holes".to_string()));
    }

    #[test]
    fn assembly_request_is_complex() {
        let analysis = analyze_text(
            "an articulated bracket assembly with a hinge mechanism, fillet edges, \
             slots for cable routing and a snap fit lid that holds the cover",
        );
        assert!(analysis.complexity >= 7.0, "complexity={}", analysis.complexity);
    }

    #[test]
    fn dimensional_constraints_come_from_dimensions() {
        let analysis = analyze_text("a cube 40mm");
        let dims: Vec<_> = analysis
            .constraints
            .iter()
            .filter(|c| c.kind == ConstraintKind::Dimensional)
            .collect();
        assert_eq!(dims.len(), 1);
        assert!(dims[0].description.contains("40mm"));
    }

    #[test]
    fn functional_keywords_produce_functional_constraint() {
        let analysis = analyze_text("a hook that holds a 2kg bag");
        assert!(analysis
            .constraints
            .iter()
            .any(|c| c.kind == ConstraintKind::Functional));
    }

    #[test]
    fn sub_tasks_start_with_base_geometry() {
        let analysis = analyze_text("a vase with a twist pattern");
        assert!(analysis.sub_tasks[0].description.contains("base"));
        assert_eq!(analysis.sub_tasks[0].priority, 0);
        assert!(analysis.sub_tasks.len() > 1);
    }

    #[test]
    fn unknown_shape_falls_back_to_generic() {
        let analysis = analyze_text("a weird organic blob");
        assert_eq!(analysis.category, "generic");
    }
}
