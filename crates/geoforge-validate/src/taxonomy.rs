//! Failure taxonomy and repair templates
//!
//! Every failed candidate is filed under exactly one category. External
//! error messages are matched against an ordered keyword rule set (first
//! match wins) and each category selects the repair-prompt template used
//! for the next generation attempt.

use serde::{Deserialize, Serialize};

/// Failure categories for refinement feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCategory {
    /// Code failed the syntax layer
    SyntaxInvalid,
    /// Code calls the geometry API incorrectly
    InvalidApiUsage,
    /// Sketch/profile is not planar
    NonPlanarGeometry,
    /// A profile to be extruded is not closed
    UnclosedOutline,
    /// Fillet or chamfer could not be applied
    FilletOrChamferFailure,
    /// Boolean (union/cut/intersect) operation failed
    BooleanOperationFailure,
    /// Kernel did not answer within the time budget
    ExecutionTimeout,
    /// Execution produced an empty or degenerate mesh
    EmptyOrDegenerateOutput,
    /// A hard analysis constraint was not satisfied
    ConstraintViolation,
    /// No code block could be extracted from the model response
    ExtractionFailure,
    /// The external backend was unreachable
    BackendUnavailable,
}

impl FailureCategory {
    /// Stable lowercase name, as it appears in prompts and metrics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SyntaxInvalid => "syntaxInvalid",
            Self::InvalidApiUsage => "invalidApiUsage",
            Self::NonPlanarGeometry => "nonPlanarGeometry",
            Self::UnclosedOutline => "unclosedOutline",
            Self::FilletOrChamferFailure => "filletOrChamferFailure",
            Self::BooleanOperationFailure => "booleanOperationFailure",
            Self::ExecutionTimeout => "executionTimeout",
            Self::EmptyOrDegenerateOutput => "emptyOrDegenerateOutput",
            Self::ConstraintViolation => "constraintViolation",
            Self::ExtractionFailure => "extractionFailure",
            Self::BackendUnavailable => "backendUnavailable",
        }
    }

    /// Whether this category is recorded but never blocks the loop.
    #[inline]
    #[must_use]
    pub fn is_non_fatal(&self) -> bool {
        matches!(self, Self::ConstraintViolation)
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered keyword rules; earlier rows win. Specific geometry failures
/// come before the generic buckets so a "fillet failed: BRep error"
/// message files under fillet, not API misuse.
const RULES: &[(&[&str], FailureCategory)] = &[
    (&["timed out", "timeout"], FailureCategory::ExecutionTimeout),
    (
        &["unreachable", "connection refused", "unavailable", "service down"],
        FailureCategory::BackendUnavailable,
    ),
    (
        &["not planar", "non-planar", "coplanar"],
        FailureCategory::NonPlanarGeometry,
    ),
    (
        &["not closed", "unclosed", "open wire", "open profile"],
        FailureCategory::UnclosedOutline,
    ),
    (
        &["fillet", "chamfer"],
        FailureCategory::FilletOrChamferFailure,
    ),
    (
        &["boolean", "cut failed", "union failed", "intersect"],
        FailureCategory::BooleanOperationFailure,
    ),
    (
        &["empty mesh", "no result", "degenerate", "zero volume", "no solid"],
        FailureCategory::EmptyOrDegenerateOutput,
    ),
    (
        &["syntaxerror", "syntax error", "unexpected token", "invalid syntax"],
        FailureCategory::SyntaxInvalid,
    ),
    (
        &["attributeerror", "no attribute", "unknown method", "typeerror", "unexpected argument"],
        FailureCategory::InvalidApiUsage,
    ),
];

/// Categorize an external failure message.
///
/// Falls back to `InvalidApiUsage`: an unrecognized kernel complaint is
/// most commonly a misused API call.
#[must_use]
pub fn categorize_failure(message: &str) -> FailureCategory {
    let lower = message.to_lowercase();
    for (keywords, category) in RULES {
        if keywords.iter().any(|k| lower.contains(k)) {
            return *category;
        }
    }
    FailureCategory::InvalidApiUsage
}

/// The repair instruction injected into the next generation prompt.
#[must_use]
pub fn repair_template(category: FailureCategory) -> &'static str {
    match category {
        FailureCategory::SyntaxInvalid => {
            "The previous code had a syntax error. Rewrite it as valid code, \
             checking bracket balance and statement structure."
        }
        FailureCategory::InvalidApiUsage => {
            "The previous code called the geometry API incorrectly. Use only \
             documented methods with their exact signatures."
        }
        FailureCategory::NonPlanarGeometry => {
            "A sketch was not planar. Keep each 2D profile on a single \
             workplane before extruding."
        }
        FailureCategory::UnclosedOutline => {
            "A profile was not closed. Close every outline (end where it \
             started) before extruding or revolving."
        }
        FailureCategory::FilletOrChamferFailure => {
            "A fillet or chamfer failed. Reduce the radius, or apply it to \
             fewer edges, so it fits the adjacent geometry."
        }
        FailureCategory::BooleanOperationFailure => {
            "A boolean operation failed. Ensure the two solids actually \
             overlap and are both valid closed volumes."
        }
        FailureCategory::ExecutionTimeout => {
            "Execution timed out. Simplify the model: fewer features, lower \
             counts in patterns, no unbounded loops."
        }
        FailureCategory::EmptyOrDegenerateOutput => {
            "Execution produced no usable solid. Make sure the final result \
             is assigned and is a non-empty 3D solid."
        }
        FailureCategory::ConstraintViolation => {
            "The output violated stated constraints. Re-read the dimensional \
             requirements and set the sizes exactly."
        }
        FailureCategory::ExtractionFailure => {
            "The previous response contained no extractable code block. \
             Reply with a single fenced code block and nothing else."
        }
        FailureCategory::BackendUnavailable => {
            "The execution backend was unavailable. Produce simple, \
             conservative code that will run without retries."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_beats_other_keywords() {
        // "timed out" appears alongside "fillet": the earlier rule wins.
        let category = categorize_failure("fillet operation timed out after 30s");
        assert_eq!(category, FailureCategory::ExecutionTimeout);
    }

    #[test]
    fn fillet_messages_categorize_specifically() {
        assert_eq!(
            categorize_failure("BRep_API: fillet radius too large"),
            FailureCategory::FilletOrChamferFailure
        );
    }

    #[test]
    fn unknown_messages_fall_back_to_api_usage() {
        assert_eq!(
            categorize_failure("kaboom: unknown internal condition 0x7f"),
            FailureCategory::InvalidApiUsage
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(
            categorize_failure("SyntaxError: invalid syntax at line 3"),
            FailureCategory::SyntaxInvalid
        );
    }

    #[test]
    fn every_category_has_a_repair_template() {
        let all = [
            FailureCategory::SyntaxInvalid,
            FailureCategory::InvalidApiUsage,
            FailureCategory::NonPlanarGeometry,
            FailureCategory::UnclosedOutline,
            FailureCategory::FilletOrChamferFailure,
            FailureCategory::BooleanOperationFailure,
            FailureCategory::ExecutionTimeout,
            FailureCategory::EmptyOrDegenerateOutput,
            FailureCategory::ConstraintViolation,
            FailureCategory::ExtractionFailure,
            FailureCategory::BackendUnavailable,
        ];
        for category in all {
            assert!(!repair_template(category).is_empty());
            assert!(!category.name().is_empty());
        }
    }

    #[test]
    fn only_constraint_violation_is_non_fatal() {
        assert!(FailureCategory::ConstraintViolation.is_non_fatal());
        assert!(!FailureCategory::ExecutionTimeout.is_non_fatal());
    }
}
