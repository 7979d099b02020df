//! Syntax layer: static pre-execution rule check
//!
//! Mirrors the standalone validate endpoint of the execution service: a
//! cheap, deterministic screen that runs before any kernel dispatch.
//! Checks forbidden API patterns, required structural markers, balanced
//! delimiters and literal-type issues.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Patterns the sandboxed kernel refuses; generating them is always wrong.
const FORBIDDEN: &[&str] = &[
    "import os",
    "import sys",
    "import subprocess",
    "__import__",
    "eval(",
    "exec(",
    "open(",
    "while True",
];

/// Markers a well-formed candidate must carry: a geometry API entry point
/// and a bound result.
const REQUIRED_MARKERS: &[(&str, &str)] = &[
    ("cq.", "no geometry API usage (expected `cq.` calls)"),
    ("result", "no `result` binding for the final solid"),
];

static SUSPECT_NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d+\.\d+\.\d+").expect("numeric literal regex"));

/// Outcome of the syntax screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntaxReport {
    /// Whether the code may proceed to execution
    pub valid: bool,
    /// Blocking findings
    pub errors: Vec<String>,
    /// Non-blocking findings
    pub warnings: Vec<String>,
}

/// Stateless syntax checker, also callable standalone.
#[derive(Debug, Clone, Default)]
pub struct SyntaxChecker;

impl SyntaxChecker {
    /// Create a checker.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Screen candidate code.
    #[must_use]
    pub fn check(&self, code: &str) -> SyntaxReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if code.trim().is_empty() {
            errors.push("code is empty".to_string());
            return SyntaxReport {
                valid: false,
                errors,
                warnings,
            };
        }

        for pattern in FORBIDDEN {
            if code.contains(pattern) {
                errors.push(format!("forbidden pattern: `{pattern}`"));
            }
        }

        for (marker, message) in REQUIRED_MARKERS {
            if !code.contains(marker) {
                errors.push((*message).to_string());
            }
        }

        for (open, close, label) in [('(', ')', "parentheses"), ('[', ']', "brackets")] {
            let opens = code.matches(open).count();
            let closes = code.matches(close).count();
            if opens != closes {
                errors.push(format!("unbalanced {label}: {opens} open, {closes} close"));
            }
        }

        if code.matches('"').count() % 2 != 0 {
            errors.push("unbalanced double quotes".to_string());
        }

        // Malformed numeric literals (e.g. 1.2.3) slip through keyword
        // checks but always fail downstream.
        if SUSPECT_NUMERIC.is_match(code) {
            errors.push("malformed numeric literal".to_string());
        }

        if !code.contains('#') && !code.contains("//") {
            warnings.push("no explanatory comments".to_string());
        }

        SyntaxReport {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}
