//! Generation gateway
//!
//! Builds prompts from the task, retrieved examples and the failure
//! digest, calls the external language-model backend, and extracts a code
//! block tolerantly: fenced block first, then a loose whole-response
//! heuristic, then a deterministic safe placeholder. Extraction never
//! aborts the loop.

use async_trait::async_trait;
use geoforge_plan::Phase;
use geoforge_retrieval::RetrievedExample;
use geoforge_validate::FailureCategory;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Minimal renderable code emitted when nothing better exists. Callers
/// always receive something the viewer can display.
pub const SAFE_PLACEHOLDER: &str =
    "# placeholder: generation produced no usable code\nresult = cq.Workplane(\"XY\").box(10, 10, 10)\n";

/// Structured failure from the model backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelFailure {
    /// Backend reachable but the call failed
    #[error("model request failed: {0}")]
    RequestFailed(String),

    /// Backend unreachable
    #[error("model backend unavailable: {0}")]
    Unavailable(String),
}

/// External language-model boundary.
#[async_trait]
pub trait CodeModel: Send + Sync {
    /// Generate a raw response for a prompt. May contain prose, fences,
    /// or nothing useful; extraction is the gateway's job.
    async fn generate(&self, prompt: &str) -> Result<String, ModelFailure>;
}

/// Everything a prompt is assembled from.
#[derive(Debug, Clone, Default)]
pub struct PromptContext<'a> {
    /// The raw request text
    pub request_text: &'a str,
    /// The phase currently driving generation
    pub phase: Option<&'a Phase>,
    /// Retrieved examples biasing the output
    pub examples: &'a [RetrievedExample],
    /// Categories of prior failures, oldest first
    pub failure_digest: &'a [(FailureCategory, String)],
}

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:python|py)?\s*\n(.*?)```").expect("fenced block regex")
});

/// Prompt construction and tolerant extraction around a `CodeModel`.
pub struct GenerationGateway {
    model: Arc<dyn CodeModel>,
}

impl std::fmt::Debug for GenerationGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationGateway").finish()
    }
}

impl GenerationGateway {
    /// Create a gateway around a model backend.
    #[inline]
    #[must_use]
    pub fn new(model: Arc<dyn CodeModel>) -> Self {
        Self { model }
    }

    /// Build the generation prompt for a context.
    #[must_use]
    pub fn build_prompt(&self, context: &PromptContext<'_>) -> String {
        let mut prompt = String::with_capacity(1024);
        prompt.push_str(
            "Generate geometry code for the following design request. \
             Respond with a single fenced code block.\n\n",
        );
        prompt.push_str("Request: ");
        prompt.push_str(context.request_text);
        prompt.push('\n');

        if let Some(phase) = context.phase {
            prompt.push_str(&format!(
                "\nCurrent phase: {} ({})\n",
                phase.name, phase.approach
            ));
            for task in &phase.tasks {
                prompt.push_str(&format!("- {}\n", task.description));
            }
        }

        if !context.examples.is_empty() {
            prompt.push_str("\nReference examples of verified solutions:\n");
            for example in context.examples {
                prompt.push_str(&format!(
                    "\n### Example ({}):\n// prompt: {}\n{}\n",
                    example.category, example.prompt, example.code
                ));
            }
        }

        if !context.failure_digest.is_empty() {
            prompt.push_str("\nPrevious attempts failed; avoid repeating these mistakes:\n");
            for (category, message) in context.failure_digest {
                prompt.push_str(&format!("- [{category}] {message}\n"));
            }
        }

        prompt
    }

    /// Build the narrow repair prompt used immediately after an
    /// execution-layer failure.
    #[must_use]
    pub fn build_repair_prompt(
        &self,
        code: &str,
        category: FailureCategory,
        error_message: &str,
    ) -> String {
        format!(
            "The following code failed during execution.\n\
             Error: {error_message}\n\
             {}\n\n\
             Fix this specific error and return the corrected code as a \
             single fenced code block. Change as little as possible.\n\n\
             ```python\n{code}\n```",
            geoforge_validate::repair_template(category)
        )
    }

    /// Call the backend and extract code from whatever came back.
    ///
    /// Returns the code plus the failure category to record when
    /// extraction or the backend degraded, so the orchestrator can keep
    /// looping instead of aborting.
    pub async fn generate(&self, prompt: &str) -> (String, Option<FailureCategory>) {
        match self.model.generate(prompt).await {
            Ok(response) => match extract_code(&response) {
                Some(code) => (code, None),
                None => {
                    tracing::warn!("no code block extractable from model response");
                    (
                        SAFE_PLACEHOLDER.to_string(),
                        Some(FailureCategory::ExtractionFailure),
                    )
                }
            },
            Err(ModelFailure::Unavailable(message)) => {
                tracing::warn!(error = %message, "model backend unavailable");
                (
                    SAFE_PLACEHOLDER.to_string(),
                    Some(FailureCategory::BackendUnavailable),
                )
            }
            Err(ModelFailure::RequestFailed(message)) => {
                tracing::warn!(error = %message, "model request failed");
                (
                    SAFE_PLACEHOLDER.to_string(),
                    Some(FailureCategory::ExtractionFailure),
                )
            }
        }
    }
}

/// Extract a code block: fenced first, then loose heuristic.
#[must_use]
fn extract_code(response: &str) -> Option<String> {
    if let Some(captures) = FENCED_BLOCK.captures(response) {
        let code = captures.get(1)?.as_str().trim();
        if !code.is_empty() {
            return Some(code.to_string());
        }
    }

    // Loose heuristic: the whole response already reads like code.
    let trimmed = response.trim();
    if !trimmed.is_empty() && trimmed.contains("cq.") && trimmed.contains("result") {
        let code: Vec<&str> = trimmed
            .lines()
            .skip_while(|line| !looks_like_code(line))
            .collect();
        if !code.is_empty() {
            return Some(code.join("\n"));
        }
    }

    None
}

fn looks_like_code(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('#')
        || trimmed.starts_with("import ")
        || trimmed.contains("cq.")
        || trimmed.contains('=')
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticModel(&'static str);

    #[async_trait]
    impl CodeModel for StaticModel {
        async fn generate(&self, _prompt: &str) -> Result<String, ModelFailure> {
            Ok(self.0.to_string())
        }
    }

    struct DownModel;

    #[async_trait]
    impl CodeModel for DownModel {
        async fn generate(&self, _prompt: &str) -> Result<String, ModelFailure> {
            Err(ModelFailure::Unavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn fenced_block_is_extracted() {
        let response = "Here is the code:\n```python\nresult = cq.Workplane(\"XY\").box(1, 1, 1)\n```\nEnjoy!";
        let code = extract_code(response).unwrap();
        assert_eq!(code, "result = cq.Workplane(\"XY\").box(1, 1, 1)");
    }

    #[test]
    fn unlabeled_fence_is_extracted() {
        let response = "```\nresult = cq.Workplane(\"XY\").box(2, 2, 2)\n```";
        assert!(extract_code(response).is_some());
    }

    #[test]
    fn bare_code_is_accepted_loosely() {
        let response = "Sure thing, here you go.\nresult = cq.Workplane(\"XY\").box(3, 3, 3)";
        let code = extract_code(response).unwrap();
        assert!(code.starts_with("result ="));
    }

    #[test]
    fn prose_only_yields_nothing() {
        assert!(extract_code("I cannot help with that request.").is_none());
    }

    #[tokio::test]
    async fn extraction_failure_substitutes_placeholder() {
        let gateway = GenerationGateway::new(Arc::new(StaticModel("no code here")));
        let (code, category) = gateway.generate("prompt").await;
        assert_eq!(code, SAFE_PLACEHOLDER);
        assert_eq!(category, Some(FailureCategory::ExtractionFailure));
    }

    #[tokio::test]
    async fn unavailable_backend_substitutes_placeholder() {
        let gateway = GenerationGateway::new(Arc::new(DownModel));
        let (code, category) = gateway.generate("prompt").await;
        assert_eq!(code, SAFE_PLACEHOLDER);
        assert_eq!(category, Some(FailureCategory::BackendUnavailable));
    }

    #[test]
    fn prompt_carries_examples_and_digest() {
        let gateway = GenerationGateway::new(Arc::new(StaticModel("")));
        let examples = vec![RetrievedExample {
            id: "e1".to_string(),
            prompt: "a box".to_string(),
            code: "result = cq.Workplane(\"XY\").box(1, 1, 1)".to_string(),
            category: "box".to_string(),
            quality_score: 90.0,
            similarity: 0.9,
        }];
        let digest = vec![(
            FailureCategory::ExecutionTimeout,
            "execution timed out after 30s".to_string(),
        )];
        let prompt = gateway.build_prompt(&PromptContext {
            request_text: "a bigger box",
            phase: None,
            examples: &examples,
            failure_digest: &digest,
        });

        assert!(prompt.contains("a bigger box"));
        assert!(prompt.contains("Reference examples"));
        assert!(prompt.contains("executionTimeout"));
    }

    #[test]
    fn repair_prompt_names_the_error_and_keeps_the_code() {
        let gateway = GenerationGateway::new(Arc::new(StaticModel("")));
        let prompt = gateway.build_repair_prompt(
            "result = cq.Workplane(\"XY\").box(1, 1, 1)",
            FailureCategory::BooleanOperationFailure,
            "cut failed: solids do not intersect",
        );
        assert!(prompt.contains("cut failed"));
        assert!(prompt.contains("Fix this specific error"));
        assert!(prompt.contains("box(1, 1, 1)"));
    }

    #[test]
    fn placeholder_is_renderable() {
        // The placeholder must itself pass the syntax screen, or the
        // exhausted path could return non-renderable output.
        let report = geoforge_validate::SyntaxChecker::new().check(SAFE_PLACEHOLDER);
        assert!(report.valid, "errors: {:?}", report.errors);
    }
}
