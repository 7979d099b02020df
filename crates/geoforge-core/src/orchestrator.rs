//! The bounded generate → validate → repair loop
//!
//! One `process` call per request. Each iteration generates a candidate,
//! validates it, and either terminates on a pass or feeds the categorized
//! failure back into the next prompt. An execution-layer failure earns one
//! targeted repair regeneration before the next iteration slot is
//! consumed. On exhaustion the best-scoring candidate is returned; failure
//! is a data value, callers always get something renderable.

use crate::events::SessionEvent;
use crate::gateway::{GenerationGateway, PromptContext, SAFE_PLACEHOLDER};
use crate::metrics::{FailureSummary, MetricsCollector, MetricsEntry};
use crate::ForgeError;
use chrono::Utc;
use geoforge_plan::{analyze, plan, ExecutionPlan, Request};
use geoforge_retrieval::{ExampleRecord, ExampleStore, RetrievalEngine, RetrievedExample};
use geoforge_validate::{FailureCategory, LayerResult, MultiLayerValidator, ValidationReport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use ulid::Ulid;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct ForgeConfig {
    /// Maximum generation iterations per request
    pub max_iterations: u32,
    /// Wall-clock budget for the whole refinement, checked between
    /// iterations
    pub wall_time: Duration,
}

impl ForgeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With iteration cap
    #[inline]
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// With wall-clock budget
    #[inline]
    #[must_use]
    pub fn with_wall_time(mut self, wall_time: Duration) -> Self {
        self.wall_time = wall_time;
        self
    }
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            wall_time: Duration::from_secs(120),
        }
    }
}

/// Cooperative cancellation handle shared between the session and the
/// loop. One-way: once cancelled, a flag never resets.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an uncancelled flag.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One validated generation attempt.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The candidate code
    pub code: String,
    /// Iteration that produced it
    pub iteration: u32,
    /// Full validation outcome
    pub report: ValidationReport,
}

/// One categorized failure, in occurrence order.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    /// Iteration the failure occurred in
    pub iteration: u32,
    /// Failure category
    pub category: FailureCategory,
    /// Representative error message
    pub message: String,
}

/// Terminal result of one refinement.
#[derive(Debug, Clone)]
pub struct RefinementOutcome {
    /// Loop-scoped request id
    pub request_id: String,
    /// The best candidate produced
    pub candidate: Candidate,
    /// The execution plan that drove the loop
    pub plan: ExecutionPlan,
    /// Iterations consumed
    pub iterations_used: u32,
    /// Total wall-clock duration
    pub duration: Duration,
    /// Whether the candidate passed validation
    pub passed: bool,
    /// Every categorized failure, oldest first
    pub failure_history: Vec<FailureRecord>,
}

/// Drives requests to terminal state.
pub struct RefinementOrchestrator {
    gateway: GenerationGateway,
    validator: MultiLayerValidator,
    store: Arc<ExampleStore>,
    retrieval: RetrievalEngine,
    metrics: Arc<MetricsCollector>,
    config: ForgeConfig,
}

impl std::fmt::Debug for RefinementOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefinementOrchestrator")
            .field("config", &self.config)
            .finish()
    }
}

impl RefinementOrchestrator {
    /// Assemble the orchestrator from its collaborators.
    #[must_use]
    pub fn new(
        gateway: GenerationGateway,
        validator: MultiLayerValidator,
        store: Arc<ExampleStore>,
        retrieval: RetrievalEngine,
        metrics: Arc<MetricsCollector>,
        config: ForgeConfig,
    ) -> Self {
        Self {
            gateway,
            validator,
            store,
            retrieval,
            metrics,
            config,
        }
    }

    /// Drive one request to terminal state.
    ///
    /// Emits progress over `events` when given; sends are best-effort and
    /// never stall the loop. Cancellation discards candidates and writes
    /// nothing to the store.
    pub async fn process(
        &self,
        request: &Request,
        cancel: &CancelFlag,
        events: Option<&mpsc::Sender<SessionEvent>>,
    ) -> Result<RefinementOutcome, ForgeError> {
        let started = Instant::now();
        let request_id = Ulid::new().to_string();

        let analysis = match analyze(request) {
            Ok(analysis) => analysis,
            Err(err) => {
                self.record_metrics(&request_id, started, 0, false, None, 0.0, 0.0);
                return Err(ForgeError::Plan(err));
            }
        };
        let mut plan = plan(&analysis);

        emit(
            events,
            SessionEvent::Planning {
                request_id: request_id.clone(),
                strategy: plan.strategy,
                constraint_count: plan.ordered_constraints.len(),
            },
        );

        // Retrieval failure degrades to an example-free prompt.
        let examples = match self
            .retrieval
            .retrieve(&self.store, &request.raw_text, &analysis.category, analysis.complexity)
            .await
        {
            Ok(examples) => examples,
            Err(err) => {
                tracing::warn!(error = %err, "retrieval failed, prompting without examples");
                Vec::new()
            }
        };
        if let Some(phase) = plan.phases.first_mut() {
            phase.example_refs = examples.iter().map(|e| e.id.clone()).collect();
        }
        let plan = plan;

        let mut candidates: Vec<Candidate> = Vec::new();
        let mut failures: Vec<FailureRecord> = Vec::new();
        let mut iterations_used = 0;
        let mut terminal_pass = false;

        // A dead backend fails every candidate identically; record it once
        // and skip the loop instead of spending the iteration budget.
        let iteration_budget = if self.validator.kernel_healthy().await {
            self.config.max_iterations
        } else {
            tracing::warn!(request_id = %request_id, "geometry backend failed the health probe");
            failures.push(FailureRecord {
                iteration: 0,
                category: FailureCategory::BackendUnavailable,
                message: "geometry backend failed the health probe".to_string(),
            });
            0
        };

        for iteration in 1..=iteration_budget {
            if cancel.is_cancelled() {
                return self.cancelled(&request_id, started, iterations_used, analysis.complexity);
            }
            if started.elapsed() >= self.config.wall_time {
                tracing::warn!(
                    request_id = %request_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "wall-clock budget exhausted"
                );
                break;
            }

            iterations_used = iteration;
            emit(
                events,
                SessionEvent::IterationStarted {
                    request_id: request_id.clone(),
                    iteration,
                },
            );

            let digest: Vec<(FailureCategory, String)> = failures
                .iter()
                .map(|f| (f.category, f.message.clone()))
                .collect();
            let prompt = self.gateway.build_prompt(&PromptContext {
                request_text: &request.raw_text,
                phase: plan.first_phase(),
                examples: &examples,
                failure_digest: &digest,
            });

            let (code, generation_failure) = self.gateway.generate(&prompt).await;
            if let Some(category) = generation_failure {
                failures.push(FailureRecord {
                    iteration,
                    category,
                    message: format!("generation degraded: {category}"),
                });
            }

            let report = self.validate_candidate(&request_id, iteration, &code, &plan, events).await;
            let passed = report.passed;
            record_report_failure(&mut failures, iteration, &report);
            candidates.push(Candidate {
                code: code.clone(),
                iteration,
                report,
            });
            if passed {
                terminal_pass = true;
                break;
            }

            // An execution-layer failure earns one targeted repair attempt
            // within the same iteration slot.
            let repair = candidates
                .last()
                .filter(|c| c.report.execution == LayerResult::Failed)
                .and_then(|c| c.report.failure.map(|f| (f, first_error(&c.report))));
            if let Some((category, message)) = repair {
                emit(
                    events,
                    SessionEvent::Repairing {
                        request_id: request_id.clone(),
                        category: category.name().to_string(),
                    },
                );
                let prompt = self.gateway.build_repair_prompt(&code, category, &message);
                let (repaired, _) = self.gateway.generate(&prompt).await;
                let report = self
                    .validate_candidate(&request_id, iteration, &repaired, &plan, events)
                    .await;
                let passed = report.passed;
                record_report_failure(&mut failures, iteration, &report);
                candidates.push(Candidate {
                    code: repaired,
                    iteration,
                    report,
                });
                if passed {
                    terminal_pass = true;
                    break;
                }
            }
        }

        if cancel.is_cancelled() {
            return self.cancelled(&request_id, started, iterations_used, analysis.complexity);
        }

        // Exhausted with nothing attempted (zero budget): validate the
        // placeholder so the outcome still carries a report.
        if candidates.is_empty() {
            let report = self
                .validator
                .validate(SAFE_PLACEHOLDER, &plan.ordered_constraints)
                .await;
            candidates.push(Candidate {
                code: SAFE_PLACEHOLDER.to_string(),
                iteration: 0,
                report,
            });
        }

        // Explicit best-candidate fold; strict greater-than keeps the
        // first-seen candidate on score ties.
        let best = candidates
            .iter()
            .fold(&candidates[0], |best, candidate| {
                if candidate.report.overall_score > best.report.overall_score {
                    candidate
                } else {
                    best
                }
            })
            .clone();

        if terminal_pass {
            let record = ExampleRecord::new(
                request.raw_text.clone(),
                best.code.clone(),
                analysis.category.clone(),
                analysis.complexity,
                best.report.overall_score,
            );
            // Persistence is best-effort; a store fault never fails a
            // request that already passed.
            match self.store.record_success(record).await {
                Ok(stored) => {
                    tracing::info!(request_id = %request_id, stored, "candidate passed");
                }
                Err(err) => {
                    tracing::warn!(request_id = %request_id, error = %err, "example persistence failed");
                }
            }
        } else if let Some(last) = failures.last() {
            self.metrics.record_failure(FailureSummary {
                request_id: request_id.clone(),
                category: last.category.name().to_string(),
                message: last.message.clone(),
            });
        }

        let duration = started.elapsed();
        self.record_metrics(
            &request_id,
            started,
            iterations_used,
            terminal_pass,
            best.report.failure,
            analysis.complexity,
            best.report.overall_score,
        );
        emit(
            events,
            SessionEvent::Terminal {
                request_id: request_id.clone(),
                passed: terminal_pass,
                code: best.code.clone(),
                report: best.report.clone(),
                plan: plan.clone(),
                iterations: iterations_used,
                duration_ms: duration.as_millis() as u64,
            },
        );

        Ok(RefinementOutcome {
            request_id,
            candidate: best,
            plan,
            iterations_used,
            duration,
            passed: terminal_pass,
            failure_history: failures,
        })
    }

    async fn validate_candidate(
        &self,
        request_id: &str,
        iteration: u32,
        code: &str,
        plan: &ExecutionPlan,
        events: Option<&mpsc::Sender<SessionEvent>>,
    ) -> ValidationReport {
        let report = self.validator.validate(code, &plan.ordered_constraints).await;
        tracing::debug!(
            request_id,
            iteration,
            score = report.overall_score,
            passed = report.passed,
            "candidate validated"
        );
        emit(
            events,
            SessionEvent::ValidationCompleted {
                request_id: request_id.to_string(),
                iteration,
                score: report.overall_score,
                passed: report.passed,
            },
        );
        report
    }

    fn cancelled(
        &self,
        request_id: &str,
        started: Instant,
        iterations_used: u32,
        complexity: f32,
    ) -> Result<RefinementOutcome, ForgeError> {
        tracing::info!(request_id, iterations_used, "request cancelled, discarding candidates");
        self.record_metrics(request_id, started, iterations_used, false, None, complexity, 0.0);
        Err(ForgeError::Cancelled)
    }

    #[allow(clippy::too_many_arguments)]
    fn record_metrics(
        &self,
        request_id: &str,
        started: Instant,
        iterations: u32,
        succeeded: bool,
        failure: Option<FailureCategory>,
        complexity: f32,
        score: f32,
    ) {
        self.metrics.record(MetricsEntry {
            request_id: request_id.to_string(),
            recorded_at: Utc::now(),
            duration_ms: started.elapsed().as_millis() as u64,
            iterations,
            succeeded,
            failure_category: failure.map(|f| f.name().to_string()),
            complexity,
            score,
        });
    }

    /// Orchestrator configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    /// Examples currently retrievable for a request, exposed for probes.
    pub async fn preview_examples(
        &self,
        request: &Request,
    ) -> Result<Vec<RetrievedExample>, ForgeError> {
        let analysis = analyze(request)?;
        Ok(self
            .retrieval
            .retrieve(&self.store, &request.raw_text, &analysis.category, analysis.complexity)
            .await?)
    }
}

fn emit(events: Option<&mpsc::Sender<SessionEvent>>, event: SessionEvent) {
    if let Some(sender) = events {
        // Best-effort: a slow or closed consumer never stalls the loop.
        if let Err(err) = sender.try_send(event) {
            tracing::debug!(error = %err, "session event dropped");
        }
    }
}

fn record_report_failure(
    failures: &mut Vec<FailureRecord>,
    iteration: u32,
    report: &ValidationReport,
) {
    if report.passed {
        return;
    }
    if let Some(category) = report.failure {
        failures.push(FailureRecord {
            iteration,
            category,
            message: first_error(report),
        });
    }
}

fn first_error(report: &ValidationReport) -> String {
    report
        .errors
        .first()
        .cloned()
        .unwrap_or_else(|| "validation failed without a recorded error".to_string())
}
