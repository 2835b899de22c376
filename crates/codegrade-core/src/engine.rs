//! Request engine.
//!
//! Validates a request, resolves its evaluators against the registry, runs
//! them concurrently with per-evaluator timeouts and fault isolation, then
//! normalizes and aggregates the results into one response.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::aggregate::{aggregate, AggregationPolicy};
use crate::error::{EvaluationError, RequestError};
use crate::model::{CodeArtifact, EvaluationRequest, EvaluationResponse, EvaluatorResult};
use crate::normalize::Normalizer;
use crate::registry::EvaluatorRegistry;
use crate::traits::{panic_message, Evaluator};

/// Default maximum artifact length in characters.
pub const DEFAULT_MAX_CODE_LENGTH: usize = 100_000;

/// Default per-evaluator time budget.
pub const DEFAULT_EVALUATOR_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the evaluation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum accepted code length, in characters.
    pub max_code_length: usize,
    /// Time budget for each evaluator invocation.
    pub evaluator_timeout: Duration,
    /// How sub-scores are combined.
    pub aggregation: AggregationPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_code_length: DEFAULT_MAX_CODE_LENGTH,
            evaluator_timeout: DEFAULT_EVALUATOR_TIMEOUT,
            aggregation: AggregationPolicy::unweighted(),
        }
    }
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_evaluator_start(&self, evaluator: &str);
    fn on_evaluator_complete(&self, result: &EvaluatorResult);
    fn on_request_complete(&self, total: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_evaluator_start(&self, _: &str) {}
    fn on_evaluator_complete(&self, _: &EvaluatorResult) {}
    fn on_request_complete(&self, _: usize, _: usize, _: Duration) {}
}

/// Request lifecycle phases, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Received,
    Validating,
    Resolving,
    Executing,
    Normalizing,
    Aggregating,
    Responded,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Received => "received",
            Phase::Validating => "validating",
            Phase::Resolving => "resolving",
            Phase::Executing => "executing",
            Phase::Normalizing => "normalizing",
            Phase::Aggregating => "aggregating",
            Phase::Responded => "responded",
            Phase::Failed => "failed",
        };
        f.write_str(s)
    }
}

fn enter(phase: Phase) {
    tracing::debug!(%phase, "request phase");
}

/// The evaluation engine. Cheap to share behind an `Arc`.
pub struct EvaluationEngine {
    registry: Arc<EvaluatorRegistry>,
    normalizer: Normalizer,
    config: EngineConfig,
}

impl EvaluationEngine {
    pub fn new(registry: Arc<EvaluatorRegistry>, normalizer: Normalizer, config: EngineConfig) -> Self {
        Self {
            registry,
            normalizer,
            config,
        }
    }

    pub fn registry(&self) -> &EvaluatorRegistry {
        &self.registry
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate a request.
    pub async fn evaluate(&self, request: EvaluationRequest) -> Result<EvaluationResponse, RequestError> {
        self.evaluate_with_progress(request, &NoopReporter).await
    }

    /// Evaluate a request, reporting per-evaluator progress.
    ///
    /// Dropping the returned future cancels every evaluator still running.
    pub async fn evaluate_with_progress(
        &self,
        request: EvaluationRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<EvaluationResponse, RequestError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("evaluate", %request_id);

        async move {
            let result = self.run(request_id, request, progress).await;
            match &result {
                Ok(_) => enter(Phase::Responded),
                Err(e) => {
                    enter(Phase::Failed);
                    tracing::info!(kind = e.kind(), "request rejected: {e}");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        request_id: Uuid,
        request: EvaluationRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<EvaluationResponse, RequestError> {
        let start = Instant::now();
        enter(Phase::Received);

        enter(Phase::Validating);
        let (artifact, names) = self.validate(request)?;

        enter(Phase::Resolving);
        let resolved = self.resolve(&names)?;

        enter(Phase::Executing);
        let results = self.execute(artifact, resolved, progress).await;

        enter(Phase::Normalizing);
        let scores: BTreeMap<String, Option<f64>> = results
            .iter()
            .map(|(name, result)| {
                let score = result
                    .payload()
                    .and_then(|payload| self.normalizer.normalize(name, payload));
                (name.clone(), score)
            })
            .collect();

        enter(Phase::Aggregating);
        let overall_score = aggregate(&scores, &self.config.aggregation);

        let failed = results.values().filter(|r| !r.is_success()).count();
        let elapsed = start.elapsed();
        progress.on_request_complete(results.len(), failed, elapsed);
        tracing::info!(
            evaluators = results.len(),
            failed,
            overall = %overall_score,
            "evaluation complete"
        );

        Ok(EvaluationResponse {
            request_id,
            results,
            scores,
            overall_score,
            timestamp: chrono::Utc::now(),
            duration_ms: elapsed.as_millis() as u64,
        })
    }

    /// Check the artifact and work out which evaluators were asked for.
    fn validate(&self, request: EvaluationRequest) -> Result<(CodeArtifact, Vec<String>), RequestError> {
        if request.code.trim().is_empty() {
            return Err(RequestError::InvalidRequest("code cannot be empty".into()));
        }

        let artifact = CodeArtifact::new(request.code);
        let length = artifact.char_len();
        if length > self.config.max_code_length {
            return Err(RequestError::InvalidRequest(format!(
                "code is {length} characters long, maximum is {}",
                self.config.max_code_length
            )));
        }

        let names = match request.evaluators {
            None => self.registry.names(),
            Some(requested) => {
                if requested.is_empty() {
                    return Err(RequestError::InvalidRequest(
                        "at least one evaluator must be requested".into(),
                    ));
                }
                let mut seen = HashSet::new();
                requested
                    .into_iter()
                    .filter(|name| seen.insert(name.clone()))
                    .collect()
            }
        };

        if names.is_empty() {
            return Err(RequestError::InvalidRequest("no evaluators are registered".into()));
        }

        Ok((artifact, names))
    }

    /// Resolve every name up front so an unknown one fails before anything runs.
    fn resolve(&self, names: &[String]) -> Result<Vec<(String, Arc<dyn Evaluator>)>, RequestError> {
        names
            .iter()
            .map(|name| {
                self.registry
                    .resolve(name)
                    .map(|evaluator| (name.clone(), evaluator))
                    .map_err(|_| RequestError::UnknownEvaluator(name.clone()))
            })
            .collect()
    }

    async fn execute(
        &self,
        artifact: CodeArtifact,
        resolved: Vec<(String, Arc<dyn Evaluator>)>,
        progress: &dyn ProgressReporter,
    ) -> BTreeMap<String, EvaluatorResult> {
        let names: Vec<String> = resolved.iter().map(|(name, _)| name.clone()).collect();
        let timeout = self.config.evaluator_timeout;

        // Dropping the set aborts every task still in flight.
        let mut tasks = JoinSet::new();
        for (name, evaluator) in resolved {
            progress.on_evaluator_start(&name);
            tasks.spawn(run_isolated(name, evaluator, artifact.clone(), timeout).in_current_span());
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => {
                    progress.on_evaluator_complete(&result);
                    results.insert(result.evaluator.clone(), result);
                }
                Err(e) => tracing::error!("evaluator task lost: {e}"),
            }
        }

        // Every requested evaluator gets an entry, even if its task vanished.
        for name in names {
            results.entry(name.clone()).or_insert_with(|| {
                let lost = EvaluationError::Internal("evaluator task did not complete".into());
                let result = EvaluatorResult::failure(name, &lost, 0);
                progress.on_evaluator_complete(&result);
                result
            });
        }

        results
    }
}

/// Invoke one evaluator, converting timeouts and panics into failure envelopes.
async fn run_isolated(
    name: String,
    evaluator: Arc<dyn Evaluator>,
    artifact: CodeArtifact,
    timeout: Duration,
) -> EvaluatorResult {
    let start = Instant::now();
    let invocation = AssertUnwindSafe(evaluator.evaluate(&artifact)).catch_unwind();

    let outcome = match tokio::time::timeout(timeout, invocation).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => Err(EvaluationError::Internal(format!(
            "evaluator panicked: {}",
            panic_message(panic.as_ref())
        ))),
        Err(_) => Err(EvaluationError::Timeout {
            after_ms: timeout.as_millis() as u64,
        }),
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    match outcome {
        Ok(payload) => {
            tracing::debug!(evaluator = %name, duration_ms, "evaluator succeeded");
            EvaluatorResult::success(name, payload, duration_ms)
        }
        Err(e) => {
            tracing::warn!(evaluator = %name, kind = %e.kind(), "evaluator failed: {e}");
            EvaluatorResult::failure(name, &e, duration_ms)
        }
    }
}
