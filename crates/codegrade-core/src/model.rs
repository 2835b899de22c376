//! Request, result and response types.
//!
//! These are the values that cross the external interface: the submitted
//! request, the per-evaluator result envelope, and the aggregate response.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EvaluationError;

/// A request to evaluate one piece of source code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// The source code to evaluate.
    pub code: String,
    /// Evaluator names to run. `None` runs every registered evaluator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluators: Option<Vec<String>>,
}

impl EvaluationRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            evaluators: None,
        }
    }

    pub fn with_evaluators<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.evaluators = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

/// Validated source text shared read-only by every evaluator of a request.
#[derive(Debug, Clone)]
pub struct CodeArtifact {
    source: Arc<str>,
}

impl CodeArtifact {
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Cheap owned handle to the text, for moving into blocking tasks.
    pub fn shared(&self) -> Arc<str> {
        Arc::clone(&self.source)
    }

    /// Length in characters, the unit of the request length bound.
    pub fn char_len(&self) -> usize {
        self.source.chars().count()
    }
}

/// Kind of failure recorded in a failure envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    AnalysisError,
    ToolError,
    TimeoutError,
    InternalError,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::AnalysisError => "AnalysisError",
            FailureKind::ToolError => "ToolError",
            FailureKind::TimeoutError => "TimeoutError",
            FailureKind::InternalError => "InternalError",
        };
        f.write_str(s)
    }
}

/// The error half of a result envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEnvelope {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&EvaluationError> for FailureEnvelope {
    fn from(err: &EvaluationError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Success payload or failure envelope of one evaluator invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Evaluator-specific structured output.
    Results(serde_json::Value),
    /// A caught failure.
    Error(FailureEnvelope),
}

/// Raw result of one evaluator, tagged with its producer and generation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorResult {
    /// Identity of the evaluator that produced this result.
    pub evaluator: String,
    /// When the result was produced.
    pub timestamp: DateTime<Utc>,
    /// Wall-clock time spent in the evaluator.
    pub duration_ms: u64,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl EvaluatorResult {
    pub fn success(evaluator: impl Into<String>, payload: serde_json::Value, duration_ms: u64) -> Self {
        Self {
            evaluator: evaluator.into(),
            timestamp: Utc::now(),
            duration_ms,
            outcome: Outcome::Results(payload),
        }
    }

    pub fn failure(evaluator: impl Into<String>, error: &EvaluationError, duration_ms: u64) -> Self {
        Self {
            evaluator: evaluator.into(),
            timestamp: Utc::now(),
            duration_ms,
            outcome: Outcome::Error(FailureEnvelope::from(error)),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Results(_))
    }

    pub fn payload(&self) -> Option<&serde_json::Value> {
        match &self.outcome {
            Outcome::Results(v) => Some(v),
            Outcome::Error(_) => None,
        }
    }

    pub fn failure_envelope(&self) -> Option<&FailureEnvelope> {
        match &self.outcome {
            Outcome::Results(_) => None,
            Outcome::Error(e) => Some(e),
        }
    }
}

/// The overall score, or an explicit marker that none could be computed.
///
/// Serializes as a number or as `null`; the field is never omitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverallScore {
    Computed(f64),
    Absent,
}

impl OverallScore {
    pub fn value(&self) -> Option<f64> {
        match self {
            OverallScore::Computed(v) => Some(*v),
            OverallScore::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, OverallScore::Absent)
    }
}

impl fmt::Display for OverallScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallScore::Computed(v) => write!(f, "{v:.2}"),
            OverallScore::Absent => f.write_str("n/a"),
        }
    }
}

/// The response to a successful evaluation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResponse {
    /// Identifier of this request, also attached to its log lines.
    pub request_id: Uuid,
    /// One entry per requested evaluator.
    pub results: BTreeMap<String, EvaluatorResult>,
    /// Normalized sub-score per requested evaluator (`null` when unscored).
    pub scores: BTreeMap<String, Option<f64>>,
    /// Mean of the available sub-scores.
    pub overall_score: OverallScore,
    /// When the response was assembled.
    pub timestamp: DateTime<Utc>,
    /// Total wall-clock time of the request.
    pub duration_ms: u64,
}
