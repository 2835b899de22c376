//! Error types for the evaluation core.
//!
//! Request-level errors abort a request before any evaluator runs. Evaluation
//! errors never cross the evaluator boundary as faults: the engine turns them
//! into failure envelopes inside the response.

use thiserror::Error;

use crate::model::FailureKind;

/// Errors that reject a whole evaluation request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The request is malformed: empty code, code over the length bound, or
    /// an empty evaluator list.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A requested evaluator name is not registered.
    #[error("unknown evaluator: {0}")]
    UnknownEvaluator(String),
}

impl RequestError {
    /// Stable error kind reported to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::InvalidRequest(_) => "InvalidRequest",
            RequestError::UnknownEvaluator(_) => "UnknownEvaluator",
        }
    }
}

/// Errors raised by the evaluator registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// An evaluator with this name is already registered.
    #[error("evaluator '{0}' is already registered")]
    DuplicateName(String),

    /// No evaluator is registered under this name.
    #[error("evaluator '{0}' is not registered")]
    UnknownEvaluator(String),
}

/// A failure inside one evaluator's analysis.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    /// The analysis could not be carried out on this artifact
    /// (unparsable source, malformed tool output).
    #[error("analysis failed: {0}")]
    Analysis(String),

    /// An external tool crashed or exited unsuccessfully.
    #[error("tool failed: {0}")]
    Tool(String),

    /// The evaluator did not finish within its time budget.
    #[error("evaluator timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// The evaluator panicked or its task was lost.
    #[error("internal evaluator fault: {0}")]
    Internal(String),
}

impl EvaluationError {
    /// The failure kind recorded in the result envelope.
    pub fn kind(&self) -> FailureKind {
        match self {
            EvaluationError::Analysis(_) => FailureKind::AnalysisError,
            EvaluationError::Tool(_) => FailureKind::ToolError,
            EvaluationError::Timeout { .. } => FailureKind::TimeoutError,
            EvaluationError::Internal(_) => FailureKind::InternalError,
        }
    }
}
