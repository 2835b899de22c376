//! The evaluator plugin contract.
//!
//! Every quality dimension implements [`Evaluator`]. Implementations live in
//! `codegrade-evaluators`; the engine only ever sees trait objects.

use async_trait::async_trait;

use crate::error::EvaluationError;
use crate::model::CodeArtifact;

/// A named unit of analysis over one code artifact.
///
/// Implementations must be stateless across calls and must report internal
/// failures as [`EvaluationError`] values. The engine still isolates panics,
/// but a well-behaved evaluator never relies on that.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// The kind of analysis (e.g. "security"). The registry key is the
    /// evaluator's identity and may differ from its kind.
    fn kind(&self) -> &str;

    /// Analyze a validated artifact and return an evaluator-specific payload.
    async fn evaluate(&self, artifact: &CodeArtifact) -> Result<serde_json::Value, EvaluationError>;
}

/// Run a CPU-bound analysis on the blocking pool.
///
/// Keeping heavy work off the async workers lets the per-evaluator timeout
/// fire while the analysis is still running. A panic inside `analysis` is
/// reported as [`EvaluationError::Internal`].
pub async fn analyze_blocking<F>(analysis: F) -> Result<serde_json::Value, EvaluationError>
where
    F: FnOnce() -> Result<serde_json::Value, EvaluationError> + Send + 'static,
{
    match tokio::task::spawn_blocking(analysis).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(EvaluationError::Internal(format!(
            "analysis panicked: {}",
            panic_message(e.into_panic().as_ref())
        ))),
        Err(e) => Err(EvaluationError::Internal(format!("analysis task lost: {e}"))),
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
