//! Startup error types.

use thiserror::Error;

use codegrade_core::RegistryError;

/// Errors that prevent an engine from being built from configuration.
#[derive(Debug, Error)]
pub enum InitError {
    /// An evaluator entry cannot be turned into an evaluator.
    #[error("evaluator '{name}' is misconfigured: {reason}")]
    InvalidEvaluator { name: String, reason: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// An aggregation weight is zero, negative or not a number.
    #[error("weight for '{name}' must be a positive number, got {weight}")]
    InvalidWeight { name: String, weight: f64 },

    /// A weight names an evaluator that is not configured.
    #[error("weight given for unconfigured evaluator '{0}'")]
    UnknownWeight(String),

    /// A top-level setting is out of range.
    #[error("invalid setting '{setting}': {reason}")]
    InvalidSetting { setting: &'static str, reason: String },

    #[error("no evaluators are configured")]
    NoEvaluators,
}
