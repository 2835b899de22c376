//! codegrade-core — Evaluator registry, normalization, aggregation and the
//! request engine.
//!
//! This crate defines the evaluator plugin contract and everything needed to
//! turn a set of independently failing evaluators into one scored response.
//! It performs no analysis itself; concrete evaluators live in
//! `codegrade-evaluators`.

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod registry;
pub mod traits;

pub use aggregate::{aggregate, AggregationPolicy};
pub use engine::{EngineConfig, EvaluationEngine, NoopReporter, ProgressReporter};
pub use error::{EvaluationError, RegistryError, RequestError};
pub use model::{
    CodeArtifact, EvaluationRequest, EvaluationResponse, EvaluatorResult, FailureEnvelope,
    FailureKind, Outcome, OverallScore,
};
pub use normalize::{Normalizer, ScoreRule};
pub use registry::EvaluatorRegistry;
pub use traits::{analyze_blocking, Evaluator};
