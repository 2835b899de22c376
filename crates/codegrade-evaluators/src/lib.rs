//! codegrade-evaluators — Built-in evaluators and engine bootstrap.
//!
//! Three in-process analyzers over Python source (correctness,
//! maintainability, security) share one tokenizer. A command evaluator
//! plugs in any external tool that prints JSON. The config module turns a
//! TOML evaluator table into a ready [`codegrade_core::EvaluationEngine`].

pub mod command;
pub mod config;
pub mod correctness;
pub mod error;
pub mod lexer;
pub mod maintainability;
pub mod mock;
pub mod security;

pub use command::CommandEvaluator;
pub use config::{
    build_engine, build_normalizer, build_registry, create_evaluator, engine_config, load_config,
    load_config_from, CodegradeConfig, EvaluatorEntry, EvaluatorKind,
};
pub use correctness::CorrectnessEvaluator;
pub use error::InitError;
pub use maintainability::MaintainabilityEvaluator;
pub use mock::{MockBehavior, MockEvaluator};
pub use security::{SecurityEvaluator, SeverityWeights};
