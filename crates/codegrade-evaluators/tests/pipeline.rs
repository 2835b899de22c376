//! End-to-end engine tests with the built-in evaluators.
//!
//! These run real analyses on the blocking pool, so they use the real clock.
//! Timeout and cancellation cases use mock evaluators and a paused clock.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use codegrade_core::{
    EngineConfig, EvaluationEngine, EvaluationError, EvaluationRequest, EvaluatorRegistry,
    FailureKind, Normalizer, OverallScore, RequestError,
};
use codegrade_evaluators::config::{build_engine, CodegradeConfig, EvaluatorEntry, EvaluatorKind};
use codegrade_evaluators::{CorrectnessEvaluator, MockEvaluator};
use serde_json::json;

const CLEAN: &str = "\
def add(a, b):
    \"\"\"Add two numbers.\"\"\"
    return a + b
";

const VULNERABLE: &str = "import os\ndef execute_command(cmd):\n    os.system(cmd)";

fn default_engine() -> EvaluationEngine {
    build_engine(&CodegradeConfig::default()).unwrap()
}

fn request(code: &str, evaluators: &[&str]) -> EvaluationRequest {
    EvaluationRequest::new(code).with_evaluators(evaluators.iter().copied())
}

// --- Scenarios ---

#[tokio::test]
async fn valid_syntax_scores_100_despite_style_issues() {
    let engine = default_engine();
    let response = engine
        .evaluate(request("def add(a,b):\n return a+b", &["correctness"]))
        .await
        .unwrap();

    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["results"]["correctness"]["results"]["syntax_valid"], true);
    assert!(!value["results"]["correctness"]["results"]["style_errors"]
        .as_array()
        .unwrap()
        .is_empty());
    assert_eq!(value["overall_score"], 100.0);
}

#[tokio::test]
async fn empty_code_is_rejected() {
    let err = default_engine()
        .evaluate(request("", &["correctness"]))
        .await
        .unwrap_err();
    assert!(matches!(err, RequestError::InvalidRequest(_)));
}

#[tokio::test]
async fn unknown_evaluator_is_rejected() {
    let err = default_engine()
        .evaluate(request(CLEAN, &["correctness", "nonexistent"]))
        .await
        .unwrap_err();
    assert_eq!(err, RequestError::UnknownEvaluator("nonexistent".into()));
}

#[tokio::test(start_paused = true)]
async fn timed_out_security_leaves_no_overall_score() {
    let mut registry = EvaluatorRegistry::new();
    registry
        .register(
            "security",
            Arc::new(MockEvaluator::delayed(
                Duration::from_secs(60),
                json!({"security_score": 100.0}),
            )),
        )
        .unwrap();
    let engine = EvaluationEngine::new(
        Arc::new(registry),
        Normalizer::with_defaults(),
        EngineConfig {
            evaluator_timeout: Duration::from_millis(200),
            ..Default::default()
        },
    );

    let response = engine.evaluate(request(CLEAN, &["security"])).await.unwrap();
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["results"]["security"]["error"]["kind"], "TimeoutError");
    assert!(value["overall_score"].is_null());
    assert!(value["scores"]["security"].is_null());
}

// --- Built-in analyzers together ---

#[tokio::test]
async fn default_set_runs_every_builtin() {
    let engine = default_engine();
    let response = engine.evaluate(EvaluationRequest::new(CLEAN)).await.unwrap();

    assert_eq!(
        response.results.keys().collect::<Vec<_>>(),
        vec!["correctness", "maintainability", "security"]
    );
    assert!(response.results.values().all(|r| r.is_success()));

    let scores: Vec<f64> = response.scores.values().map(|s| s.unwrap()).collect();
    assert_eq!(scores.len(), 3);
    let mean = scores.iter().sum::<f64>() / 3.0;
    let overall = response.overall_score.value().unwrap();
    assert!((overall - mean).abs() < 1e-9);

    assert_eq!(response.scores["correctness"], Some(100.0));
    assert_eq!(response.scores["security"], Some(100.0));
    let mi = response.scores["maintainability"].unwrap();
    assert!(mi > 50.0 && mi <= 100.0, "mi = {mi}");
}

#[tokio::test]
async fn shell_execution_lowers_the_security_score() {
    let response = default_engine()
        .evaluate(request(VULNERABLE, &["security"]))
        .await
        .unwrap();
    let payload = response.results["security"].payload().unwrap();
    assert!(!payload["security_issues"].as_array().unwrap().is_empty());
    let score = response.scores["security"].unwrap();
    assert!(score < 100.0);
    assert_eq!(response.overall_score, OverallScore::Computed(score));
}

#[tokio::test]
async fn untokenizable_code_fails_analyzers_but_not_the_request() {
    let response = default_engine()
        .evaluate(EvaluationRequest::new("def broken(:\n    pass\n"))
        .await
        .unwrap();

    let correctness = response.results["correctness"].payload().unwrap();
    assert_eq!(correctness["syntax_valid"], false);
    assert!(correctness["syntax_error"]["line"].is_number());

    for name in ["maintainability", "security"] {
        let envelope = response.results[name].failure_envelope().unwrap();
        assert_eq!(envelope.kind, FailureKind::AnalysisError, "{name}");
        assert_eq!(response.scores[name], None);
    }
    // Only the correctness flag is left, and it is zero.
    assert_eq!(response.overall_score, OverallScore::Computed(0.0));
}

#[tokio::test]
async fn weights_shift_the_overall_score() {
    let mut config = CodegradeConfig::default();
    config.weights.insert("security".into(), 3.0);
    let engine = build_engine(&config).unwrap();

    let response = engine
        .evaluate(request(VULNERABLE, &["correctness", "security"]))
        .await
        .unwrap();
    assert_eq!(response.scores["correctness"], Some(100.0));
    assert_eq!(response.scores["security"], Some(70.0));
    // (100 * 1 + 70 * 3) / 4
    assert_eq!(response.overall_score, OverallScore::Computed(77.5));
}

#[cfg(unix)]
#[tokio::test]
async fn command_evaluator_joins_the_pipeline() {
    let mut config = CodegradeConfig::default();
    config.evaluators.insert(
        "lint".into(),
        EvaluatorEntry {
            kind: EvaluatorKind::Command {
                program: "sh".into(),
                args: vec!["-c".into(), r#"cat > /dev/null; echo '{"score": 80}'"#.into()],
                env: BTreeMap::new(),
            },
            score: Some(codegrade_core::ScoreRule::bounded("score")),
        },
    );
    let engine = build_engine(&config).unwrap();

    let response = engine
        .evaluate(request("x = 1\n", &["lint", "correctness"]))
        .await
        .unwrap();
    assert_eq!(response.scores["lint"], Some(80.0));
    assert_eq!(response.overall_score, OverallScore::Computed(90.0));
}

// --- Fault isolation ---

#[tokio::test]
async fn panicking_plugin_does_not_take_down_builtins() {
    let mut registry = EvaluatorRegistry::new();
    registry
        .register("correctness", Arc::new(CorrectnessEvaluator::default()))
        .unwrap();
    registry
        .register("flaky", Arc::new(MockEvaluator::panicking("plugin bug")))
        .unwrap();
    registry
        .register(
            "broken",
            Arc::new(MockEvaluator::failing(EvaluationError::Tool("exit 2".into()))),
        )
        .unwrap();
    let engine = EvaluationEngine::new(
        Arc::new(registry),
        Normalizer::with_defaults(),
        EngineConfig::default(),
    );

    let response = engine.evaluate(EvaluationRequest::new(CLEAN)).await.unwrap();
    assert_eq!(response.results.len(), 3);
    assert!(response.results["correctness"].is_success());

    let flaky = response.results["flaky"].failure_envelope().unwrap();
    assert_eq!(flaky.kind, FailureKind::InternalError);
    assert!(flaky.message.contains("plugin bug"));

    let broken = response.results["broken"].failure_envelope().unwrap();
    assert_eq!(broken.kind, FailureKind::ToolError);

    assert_eq!(response.overall_score, OverallScore::Computed(100.0));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_request_cancels_running_evaluators() {
    let cancelled = Arc::new(AtomicBool::new(false));
    let slow = Arc::new(
        MockEvaluator::delayed(Duration::from_secs(60), json!({}))
            .with_cancel_flag(Arc::clone(&cancelled)),
    );
    let mut registry = EvaluatorRegistry::new();
    registry.register("slow", slow.clone()).unwrap();
    let engine = Arc::new(EvaluationEngine::new(
        Arc::new(registry),
        Normalizer::new(),
        EngineConfig::default(),
    ));

    let handle = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.evaluate(EvaluationRequest::new(CLEAN)).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(slow.call_count(), 1);

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(cancelled.load(Ordering::SeqCst));
}
