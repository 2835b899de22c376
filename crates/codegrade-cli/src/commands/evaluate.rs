//! The `codegrade evaluate` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use codegrade_core::{EvaluationResponse, EvaluatorResult, ProgressReporter};
use codegrade_evaluators::config::{build_engine, load_config_from};

use super::{build_request, read_source};

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_evaluator_start(&self, evaluator: &str) {
        eprintln!("  Starting: {evaluator}");
    }

    fn on_evaluator_complete(&self, result: &EvaluatorResult) {
        let status = match result.failure_envelope() {
            None => "OK".to_string(),
            Some(envelope) => format!("FAIL ({})", envelope.kind),
        };
        eprintln!(
            "  Done: {} [{}] ({}ms)",
            result.evaluator, status, result.duration_ms
        );
    }

    fn on_request_complete(&self, total: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {}/{total} succeeded, {failed} failed ({:.1}s)",
            total - failed,
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(
    file: PathBuf,
    evaluators: Option<String>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(
        matches!(format.as_str(), "json" | "table"),
        "unknown format '{format}', expected json or table"
    );

    let config = load_config_from(config_path.as_deref())?;
    let engine = build_engine(&config)?;
    let code = read_source(&file)?;
    let request = build_request(code, evaluators.as_deref());

    let response = engine.evaluate_with_progress(request, &ConsoleReporter).await?;

    match format.as_str() {
        "table" => print_table(&response),
        _ => println!("{}", serde_json::to_string_pretty(&response)?),
    }
    Ok(())
}

fn print_table(response: &EvaluationResponse) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Evaluator", "Status", "Score", "Duration", "Detail"]);

    for (name, result) in &response.results {
        let score = response
            .scores
            .get(name)
            .copied()
            .flatten()
            .map(|s| format!("{s:.1}"))
            .unwrap_or_else(|| "-".to_string());
        let (status, detail) = match result.failure_envelope() {
            None => ("ok".to_string(), String::new()),
            Some(envelope) => (envelope.kind.to_string(), envelope.message.clone()),
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(status),
            Cell::new(score),
            Cell::new(format!("{}ms", result.duration_ms)),
            Cell::new(detail),
        ]);
    }

    println!("{table}");
    println!("Overall score: {}", response.overall_score);
    println!("Request: {} ({}ms)", response.request_id, response.duration_ms);
}
