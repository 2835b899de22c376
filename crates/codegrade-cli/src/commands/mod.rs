pub mod evaluate;
pub mod init;
pub mod list_evaluators;
pub mod serve;
pub mod submit;
pub mod validate;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use codegrade_core::EvaluationRequest;

/// Read source from a file, or from stdin when the path is `-`.
pub fn read_source(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut code = String::new();
        std::io::stdin()
            .read_to_string(&mut code)
            .context("failed to read source from stdin")?;
        Ok(code)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read source file: {}", path.display()))
    }
}

/// Build a request from source and an optional comma-separated evaluator list.
pub fn build_request(code: String, evaluators: Option<&str>) -> EvaluationRequest {
    let request = EvaluationRequest::new(code);
    match evaluators {
        Some(list) => request.with_evaluators(
            list.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty()),
        ),
        None => request,
    }
}
