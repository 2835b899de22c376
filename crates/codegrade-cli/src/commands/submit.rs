//! The `codegrade submit` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use codegrade_core::EvaluationRequest;

use super::{build_request, read_source};

const REQUEST_TIMEOUT_SECS: u64 = 300;

pub async fn execute(url: String, file: PathBuf, evaluators: Option<String>) -> Result<()> {
    let code = read_source(&file)?;
    let request = build_request(code, evaluators.as_deref());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .context("failed to build HTTP client")?;

    let response = submit(&client, &url, &request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// POST a request to `{base_url}/evaluate` and return the response body.
///
/// Service-side request errors come back as `{error, message}` bodies and
/// are turned into an error carrying both.
pub async fn submit(
    client: &reqwest::Client,
    base_url: &str,
    request: &EvaluationRequest,
) -> Result<serde_json::Value> {
    let endpoint = format!("{}/evaluate", base_url.trim_end_matches('/'));
    let response = client
        .post(&endpoint)
        .json(request)
        .send()
        .await
        .with_context(|| format!("failed to reach {endpoint}"))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .context("failed to read response body")?;

    if !status.is_success() {
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                let error = v.get("error")?.as_str()?.to_string();
                let message = v.get("message")?.as_str()?.to_string();
                Some(format!("{error}: {message}"))
            })
            .unwrap_or(body);
        anyhow::bail!("service returned HTTP {}: {detail}", status.as_u16());
    }

    serde_json::from_str(&body).context("service returned invalid JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn successful_submission() {
        let server = MockServer::start().await;

        let response_body = serde_json::json!({
            "request_id": "6f1c2f9e-3f4b-4c1e-9a55-0d6f0b7f2a10",
            "results": {},
            "scores": {"correctness": 100.0},
            "overall_score": 100.0,
            "timestamp": "2026-01-01T00:00:00Z",
            "duration_ms": 3
        });

        Mock::given(method("POST"))
            .and(path("/evaluate"))
            .and(body_partial_json(serde_json::json!({
                "code": "x = 1",
                "evaluators": ["correctness"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let request = build_request("x = 1".into(), Some("correctness"));
        let body = submit(&client, &format!("{}/", server.uri()), &request)
            .await
            .unwrap();
        assert_eq!(body["overall_score"], 100.0);
    }

    #[tokio::test]
    async fn request_error_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/evaluate"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": "UnknownEvaluator",
                "message": "unknown evaluator: pylint"
            })))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let request = build_request("x = 1".into(), Some("pylint"));
        let err = submit(&client, &server.uri(), &request).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("404"), "{msg}");
        assert!(msg.contains("UnknownEvaluator: unknown evaluator: pylint"), "{msg}");
    }

    #[tokio::test]
    async fn non_json_error_body_is_kept() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/evaluate"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let err = submit(&client, &server.uri(), &EvaluationRequest::new("x"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bad gateway"));
    }
}
