//! codegrade-server — HTTP front end for the evaluation engine.
//!
//! Routes:
//! - `GET /` welcome message
//! - `GET /health` liveness
//! - `GET /evaluators` registered evaluators with their kinds and score rules
//! - `POST /evaluate` run an evaluation request
//!
//! A client disconnect drops the handler future, which cancels the
//! evaluators still running for that request.

pub mod error;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use codegrade_core::{EvaluationEngine, EvaluationRequest, EvaluationResponse, ScoreRule};

pub use error::{ApiError, ErrorResponse};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<EvaluationEngine>,
}

impl AppState {
    pub fn new(engine: EvaluationEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/evaluators", get(list_evaluators))
        .route("/evaluate", post(evaluate))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl+C.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "codegrade listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("codegrade shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}

#[derive(Debug, Serialize)]
struct RootResponse {
    message: &'static str,
    version: &'static str,
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Welcome to the codegrade evaluation API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
    })
}

#[derive(Debug, Serialize)]
struct EvaluatorInfo {
    name: String,
    kind: String,
    score_rule: Option<ScoreRule>,
}

#[derive(Debug, Serialize)]
struct EvaluatorsResponse {
    evaluators: Vec<EvaluatorInfo>,
}

async fn list_evaluators(State(state): State<AppState>) -> Json<EvaluatorsResponse> {
    let engine = &state.engine;
    let evaluators = engine
        .registry()
        .entries()
        .map(|(name, kind)| EvaluatorInfo {
            name: name.to_string(),
            kind: kind.to_string(),
            score_rule: engine.normalizer().rule(name).cloned(),
        })
        .collect();
    Json(EvaluatorsResponse { evaluators })
}

async fn evaluate(
    State(state): State<AppState>,
    body: Result<Json<EvaluationRequest>, JsonRejection>,
) -> Result<Json<EvaluationResponse>, ApiError> {
    let Json(request) = body?;
    let response = state.engine.evaluate(request).await?;
    Ok(Json(response))
}
