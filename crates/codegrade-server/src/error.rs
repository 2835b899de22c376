//! HTTP error mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use codegrade_core::RequestError;

/// Errors returned by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The engine rejected the request.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The body could not be read as an evaluation request.
    #[error(transparent)]
    Body(#[from] JsonRejection),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Request(RequestError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            ApiError::Request(RequestError::UnknownEvaluator(_)) => StatusCode::NOT_FOUND,
            ApiError::Body(rejection) => rejection.status(),
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            ApiError::Request(err) => ErrorResponse {
                error: err.kind(),
                message: err.to_string(),
            },
            ApiError::Body(rejection) => ErrorResponse {
                error: "InvalidRequest",
                message: rejection.body_text(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
