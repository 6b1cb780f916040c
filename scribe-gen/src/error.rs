//! Error types for scribe-gen
//!
//! - [`PipelineError`]: failures that stop a whole pipeline invocation. Per-unit
//!   failures inside a batch are never escalated; they become outcome data.
//! - [`ApiError`]: HTTP mapping of everything a handler can return.

use crate::types::UnitFailure;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Pipeline-level errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Nothing to process (empty batch, blank topic, no platforms)
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Document has no text block worth sending to the backend
    #[error("Document contains no text blocks to process")]
    EmptyDocument,

    /// Identifier with no directive mapping
    #[error("Unknown key: {0}")]
    UnknownKey(String),

    /// Malformed request content (e.g. duplicate block index)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Single-call generation failed (no batch to absorb the failure)
    #[error("Generation failed: {0}")]
    Generation(#[from] UnitFailure),

    /// Fatal configuration problem
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<scribe_common::Error> for PipelineError {
    fn from(err: scribe_common::Error) -> Self {
        match err {
            scribe_common::Error::InvalidInput(msg) => PipelineError::InvalidInput(msg),
            other => PipelineError::Configuration(other.to_string()),
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Pipeline error
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Pipeline(ref err) => {
                let (status, code) = match err {
                    PipelineError::EmptyInput(_) => (StatusCode::BAD_REQUEST, "EMPTY_INPUT"),
                    PipelineError::EmptyDocument => (StatusCode::BAD_REQUEST, "EMPTY_DOCUMENT"),
                    PipelineError::UnknownKey(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_KEY"),
                    PipelineError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
                    PipelineError::Generation(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
                    PipelineError::Configuration(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR")
                    }
                };
                (status, code, err.to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
