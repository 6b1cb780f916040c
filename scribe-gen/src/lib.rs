//! scribe-gen library interface
//!
//! Block-based content transformation service: article generation, block
//! rewriting and per-platform copy matrices over an OpenAI-compatible
//! chat completions backend.

pub mod api;
pub mod error;
pub mod pipeline;
pub mod services;
pub mod types;

pub use crate::error::{ApiError, ApiResult, PipelineError};
pub use crate::pipeline::Pipeline;

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Transformation pipeline (immutable after startup)
    pub pipeline: Arc<Pipeline>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last upstream or configuration error, reported by /health
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Pass a pipeline result through, remembering server-side failures
    pub async fn observe<T>(&self, result: Result<T, PipelineError>) -> Result<T, PipelineError> {
        if let Err(err) = &result {
            if matches!(err, PipelineError::Generation(_) | PipelineError::Configuration(_)) {
                tracing::error!(error = %err, "Pipeline failure");
                *self.last_error.write().await = Some(err.to_string());
            }
        }
        result
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::generate_routes())
        .merge(api::rewrite_routes())
        .merge(api::matrix_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
