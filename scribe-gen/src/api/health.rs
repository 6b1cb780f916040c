//! Health check endpoint
//!
//! Reports liveness plus the effective pipeline limits. A recorded upstream or
//! configuration failure turns the status to `degraded` until the next restart.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use scribe_common::FailurePolicy;
use serde::Serialize;

use crate::pipeline::PipelineConfig;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    /// Serving, but the last generation or configuration step failed
    Degraded,
}

/// Effective fan-out settings
#[derive(Debug, Serialize)]
pub struct PipelineSummary {
    pub max_concurrency: usize,
    pub unit_timeout_secs: u64,
    pub min_block_chars: usize,
    pub failure_policy: FailurePolicy,
}

impl From<&PipelineConfig> for PipelineSummary {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_concurrency: config.dispatch.max_concurrency,
            unit_timeout_secs: config.dispatch.unit_timeout.as_secs(),
            min_block_chars: config.min_block_chars,
            failure_policy: config.default_policy,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub module: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub pipeline: PipelineSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds()
        .max(0) as u64;
    let last_error = state.last_error.read().await.clone();

    Json(HealthResponse {
        status: if last_error.is_some() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Ok
        },
        module: "scribe-gen",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds,
        pipeline: PipelineSummary::from(state.pipeline.config()),
        last_error,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
