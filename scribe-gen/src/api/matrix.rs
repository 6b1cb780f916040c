//! Platform matrix API
//!
//! POST /api/matrix

use std::collections::BTreeMap;

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiResult, PipelineError},
    types::Platform,
    AppState,
};

/// POST /api/matrix request
#[derive(Debug, Deserialize)]
pub struct MatrixRequest {
    pub topic: String,
    /// Platform ids (`xhs`, `douyin`, `wechat`, `linkedin`), case-insensitive
    #[serde(default)]
    pub platforms: Vec<String>,
}

/// POST /api/matrix response
#[derive(Debug, Serialize)]
pub struct MatrixResponse {
    /// Platform id -> generated copy (or failure marker)
    pub results: BTreeMap<Platform, String>,
}

/// Parse every platform id before anything is dispatched
fn parse_platforms(ids: &[String]) -> Result<Vec<Platform>, PipelineError> {
    ids.iter()
        .map(|id| {
            id.parse::<Platform>()
                .map_err(|e| PipelineError::UnknownKey(e.to_string()))
        })
        .collect()
}

/// POST /api/matrix
pub async fn generate_matrix(
    State(state): State<AppState>,
    Json(request): Json<MatrixRequest>,
) -> ApiResult<Json<MatrixResponse>> {
    tracing::info!(topic = %request.topic, platforms = ?request.platforms, "Generate matrix");

    let platforms = parse_platforms(&request.platforms)?;
    let results = state
        .observe(state.pipeline.matrix(&request.topic, &platforms).await)
        .await?;

    Ok(Json(MatrixResponse { results }))
}

/// Build matrix routes
pub fn matrix_routes() -> Router<AppState> {
    Router::new().route("/api/matrix", post(generate_matrix))
}
