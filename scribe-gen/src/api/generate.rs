//! Article generation API
//!
//! POST /api/generate

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::{error::ApiResult, types::Archetype, AppState};

/// POST /api/generate request
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub topic: String,
}

/// POST /api/generate response
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    /// HTML article with media placeholders resolved
    pub content: String,
    pub archetype: Archetype,
}

/// POST /api/generate
///
/// Classify the topic, generate one article and resolve its image placeholders.
pub async fn generate_article(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<Json<GenerateResponse>> {
    tracing::info!(topic = %request.topic, "Generate article");

    let article = state
        .observe(state.pipeline.generate(&request.topic).await)
        .await?;

    Ok(Json(GenerateResponse {
        content: article.content,
        archetype: article.archetype,
    }))
}

/// Build generation routes
pub fn generate_routes() -> Router<AppState> {
    Router::new().route("/api/generate", post(generate_article))
}
