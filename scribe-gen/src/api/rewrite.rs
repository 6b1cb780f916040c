//! Rewrite API
//!
//! - POST /api/rewrite: caller-segmented blocks (`[{index, content}]`)
//! - POST /api/rewrite/document: whole Quill Delta, embeds and formatting preserved

use axum::{extract::State, routing::post, Json, Router};
use scribe_common::FailurePolicy;
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiResult,
    pipeline::{
        blocks::{Delta, DeltaOp, TextSegment},
        RewriteStats,
    },
    AppState,
};

/// POST /api/rewrite request
#[derive(Debug, Deserialize)]
pub struct RewriteRequest {
    pub blocks: Vec<TextSegment>,
    /// `retain` or `annotate`; configured default when absent
    #[serde(default)]
    pub failure_policy: Option<FailurePolicy>,
}

/// One rewritten block
#[derive(Debug, Serialize)]
pub struct RewrittenBlock {
    pub index: usize,
    #[serde(rename = "newContent")]
    pub new_content: String,
}

/// POST /api/rewrite response
#[derive(Debug, Serialize)]
pub struct RewriteResponse {
    /// One entry per submitted block, in input order
    pub data: Vec<RewrittenBlock>,
}

/// POST /api/rewrite/document request
#[derive(Debug, Deserialize)]
pub struct DocumentRewriteRequest {
    pub ops: Vec<DeltaOp>,
    #[serde(default)]
    pub failure_policy: Option<FailurePolicy>,
    /// TEXT threshold override
    #[serde(default)]
    pub min_chars: Option<usize>,
}

/// POST /api/rewrite/document response
#[derive(Debug, Serialize)]
pub struct DocumentRewriteResponse {
    pub ops: Vec<DeltaOp>,
    pub stats: RewriteStats,
}

/// POST /api/rewrite
pub async fn rewrite_blocks(
    State(state): State<AppState>,
    Json(request): Json<RewriteRequest>,
) -> ApiResult<Json<RewriteResponse>> {
    tracing::info!(
        blocks = request.blocks.len(),
        policy = ?request.failure_policy,
        "Rewrite blocks"
    );

    let segments = state
        .observe(
            state
                .pipeline
                .rewrite(request.blocks, request.failure_policy)
                .await,
        )
        .await?;

    let data = segments
        .into_iter()
        .map(|segment| RewrittenBlock {
            index: segment.index,
            new_content: segment.content,
        })
        .collect();

    Ok(Json(RewriteResponse { data }))
}

/// POST /api/rewrite/document
pub async fn rewrite_document(
    State(state): State<AppState>,
    Json(request): Json<DocumentRewriteRequest>,
) -> ApiResult<Json<DocumentRewriteResponse>> {
    tracing::info!(ops = request.ops.len(), policy = ?request.failure_policy, "Rewrite document");

    let rewritten = state
        .observe(
            state
                .pipeline
                .rewrite_document(
                    Delta { ops: request.ops },
                    request.failure_policy,
                    request.min_chars,
                )
                .await,
        )
        .await?;

    tracing::info!(stats = ?rewritten.stats, "Document rewrite complete");

    Ok(Json(DocumentRewriteResponse {
        ops: rewritten.delta.ops,
        stats: rewritten.stats,
    }))
}

/// Build rewrite routes
pub fn rewrite_routes() -> Router<AppState> {
    Router::new()
        .route("/api/rewrite", post(rewrite_blocks))
        .route("/api/rewrite/document", post(rewrite_document))
}
