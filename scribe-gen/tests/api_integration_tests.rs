//! Integration tests for scribe-gen API endpoints
//!
//! Drives the in-process router with `oneshot` against scripted backends.

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use helpers::{test_app, Behavior, FixedMedia, ScriptedBackend};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = test_app(Arc::new(ScriptedBackend::new()), FixedMedia::default());

    let (status, json) = get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "scribe-gen");
    assert!(json["uptime_seconds"].is_u64());
    assert!(json.get("last_error").is_none());

    // Effective pipeline limits
    assert_eq!(json["pipeline"]["max_concurrency"], 4);
    assert_eq!(json["pipeline"]["min_block_chars"], 5);
    assert_eq!(json["pipeline"]["failure_policy"], "retain");
    assert!(json["pipeline"]["unit_timeout_secs"].is_u64());
}

// ============================================================================
// /api/generate
// ============================================================================

#[tokio::test]
async fn test_generate_resolves_placeholders() {
    // Given: backend returns an article with one resolvable and one dead marker
    let backend = Arc::new(ScriptedBackend::new().on(
        "开始撰写",
        Behavior::Reply(
            "<h1>二手手机怎么挑</h1>{{IMG_SEARCH:二手手机}}<p>正文</p>{{IMG_SEARCH:找不到}}".to_string(),
        ),
    ));
    let media = FixedMedia::default().with("二手手机", "https://img.example.com/phone.jpg");
    let (app, _) = test_app(backend.clone(), media);

    // When
    let (status, json) = post_json(app, "/api/generate", json!({"topic": "二手手机推荐"})).await;

    // Then: review archetype, markers gone, found image inlined
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["archetype"], "REVIEW");
    let content = json["content"].as_str().unwrap();
    assert!(!content.contains("IMG_SEARCH"));
    assert!(content.contains(r#"src="https://img.example.com/phone.jpg""#));
    assert!(content.contains("<p>正文</p>"));
    assert_eq!(backend.calls(), 1);

    // The topic reaches the backend through the directive templates
    let prompt = &backend.prompts()[0];
    assert!(prompt.user.contains("二手手机推荐"));
    assert!(prompt.system.contains("数码/市场行情分析师"));
    assert_eq!(prompt.max_tokens, Some(4096));
}

#[tokio::test]
async fn test_generate_blank_topic_rejected() {
    let backend = Arc::new(ScriptedBackend::new());
    let (app, _) = test_app(backend.clone(), FixedMedia::default());

    let (status, json) = post_json(app, "/api/generate", json!({"topic": "   "})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "EMPTY_INPUT");
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_generate_backend_failure_is_bad_gateway() {
    // Given: backend rejects the key
    let backend = Arc::new(ScriptedBackend::new().on("开始撰写", Behavior::Status(401, "Invalid token")));
    let (app, _) = test_app(backend, FixedMedia::default());

    // When
    let (status, json) = post_json(app.clone(), "/api/generate", json!({"topic": "量子计算是什么"})).await;

    // Then: 502 carrying the classified failure, remembered by /health
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["code"], "UPSTREAM_ERROR");
    let message = json["error"]["message"].as_str().unwrap();
    assert!(message.contains("authentication failed"));
    assert!(message.contains("Invalid token"));

    let (_, health) = get_json(app, "/health").await;
    assert_eq!(health["status"], "degraded");
    assert!(health["last_error"].as_str().unwrap().contains("authentication failed"));
}

// ============================================================================
// /api/rewrite
// ============================================================================

#[tokio::test]
async fn test_rewrite_returns_blocks_in_input_order() {
    let backend = Arc::new(ScriptedBackend::new());
    let (app, _) = test_app(backend.clone(), FixedMedia::default());

    let (status, json) = post_json(
        app,
        "/api/rewrite",
        json!({
            "blocks": [
                {"index": 7, "content": "第一段，太夸张了！！！"},
                {"index": 2, "content": "第二段"},
                {"index": 4, "content": "   "}
            ]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 3);

    let indices: Vec<u64> = data.iter().map(|d| d["index"].as_u64().unwrap()).collect();
    assert_eq!(indices, vec![7, 2, 4]);
    assert_eq!(data[0]["newContent"], "改写：第一段，太夸张了！！！");
    assert_eq!(data[1]["newContent"], "改写：第二段");
    // Whitespace-only block passes through without a backend call
    assert_eq!(data[2]["newContent"], "   ");
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_rewrite_failure_policies() {
    let blocks = json!([
        {"index": 0, "content": "能改写的段落"},
        {"index": 1, "content": "QUOTA 段落"}
    ]);

    // Retain (default): failed block keeps its text
    let backend = Arc::new(ScriptedBackend::new().on("QUOTA", Behavior::Status(402, "Insufficient Balance")));
    let (app, _) = test_app(backend, FixedMedia::default());
    let (status, json) = post_json(app, "/api/rewrite", json!({"blocks": blocks})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][0]["newContent"], "改写：能改写的段落");
    assert_eq!(json["data"][1]["newContent"], "QUOTA 段落");

    // Annotate: failed block is marked, original text kept after the marker
    let backend = Arc::new(ScriptedBackend::new().on("QUOTA", Behavior::Status(402, "Insufficient Balance")));
    let (app, _) = test_app(backend, FixedMedia::default());
    let (status, json) = post_json(
        app,
        "/api/rewrite",
        json!({"blocks": blocks, "failure_policy": "annotate"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let annotated = json["data"][1]["newContent"].as_str().unwrap();
    assert!(annotated.starts_with("[rewrite failed: quota exhausted"));
    assert!(annotated.ends_with("QUOTA 段落"));
}

#[tokio::test]
async fn test_rewrite_rejects_bad_input() {
    let backend = Arc::new(ScriptedBackend::new());

    let (app, _) = test_app(backend.clone(), FixedMedia::default());
    let (status, json) = post_json(
        app,
        "/api/rewrite",
        json!({"blocks": [{"index": 1, "content": "a"}, {"index": 1, "content": "b"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "INVALID_INPUT");

    let (app, _) = test_app(backend.clone(), FixedMedia::default());
    let (status, json) = post_json(app, "/api/rewrite", json!({"blocks": []})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "EMPTY_DOCUMENT");

    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_rewrite_document_preserves_structure() {
    // Given: a Delta with an embed, a line-format op and a short op
    let backend = Arc::new(ScriptedBackend::new());
    let (app, _) = test_app(backend.clone(), FixedMedia::default());
    let ops = json!([
        {"insert": "这款耳机的音质简直无敌，必须买！"},
        {"insert": {"image": "https://example.com/a.png"}},
        {"insert": "\n"},
        {"insert": "降噪效果同样令人惊艳。\n", "attributes": {"header": 2}},
        {"insert": "好\n"}
    ]);

    // When
    let (status, json) = post_json(app, "/api/rewrite/document", json!({"ops": ops})).await;

    // Then: same op count and order, embeds and attributes untouched
    assert_eq!(status, StatusCode::OK);
    let out = json["ops"].as_array().unwrap();
    assert_eq!(out.len(), 5);
    assert_eq!(out[0]["insert"], "改写：这款耳机的音质简直无敌，必须买！");
    assert_eq!(out[1]["insert"], json!({"image": "https://example.com/a.png"}));
    assert_eq!(out[2]["insert"], "\n");
    assert_eq!(out[3]["insert"], "改写：降噪效果同样令人惊艳。\n");
    assert_eq!(out[3]["attributes"], json!({"header": 2}));
    assert_eq!(out[4]["insert"], "好\n");

    assert_eq!(
        json["stats"],
        json!({"blocks": 5, "submitted": 2, "rewritten": 2, "failed": 0})
    );
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_rewrite_document_min_chars_override() {
    let backend = Arc::new(ScriptedBackend::new());
    let (app, _) = test_app(backend.clone(), FixedMedia::default());

    let (status, json) = post_json(
        app,
        "/api/rewrite/document",
        json!({"ops": [{"insert": "短句\n"}], "min_chars": 0}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ops"][0]["insert"], "改写：短句\n");
    assert_eq!(json["stats"]["submitted"], 1);
}

#[tokio::test]
async fn test_rewrite_document_without_text_is_rejected() {
    let backend = Arc::new(ScriptedBackend::new());
    let (app, _) = test_app(backend.clone(), FixedMedia::default());

    let (status, json) = post_json(
        app,
        "/api/rewrite/document",
        json!({"ops": [{"insert": {"image": "x.png"}}, {"insert": "\n"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "EMPTY_DOCUMENT");
    assert_eq!(backend.calls(), 0);
}

// ============================================================================
// /api/matrix
// ============================================================================

#[tokio::test]
async fn test_matrix_keeps_every_platform_on_partial_failure() {
    // Given: the douyin call is rate limited, xhs succeeds
    let backend = Arc::new(
        ScriptedBackend::new()
            .on("短视频编剧", Behavior::Status(429, "slow down"))
            .on("小红书", Behavior::Reply("姐妹们！AI写作真的绝了".to_string())),
    );
    let (app, _) = test_app(backend.clone(), FixedMedia::default());

    // When
    let (status, json) = post_json(
        app,
        "/api/matrix",
        json!({"topic": "AI写作", "platforms": ["xhs", "DOUYIN"]}),
    )
    .await;

    // Then: exactly the two keys, both non-empty
    assert_eq!(status, StatusCode::OK);
    let results = json["results"].as_object().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results["xhs"], "姐妹们！AI写作真的绝了");
    let douyin = results["douyin"].as_str().unwrap();
    assert!(douyin.starts_with("生成失败，请重试。"));
    assert!(douyin.contains("rate limited"));
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_matrix_unknown_platform_dispatches_nothing() {
    let backend = Arc::new(ScriptedBackend::new());
    let (app, _) = test_app(backend.clone(), FixedMedia::default());

    let (status, json) = post_json(
        app,
        "/api/matrix",
        json!({"topic": "AI写作", "platforms": ["xhs", "myspace"]}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "UNKNOWN_KEY");
    assert!(json["error"]["message"].as_str().unwrap().contains("myspace"));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_matrix_requires_platforms() {
    let backend = Arc::new(ScriptedBackend::new());
    let (app, _) = test_app(backend.clone(), FixedMedia::default());

    let (status, json) = post_json(app, "/api/matrix", json!({"topic": "AI写作", "platforms": []})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "EMPTY_INPUT");
    assert_eq!(backend.calls(), 0);
}
