//! Integration tests for POST /chat/stream against a scripted upstream
//!
//! Drives the full router (request-id, tracing and CORS layers included)
//! with `oneshot` and checks:
//! - fragments are concatenated into a plain-text body
//! - upstream failures end the body with an inline error marker
//! - malformed bodies are rejected before any upstream call
//! - the normalized messages are what reaches the upstream

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use futures::stream::{self, StreamExt};
use openrouter_relay::{
    config::CorsConfig,
    error::{AppError, AppResult},
    handlers::AppState,
    middleware::REQUEST_ID_HEADER,
    server::build_router,
    upstream::{ChatUpstream, ChunkStream, CompletionChunk, CompletionRequest},
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

enum Step {
    Text(&'static str),
    Fail(&'static str),
}

/// Upstream replaying a fixed script, counting calls and keeping requests
struct ScriptedUpstream {
    script: Vec<Step>,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedUpstream {
    fn new(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> CompletionRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("upstream should have been called")
    }
}

#[async_trait]
impl ChatUpstream for ScriptedUpstream {
    async fn open_stream(&self, request: CompletionRequest) -> AppResult<ChunkStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        let items: Vec<AppResult<CompletionChunk>> = self
            .script
            .iter()
            .map(|step| match step {
                Step::Text(text) => Ok(CompletionChunk::text(*text)),
                Step::Fail(message) => Err(AppError::UpstreamStream {
                    fragments: 1,
                    reason: message.to_string(),
                }),
            })
            .collect();
        Ok(stream::iter(items).boxed())
    }
}

fn create_test_app(upstream: Arc<ScriptedUpstream>) -> Router {
    let state = AppState::new(upstream);
    build_router(state, &CorsConfig::default()).expect("router should build")
}

fn post_json(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat/stream")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// -------------------------------------------------------------------------
// Streaming scenarios
// -------------------------------------------------------------------------

#[tokio::test]
async fn test_fragments_are_relayed_in_order() {
    let upstream = ScriptedUpstream::new(vec![Step::Text("Hi"), Step::Text(" there")]);
    let app = create_test_app(upstream.clone());

    let response = app
        .oneshot(post_json(
            r#"{"messages": [{"role": "user", "content": "Hello"}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    assert!(
        content_type.starts_with("text/plain"),
        "expected text/plain, got {}",
        content_type
    );
    assert_eq!(body_string(response).await, "Hi there");
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn test_mid_stream_failure_appends_error_marker() {
    let upstream = ScriptedUpstream::new(vec![Step::Text("Partial"), Step::Fail("reset")]);
    let app = create_test_app(upstream);

    let response = app
        .oneshot(post_json(
            r#"{"messages": [{"role": "user", "content": "Hello"}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_string(response).await,
        "Partial\n\n[ERROR: Upstream stream interrupted after 1 fragments: reset]"
    );
}

#[tokio::test]
async fn test_zero_chunks_yield_empty_ok_body() {
    let upstream = ScriptedUpstream::new(vec![]);
    let app = create_test_app(upstream);

    let response = app
        .oneshot(post_json(r#"{"messages": []}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "");
}

#[tokio::test]
async fn test_response_carries_request_id() {
    let upstream = ScriptedUpstream::new(vec![Step::Text("ok")]);
    let app = create_test_app(upstream);

    let response = app
        .oneshot(post_json(r#"{"messages": [{"role": "user", "content": "x"}]}"#))
        .await
        .unwrap();

    let request_id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .expect("x-request-id header present");
    assert!(uuid::Uuid::parse_str(request_id.to_str().unwrap()).is_ok());
}

// -------------------------------------------------------------------------
// What reaches the upstream
// -------------------------------------------------------------------------

#[tokio::test]
async fn test_default_model_and_stream_flag() {
    let upstream = ScriptedUpstream::new(vec![]);
    let app = create_test_app(upstream.clone());

    let response = app
        .oneshot(post_json(
            r#"{"messages": [{"role": "user", "content": "Hello"}]}"#,
        ))
        .await
        .unwrap();
    let _ = body_string(response).await;

    let sent = upstream.last_request();
    assert_eq!(sent.model, "openai/gpt-4o");
    assert!(sent.stream);
    assert_eq!(
        serde_json::to_value(&sent.messages).unwrap(),
        json!([{"role": "user", "content": "Hello"}])
    );
}

#[tokio::test]
async fn test_requested_model_is_forwarded() {
    let upstream = ScriptedUpstream::new(vec![]);
    let app = create_test_app(upstream.clone());

    let response = app
        .oneshot(post_json(
            r#"{"model": "mistralai/mistral-7b-instruct", "messages": [{"role": "user", "content": "Hello"}]}"#,
        ))
        .await
        .unwrap();
    let _ = body_string(response).await;

    assert_eq!(upstream.last_request().model, "mistralai/mistral-7b-instruct");
}

#[tokio::test]
async fn test_unknown_parts_are_filtered_before_upstream() {
    let upstream = ScriptedUpstream::new(vec![Step::Text("seen")]);
    let app = create_test_app(upstream.clone());

    let body = json!({
        "messages": [
            {"role": "system", "content": "Describe images."},
            {"role": "user", "content": [
                {"type": "text", "text": "hi"},
                {"type": "sticker", "id": "x"},
                {"type": "image_url", "image_url": {"url": ""}},
                {"type": "image_url", "image_url": {"url": "https://img.example/cat.png", "detail": "auto"}}
            ]}
        ]
    });

    let response = app.oneshot(post_json(&body.to_string())).await.unwrap();
    assert_eq!(body_string(response).await, "seen");

    assert_eq!(
        serde_json::to_value(&upstream.last_request().messages).unwrap(),
        json!([
            {"role": "system", "content": "Describe images."},
            {"role": "user", "content": [
                {"type": "text", "text": "hi"},
                {"type": "image_url", "image_url": {"url": "https://img.example/cat.png", "detail": "auto"}}
            ]}
        ])
    );
}

#[tokio::test]
async fn test_text_part_without_text_is_forwarded_as_null() {
    let upstream = ScriptedUpstream::new(vec![Step::Text("ok")]);
    let app = create_test_app(upstream.clone());

    let body = r#"{"messages": [{"role": "user", "content": [{"type": "text"}, {"type": "text", "text": "hi"}]}]}"#;
    let response = app.oneshot(post_json(body)).await.unwrap();
    assert_eq!(body_string(response).await, "ok");

    assert_eq!(
        serde_json::to_value(&upstream.last_request().messages).unwrap(),
        json!([
            {"role": "user", "content": [
                {"type": "text", "text": null},
                {"type": "text", "text": "hi"}
            ]}
        ])
    );
}

// -------------------------------------------------------------------------
// Rejected bodies never reach the upstream
// -------------------------------------------------------------------------

#[tokio::test]
async fn test_missing_messages_is_rejected_without_upstream_call() {
    let upstream = ScriptedUpstream::new(vec![Step::Text("never")]);
    let app = create_test_app(upstream.clone());

    let response = app
        .oneshot(post_json(r#"{"model": "openai/gpt-4o"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"]["type"], "invalid_request_error");
    assert!(
        body["error"]["message"]
            .as_str()
            .unwrap_or("")
            .contains("messages")
    );
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_wrong_content_shape_is_rejected() {
    let upstream = ScriptedUpstream::new(vec![]);
    let app = create_test_app(upstream.clone());

    let response = app
        .oneshot(post_json(
            r#"{"messages": [{"role": "user", "content": 42}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let upstream = ScriptedUpstream::new(vec![]);
    let app = create_test_app(upstream.clone());

    let response = app.oneshot(post_json(r#"{"messages": [}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_missing_content_type_is_unsupported_media_type() {
    let upstream = ScriptedUpstream::new(vec![]);
    let app = create_test_app(upstream.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/chat/stream")
        .body(Body::from(r#"{"messages": []}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_get_is_method_not_allowed() {
    let upstream = ScriptedUpstream::new(vec![]);
    let app = create_test_app(upstream.clone());

    let request = Request::builder()
        .method("GET")
        .uri("/chat/stream")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_health_endpoint() {
    let upstream = ScriptedUpstream::new(vec![]);
    let app = create_test_app(upstream.clone());

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], "OK");
    assert_eq!(upstream.calls(), 0);
}
