//! Integration tests for the HTTP admin surface.

mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use common::Harness;
use http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use examhall_core::config::AppConfig;
use examhall_core::types::id::ExamId;
use examhall_realtime::session::state::Role;

struct Api {
    harness: Harness,
    router: Router,
}

fn api() -> Api {
    let config = AppConfig::default();
    let harness = Harness::with_config(config.session.clone());
    let state = examhall_api::AppState::new(Arc::new(config), harness.engine.clone());
    let router = examhall_api::build_router(state);
    Api { harness, router }
}

async fn request(router: &Router, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    let body = match body {
        Some(value) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let req = builder.body(body).expect("build request");

    let response = router.clone().oneshot(req).await.expect("send request");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health_reports_ok() {
    let api = api();
    let (status, body) = request(&api.router, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let api = api();
    let path = format!("/api/sessions/{}", ExamId::new());
    let (status, body) = request(&api.router, "GET", &path, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "UNKNOWN_SESSION");
}

#[tokio::test]
async fn test_admin_start_and_snapshot() {
    let api = api();
    let exam = ExamId::new();
    let mut host = api.harness.connect("prof");
    api.harness.join(&mut host, exam, Role::Host).await;

    let path = format!("/api/sessions/{exam}/start");
    let (status, body) = request(&api.router, "POST", &path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "active");

    let path = format!("/api/sessions/{exam}");
    let (status, body) = request(&api.router, "GET", &path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "active");
    assert_eq!(body["participants"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_admin_end_is_idempotent() {
    let api = api();
    let exam = ExamId::new();
    let mut host = api.harness.connect("prof");
    api.harness.join(&mut host, exam, Role::Host).await;

    let start_path = format!("/api/sessions/{exam}/start");
    request(&api.router, "POST", &start_path, None).await;

    let end_path = format!("/api/sessions/{exam}/end");
    let (status, body) = request(&api.router, "POST", &end_path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "ended");
    assert_eq!(body["end_reason"], "host-requested");

    let (status, body) = request(&api.router, "POST", &end_path, None).await;
    assert_eq!(status, StatusCode::OK, "repeated end must succeed");
    assert_eq!(body["state"], "ended");
}

#[tokio::test]
async fn test_timer_commands_via_admin() {
    let api = api();
    let exam = ExamId::new();
    let mut host = api.harness.connect("prof");
    api.harness.join(&mut host, exam, Role::Host).await;

    let start_path = format!("/api/sessions/{exam}/start");
    request(&api.router, "POST", &start_path, None).await;

    let timer_path = format!("/api/sessions/{exam}/timer");
    let (status, body) = request(
        &api.router,
        "POST",
        &timer_path,
        Some(serde_json::json!({"action": "start", "duration_seconds": 1800})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timer"]["duration_seconds"], 1800);

    let (status, _) = request(
        &api.router,
        "POST",
        &timer_path,
        Some(serde_json::json!({"action": "start", "duration_seconds": 60})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "double start maps to 409");

    let (status, body) = request(
        &api.router,
        "POST",
        &timer_path,
        Some(serde_json::json!({"action": "pause"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["timer"]["remaining_seconds"].as_u64().is_some());

    let (status, _) = request(
        &api.router,
        "POST",
        &timer_path,
        Some(serde_json::json!({"action": "resume"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_start_unknown_session_is_404() {
    let api = api();
    let path = format!("/api/sessions/{}/start", ExamId::new());
    let (status, body) = request(&api.router, "POST", &path, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "UNKNOWN_SESSION");
}
