use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chat_intake_lib::access::hash_code;
use chat_intake_lib::config::AppSettings;
use chat_intake_lib::models::InputLogEntry;
use chat_intake_lib::{build_router, AppState};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tower::ServiceExt;

const PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

fn settings_in(dir: &Path) -> AppSettings {
    AppSettings {
        data_dir: dir.to_path_buf(),
        access_code_hashes: vec![hash_code("secret")],
        ..AppSettings::default()
    }
}

fn app(dir: &Path) -> Router {
    build_router(AppState::new(settings_in(dir)))
}

async fn post_json(app: Router, uri: &str, body: Value, extra_headers: &[(&str, &str)]) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in extra_headers {
        builder = builder.header(*name, *value);
    }
    let request = builder.body(Body::from(body.to_string())).expect("request");

    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body bytes");
    let value = serde_json::from_slice(&bytes).expect("json body");
    (status, value)
}

async fn post_raw(app: Router, uri: &str, body: &'static str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .expect("request");

    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body bytes");
    let value = serde_json::from_slice(&bytes).expect("json body");
    (status, value)
}

fn read_mailbox(dir: &Path) -> Vec<Value> {
    let raw = fs::read_to_string(settings_in(dir).message_path()).expect("mailbox exists");
    serde_json::from_str(&raw).expect("mailbox array")
}

fn read_log(dir: &Path) -> Vec<InputLogEntry> {
    let raw = fs::read_to_string(settings_in(dir).input_log_path()).expect("log exists");
    raw.lines()
        .map(|line| serde_json::from_str(line).expect("log line"))
        .collect()
}

#[tokio::test]
async fn prompt_auth_reports_verdict_with_200() {
    let dir = tempfile::tempdir().expect("tempdir");

    let (status, body) = post_json(app(dir.path()), "/api/prompt-auth", json!({ "code": " secret " }), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));

    let (status, body) = post_json(app(dir.path()), "/api/prompt-auth", json!({ "code": "guess" }), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(false));

    let (status, body) = post_json(app(dir.path()), "/api/prompt-auth", json!({}), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn leave_message_with_valid_code_persists_record() {
    let dir = tempfile::tempdir().expect("tempdir");

    let (status, body) = post_json(
        app(dir.path()),
        "/api/leave-message",
        json!({ "code": "secret", "nickname": "Ann", "content": "hi" }),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert!(body["message"].is_string());

    let items = read_mailbox(dir.path());
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["nickname"], json!("Ann"));
    assert_eq!(items[0]["content"], json!("hi"));
    let created_at = items[0]["createdAt"].as_str().expect("createdAt string");
    assert!(chrono::DateTime::parse_from_rfc3339(created_at).is_ok());
    assert!(created_at.ends_with('Z'));
}

#[tokio::test]
async fn leave_message_with_wrong_code_is_401_and_writes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");

    let (status, body) = post_json(
        app(dir.path()),
        "/api/leave-message",
        json!({ "code": "wrong", "nickname": "Ann", "content": "hi" }),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));
    assert!(!settings_in(dir.path()).message_path().exists());
}

#[tokio::test]
async fn leave_message_with_empty_content_is_400_and_writes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");

    let (status, body) = post_json(
        app(dir.path()),
        "/api/leave-message",
        json!({ "code": "secret", "nickname": "Ann", "content": "  " }),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert!(!settings_in(dir.path()).message_path().exists());
}

#[tokio::test]
async fn leave_message_storage_failure_is_generic_500() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blocker = dir.path().join("blocked");
    fs::write(&blocker, "a file where the data dir should be").expect("seed blocker");

    let app = build_router(AppState::new(settings_in(&blocker)));
    let (status, body) = post_json(
        app,
        "/api/leave-message",
        json!({ "code": "secret", "nickname": "Ann", "content": "hi" }),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], json!(false));
    let message = body["message"].as_str().expect("message");
    assert!(!message.contains("blocked"));
}

#[tokio::test]
async fn user_input_log_appends_line_with_origin() {
    let dir = tempfile::tempdir().expect("tempdir");

    let (status, body) = post_json(
        app(dir.path()),
        "/api/user-input-log",
        json!({ "rawInput": "what is rust?", "response": "a language" }),
        &[("x-forwarded-for", "203.0.113.5, 10.0.0.1")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let (status, _) = post_json(app(dir.path()), "/api/user-input-log", json!({ "rawInput": "again" }), &[]).await;
    assert_eq!(status, StatusCode::OK);

    let entries = read_log(dir.path());
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].raw_input, "what is rust?");
    assert_eq!(entries[0].response.as_deref(), Some("a language"));
    assert_eq!(entries[0].client_ip.as_deref(), Some("203.0.113.5"));
    assert_eq!(entries[1].client_ip.as_deref(), Some("unknown"));
    assert_eq!(entries[1].response, None);
}

#[tokio::test]
async fn user_input_log_sideloads_valid_attachments_only() {
    let dir = tempfile::tempdir().expect("tempdir");

    let (status, _) = post_json(
        app(dir.path()),
        "/api/user-input-log",
        json!({
            "rawInput": "see picture",
            "images": ["data:image/png;base64,!!broken!!", format!("data:image/png;base64,{}", PNG_B64)]
        }),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let entries = read_log(dir.path());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].images.len(), 1);
    let name = &entries[0].images[0];
    assert!(name.ends_with("-1.png"));
    assert!(!name.contains(':'));
    assert!(settings_in(dir.path()).attachments_path().join(name).exists());
}

#[tokio::test]
async fn healthz_is_ok() {
    let dir = tempfile::tempdir().expect("tempdir");
    let request = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app(dir.path()).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn original_client_mailbox_path_is_served() {
    let dir = tempfile::tempdir().expect("tempdir");

    let (status, body) = post_json(
        app(dir.path()),
        "/api/leon-message",
        json!({ "code": "secret", "nickname": "Ann", "content": "hi" }),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));

    assert!(dir.path().join("leon-messages.json").exists());
    let items = read_mailbox(dir.path());
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["nickname"], json!("Ann"));
}

#[tokio::test]
async fn malformed_body_is_400_on_every_route() {
    let dir = tempfile::tempdir().expect("tempdir");

    for uri in ["/api/prompt-auth", "/api/user-input-log", "/api/leon-message"] {
        let (status, body) = post_raw(app(dir.path()), uri, "{oops").await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "route {}", uri);
        assert_eq!(body["success"], json!(false), "route {}", uri);
    }
    assert!(!settings_in(dir.path()).input_log_path().exists());
}

#[tokio::test]
async fn user_input_log_falls_back_to_real_ip_header() {
    let dir = tempfile::tempdir().expect("tempdir");

    let (status, _) = post_json(
        app(dir.path()),
        "/api/user-input-log",
        json!({ "rawInput": "hello" }),
        &[("x-real-ip", "198.51.100.23")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let entries = read_log(dir.path());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].client_ip.as_deref(), Some("198.51.100.23"));
}

#[tokio::test]
async fn user_input_log_storage_failure_is_generic_500() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(settings_in(dir.path()).input_log_path()).expect("block log path with a directory");

    let (status, body) = post_json(
        app(dir.path()),
        "/api/user-input-log",
        json!({
            "rawInput": "see picture",
            "images": [format!("data:image/png;base64,{}", PNG_B64)]
        }),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], json!(false));
    let message = body["message"].as_str().expect("message");
    assert!(!message.contains("raw_user_inputs"));

    let leftovers = fs::read_dir(settings_in(dir.path()).attachments_path())
        .expect("attachments dir")
        .count();
    assert_eq!(leftovers, 0);
}
