#![allow(dead_code)]

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt;
use vigil_server::app;
use vigil_server::config::{DatabaseConfig, PaginationConfig, ServerConfig};
use vigil_server::state::AppState;

pub const TENANT: &str = "tenant-a";
pub const OTHER_TENANT: &str = "tenant-b";

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
}

pub async fn build_test_context() -> Result<TestContext> {
    build_test_context_with(PaginationConfig::default()).await
}

pub async fn build_test_context_with(pagination: PaginationConfig) -> Result<TestContext> {
    let temp_dir = tempfile::tempdir()?;
    let config = ServerConfig {
        database: DatabaseConfig {
            url: None,
            data_dir: temp_dir.path().to_string_lossy().to_string(),
        },
        pagination,
        ..Default::default()
    };
    let state = AppState::from_config(config).await?;
    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        state,
        app,
    })
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value, Option<String>) {
    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    tenant: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(tenant) = tenant {
        builder = builder.header("X-Tenant-Id", tenant);
    }
    builder = builder.header("Content-Type", "application/json");

    let req_body = body.unwrap_or(Value::Null).to_string();
    let req = builder
        .body(Body::from(req_body))
        .expect("request should build");
    send(app, req).await
}

/// Sends a raw body verbatim, for malformed-payload cases.
pub async fn request_raw(
    app: &axum::Router,
    method: &str,
    uri: &str,
    tenant: Option<&str>,
    body: &str,
) -> (StatusCode, Value, Option<String>) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(tenant) = tenant {
        builder = builder.header("X-Tenant-Id", tenant);
    }
    let req = builder
        .body(Body::from(body.to_string()))
        .expect("request should build");
    send(app, req).await
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
    tenant: Option<&str>,
) -> (StatusCode, Value, Option<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(tenant) = tenant {
        builder = builder.header("X-Tenant-Id", tenant);
    }
    let req = builder.body(Body::empty()).expect("request should build");
    send(app, req).await
}

pub fn assert_ok_envelope(json: &Value) {
    assert_eq!(json["err_code"], 0);
    assert!(json["err_msg"].is_string());
    assert!(json.get("trace_id").is_some());
}

pub fn assert_err_envelope(json: &Value, err_code: i32) {
    assert_eq!(json["err_code"], err_code);
    assert!(json["err_msg"].is_string());
    assert!(json.get("trace_id").is_some());
    assert!(json.get("data").is_some());
    assert!(json["data"].is_null());
}

/// Creates a notification method for `tenant` and returns its id.
pub async fn create_method(app: &axum::Router, tenant: &str, name: &str) -> String {
    let (status, body, _) = request_json(
        app,
        "POST",
        "/v2.0/notification-methods",
        Some(tenant),
        Some(json!({"name": name, "type": "EMAIL", "address": "ops@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create method failed: {body}");
    body["data"]["id"]
        .as_str()
        .expect("id should exist")
        .to_string()
}

pub async fn create_definition(app: &axum::Router, tenant: &str, body: Value) -> Value {
    let (status, resp, _) = request_json(
        app,
        "POST",
        "/v2.0/alarm-definitions",
        Some(tenant),
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create definition failed: {resp}");
    resp["data"].clone()
}

/// Follows `next` links from `uri` and returns every element id in order.
pub async fn collect_pages(app: &axum::Router, tenant: &str, uri: &str) -> (Vec<String>, usize) {
    let mut ids = Vec::new();
    let mut pages = 0;
    let mut next = Some(uri.to_string());
    while let Some(uri) = next.take() {
        let (status, body, _) = request_no_body(app, "GET", &uri, Some(tenant)).await;
        assert_eq!(status, StatusCode::OK, "page {uri} failed: {body}");
        pages += 1;
        for element in body["data"]["elements"].as_array().expect("elements") {
            ids.push(element["id"].as_str().expect("id").to_string());
        }
        next = body["data"]["links"]
            .as_array()
            .expect("links")
            .iter()
            .find(|l| l["rel"] == "next")
            .and_then(|l| l["href"].as_str())
            .map(str::to_string);
    }
    (ids, pages)
}
