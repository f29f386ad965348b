use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use rand::Rng;
use std::fmt::Write;
use std::time::Instant;

use crate::api::error_response;
use crate::middleware::TENANT_HEADER;

/// Per-request trace ID, stored in request extensions and echoed back as
/// `X-Trace-Id`.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl std::ops::Deref for TraceId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

pub const TRACE_HEADER: &str = "X-Trace-Id";

/// Maximum number of characters logged from a request/response body.
const MAX_BODY_LOG_CHARS: usize = 200;

/// Request bodies above this size are not buffered for logging.
const MAX_BUFFERED_BODY: usize = 1024 * 1024;

/// 16 hex chars (8 random bytes).
fn generate_trace_id() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    bytes.iter().fold(String::with_capacity(16), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// Truncates to at most `max` bytes on a char boundary.
fn body_snippet(bytes: &[u8], max: usize) -> String {
    match std::str::from_utf8(bytes) {
        Ok("") => String::new(),
        Ok(s) if s.len() > max => {
            let mut end = max;
            while !s.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &s[..end])
        }
        Ok(s) => s.to_string(),
        Err(_) => "<non-utf8 body>".to_string(),
    }
}

fn format_elapsed(elapsed_us: u128) -> String {
    match elapsed_us {
        us if us < 1_000 => format!("{us}µs"),
        us if us < 1_000_000 => format!("{}ms", us / 1_000),
        us => format!("{:.1}s", us as f64 / 1_000_000.0),
    }
}

fn header_or_dash(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or("-")
        .to_string()
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"))
}

fn log_response(trace_id: &str, status: StatusCode, elapsed: &str, body: &str) {
    let status = status.as_u16();
    match status {
        500.. => tracing::error!(trace_id, status, elapsed, body, "<-- response"),
        400..=499 => tracing::warn!(trace_id, status, elapsed, body, "<-- response"),
        _ if body.is_empty() => tracing::info!(trace_id, status, elapsed, "<-- response"),
        _ => tracing::info!(trace_id, status, elapsed, body, "<-- response"),
    }
}

/// Request/response logging middleware.
///
/// Assigns the trace ID before any other layer runs, so the tenant
/// middleware and handlers can read it from extensions.
pub async fn request_logging(mut req: Request, next: Next) -> Response {
    let trace_id = generate_trace_id();
    req.extensions_mut().insert(TraceId(trace_id.clone()));

    // Swagger UI assets
    if req.uri().path().starts_with("/docs") {
        return next.run(req).await;
    }

    let method = req.method().clone();
    let url = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let tenant = header_or_dash(req.headers(), TENANT_HEADER);
    let user_agent = header_or_dash(req.headers(), header::USER_AGENT.as_str());

    let req = if matches!(method.as_str(), "POST" | "PUT" | "PATCH") {
        let (parts, body) = req.into_parts();
        let bytes = match axum::body::to_bytes(body, MAX_BUFFERED_BODY).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    trace_id = %trace_id,
                    method = %method,
                    path = %url,
                    tenant = %tenant,
                    error = %e,
                    "--> request body rejected"
                );
                let response = error_response(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    &trace_id,
                    "payload_too_large",
                    &format!("Request body exceeds {MAX_BUFFERED_BODY} bytes"),
                );
                log_response(&trace_id, response.status(), "-", "");
                return with_trace_header(response, &trace_id);
            }
        };
        let snippet = body_snippet(&bytes, MAX_BODY_LOG_CHARS);
        tracing::info!(
            trace_id = %trace_id,
            method = %method,
            path = %url,
            tenant = %tenant,
            body = %snippet,
            ua = %user_agent,
            "--> request"
        );
        Request::from_parts(parts, Body::from(bytes))
    } else {
        tracing::info!(
            trace_id = %trace_id,
            method = %method,
            path = %url,
            tenant = %tenant,
            ua = %user_agent,
            "--> request"
        );
        req
    };

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed = format_elapsed(start.elapsed().as_micros());

    let (parts, body) = response.into_parts();
    let bytes: Bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();
    let snippet = if is_json(&parts.headers) {
        body_snippet(&bytes, MAX_BODY_LOG_CHARS)
    } else {
        String::new()
    };
    log_response(&trace_id, parts.status, &elapsed, &snippet);

    with_trace_header(Response::from_parts(parts, Body::from(bytes)), &trace_id)
}

fn with_trace_header(mut response: Response, trace_id: &str) -> Response {
    if let Ok(val) = HeaderValue::from_str(trace_id) {
        response.headers_mut().insert(TRACE_HEADER, val);
    }
    response
}
