use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::api::error_response;
use crate::logging::TraceId;

/// Request header carrying the caller's tenant.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Tenant the request is scoped to, inserted by [`tenant_middleware`].
#[derive(Clone, Debug)]
pub struct TenantId(pub String);

impl std::ops::Deref for TenantId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

/// Rejects requests without a non-empty `X-Tenant-Id` header with 401 and
/// exposes the tenant to handlers as a [`TenantId`] extension.
pub async fn tenant_middleware(mut req: Request<Body>, next: Next) -> Response {
    let trace_id = req
        .extensions()
        .get::<TraceId>()
        .map(|t| t.0.clone())
        .unwrap_or_default();

    let tenant = req
        .headers()
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    match tenant {
        Some(tenant) => {
            req.extensions_mut().insert(TenantId(tenant));
            next.run(req).await
        }
        None => {
            tracing::warn!(
                trace_id = %trace_id,
                "Request rejected: missing X-Tenant-Id header"
            );
            error_response(
                StatusCode::UNAUTHORIZED,
                &trace_id,
                "unauthorized",
                "missing X-Tenant-Id header",
            )
        }
    }
}
