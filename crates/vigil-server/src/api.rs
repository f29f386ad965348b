pub mod alarm_definitions;
pub mod notification_methods;
pub mod pagination;

use crate::logging::TraceId;
use crate::service::ServiceError;
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// API 错误响应
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    /// 错误码
    pub err_code: i32,
    /// 错误信息
    pub err_msg: String,
    /// 链路追踪 ID（默认空字符串）
    pub trace_id: String,
}

/// API 统一响应包裹
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    /// 错误码（成功时为 0）
    pub err_code: i32,
    /// 错误信息（成功时为 success）
    pub err_msg: String,
    /// 链路追踪 ID（默认空字符串）
    pub trace_id: String,
    /// 业务数据（有数据时返回）
    pub data: Option<T>,
}

/// 资源链接
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Link {
    /// 关系（self / next）
    pub rel: String,
    pub href: String,
}

impl Link {
    pub fn self_link(href: impl Into<String>) -> Self {
        Self {
            rel: "self".to_string(),
            href: href.into(),
        }
    }

    pub fn next(href: impl Into<String>) -> Self {
        Self {
            rel: "next".to_string(),
            href: href.into(),
        }
    }
}

/// 列表数据结构（游标分页）
#[derive(Serialize, ToSchema)]
pub struct ListData<T>
where
    T: Serialize,
{
    /// 数据项列表
    pub elements: Vec<T>,
    /// self 链接；还有更多数据时附带 next 链接
    pub links: Vec<Link>,
}

pub fn success_response<T>(status: StatusCode, trace_id: &str, data: T) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: 0,
            err_msg: "success".to_string(),
            trace_id: trace_id.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

fn to_custom_error_code(code: &str) -> i32 {
    match code {
        "bad_request" => 1001,
        "unauthorized" => 1002,
        "not_found" => 1004,
        "conflict" => 1005,
        "validation_error" => 1006,
        "unprocessable_entity" => 1007,
        "payload_too_large" => 1013,
        "invalid_action_reference" => 1201,
        "storage_error" => 1501,
        "internal_error" => 1500,
        _ => 1999,
    }
}

pub fn error_response(status: StatusCode, trace_id: &str, code: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: to_custom_error_code(code),
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

/// Maps a service failure onto its HTTP status and envelope.
pub fn service_error_response(trace_id: &str, err: ServiceError) -> Response {
    let (status, code) = match &err {
        ServiceError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
        ServiceError::Unprocessable(_) => (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable_entity"),
        ServiceError::InvalidActionReference(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "invalid_action_reference")
        }
        ServiceError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        ServiceError::AlreadyExists { .. } => (StatusCode::CONFLICT, "conflict"),
        ServiceError::Storage(e) => {
            tracing::error!(trace_id, error = %e, "Storage failure");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                trace_id,
                "storage_error",
                "Database error",
            );
        }
    };
    error_response(status, trace_id, code, &err.to_string())
}

/// Malformed JSON body: syntax errors are 400, shape errors 422.
pub fn json_rejection_response(trace_id: &str, rejection: &JsonRejection) -> Response {
    let status = rejection.status();
    let code = if status == StatusCode::UNPROCESSABLE_ENTITY {
        "validation_error"
    } else {
        "bad_request"
    };
    error_response(status, trace_id, code, &rejection.body_text())
}

pub fn query_rejection_response(trace_id: &str, rejection: &QueryRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        trace_id,
        "validation_error",
        &rejection.body_text(),
    )
}

/// 健康检查响应
#[derive(Serialize, ToSchema)]
struct HealthResponse {
    /// 服务版本号
    version: String,
    /// 运行时长（秒）
    uptime_secs: i64,
}

/// 获取服务健康状态。
/// 无需 X-Tenant-Id 请求头。
#[utoipa::path(
    get,
    path = "/v2.0/health",
    tag = "Health",
    responses(
        (status = 200, description = "服务健康状态", body = HealthResponse)
    )
)]
async fn health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    success_response(
        StatusCode::OK,
        &trace_id,
        HealthResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: (Utc::now() - state.start_time).num_seconds(),
        },
    )
}

pub fn public_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(health))
}

pub fn tenant_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .merge(alarm_definitions::alarm_definition_routes())
        .merge(notification_methods::notification_method_routes())
}
