use crate::api::pagination::{list_links, CursorParams};
use crate::api::{
    json_rejection_response, no_content_response, query_rejection_response,
    service_error_response, success_response, ApiError, Link, ListData,
};
use crate::logging::TraceId;
use crate::middleware::TenantId;
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, OriginalUri, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use vigil_common::types::{NotificationMethodRequest, NotificationMethodType};
use vigil_storage::NotificationMethodRow;

const COLLECTION: &str = "/v2.0/notification-methods";

/// 通知方式
#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationMethodResponse {
    pub id: String,
    pub name: String,
    /// 通知类型（EMAIL / WEBHOOK / PAGERDUTY）
    #[serde(rename = "type")]
    pub method_type: NotificationMethodType,
    /// 投递地址
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub links: Vec<Link>,
}

impl From<NotificationMethodRow> for NotificationMethodResponse {
    fn from(row: NotificationMethodRow) -> Self {
        let links = vec![Link::self_link(format!("{COLLECTION}/{}", row.id))];
        Self {
            id: row.id,
            name: row.name,
            method_type: row.method_type,
            address: row.address,
            created_at: row.created_at,
            updated_at: row.updated_at,
            links,
        }
    }
}

/// 创建通知方式（名称在租户内唯一）。
#[utoipa::path(
    post,
    path = "/v2.0/notification-methods",
    tag = "NotificationMethods",
    security(("tenant_header" = [])),
    request_body = NotificationMethodRequest,
    responses(
        (status = 201, description = "通知方式已创建", body = NotificationMethodResponse),
        (status = 401, description = "缺少 X-Tenant-Id", body = ApiError),
        (status = 409, description = "名称已存在", body = ApiError),
        (status = 422, description = "参数校验失败", body = ApiError)
    )
)]
async fn create_notification_method(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    payload: Result<Json<NotificationMethodRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return json_rejection_response(&trace_id, &rejection),
    };
    match state.notification_methods.create(&tenant, req).await {
        Ok(row) => success_response(
            StatusCode::CREATED,
            &trace_id,
            NotificationMethodResponse::from(row),
        ),
        Err(e) => service_error_response(&trace_id, e),
    }
}

/// 分页查询通知方式列表。
#[utoipa::path(
    get,
    path = "/v2.0/notification-methods",
    tag = "NotificationMethods",
    security(("tenant_header" = [])),
    params(CursorParams),
    responses(
        (status = 200, description = "通知方式列表", body = ListData<NotificationMethodResponse>),
        (status = 401, description = "缺少 X-Tenant-Id", body = ApiError),
        (status = 422, description = "分页参数无效", body = ApiError)
    )
)]
async fn list_notification_methods(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    params: Result<Query<CursorParams>, QueryRejection>,
) -> impl IntoResponse {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return query_rejection_response(&trace_id, &rejection),
    };
    match state
        .notification_methods
        .list(&tenant, &params.page_request())
        .await
    {
        Ok(page) => {
            let links = list_links(uri.path(), uri.query(), &page);
            let elements: Vec<NotificationMethodResponse> = page
                .elements
                .into_iter()
                .map(NotificationMethodResponse::from)
                .collect();
            success_response(StatusCode::OK, &trace_id, ListData { elements, links })
        }
        Err(e) => service_error_response(&trace_id, e),
    }
}

#[utoipa::path(
    get,
    path = "/v2.0/notification-methods/{id}",
    tag = "NotificationMethods",
    security(("tenant_header" = [])),
    params(("id" = String, Path, description = "通知方式 ID")),
    responses(
        (status = 200, description = "通知方式详情", body = NotificationMethodResponse),
        (status = 401, description = "缺少 X-Tenant-Id", body = ApiError),
        (status = 404, description = "通知方式不存在", body = ApiError)
    )
)]
async fn get_notification_method(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.notification_methods.get(&tenant, &id).await {
        Ok(row) => success_response(
            StatusCode::OK,
            &trace_id,
            NotificationMethodResponse::from(row),
        ),
        Err(e) => service_error_response(&trace_id, e),
    }
}

/// 全量更新通知方式。
#[utoipa::path(
    put,
    path = "/v2.0/notification-methods/{id}",
    tag = "NotificationMethods",
    security(("tenant_header" = [])),
    params(("id" = String, Path, description = "通知方式 ID")),
    request_body = NotificationMethodRequest,
    responses(
        (status = 200, description = "更新后的通知方式", body = NotificationMethodResponse),
        (status = 401, description = "缺少 X-Tenant-Id", body = ApiError),
        (status = 404, description = "通知方式不存在", body = ApiError),
        (status = 409, description = "名称已存在", body = ApiError),
        (status = 422, description = "参数校验失败", body = ApiError)
    )
)]
async fn update_notification_method(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<NotificationMethodRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return json_rejection_response(&trace_id, &rejection),
    };
    match state.notification_methods.update(&tenant, &id, req).await {
        Ok(row) => success_response(
            StatusCode::OK,
            &trace_id,
            NotificationMethodResponse::from(row),
        ),
        Err(e) => service_error_response(&trace_id, e),
    }
}

/// 删除通知方式，同时移除告警定义中对它的引用。
#[utoipa::path(
    delete,
    path = "/v2.0/notification-methods/{id}",
    tag = "NotificationMethods",
    security(("tenant_header" = [])),
    params(("id" = String, Path, description = "通知方式 ID")),
    responses(
        (status = 204, description = "已删除"),
        (status = 401, description = "缺少 X-Tenant-Id", body = ApiError),
        (status = 404, description = "通知方式不存在", body = ApiError)
    )
)]
async fn delete_notification_method(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.notification_methods.delete(&tenant, &id).await {
        Ok(()) => {
            tracing::info!(
                trace_id = %trace_id.0,
                tenant = %tenant.0,
                id = %id,
                "Notification method deleted"
            );
            no_content_response()
        }
        Err(e) => service_error_response(&trace_id, e),
    }
}

pub fn notification_method_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            create_notification_method,
            list_notification_methods
        ))
        .routes(routes!(
            get_notification_method,
            update_notification_method,
            delete_notification_method
        ))
}
