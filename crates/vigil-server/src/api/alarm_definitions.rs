use crate::api::pagination::{deserialize_optional_u64, list_links};
use crate::api::{
    error_response, json_rejection_response, no_content_response, service_error_response,
    success_response, ApiError, Link, ListData,
};
use crate::logging::TraceId;
use crate::middleware::TenantId;
use crate::service::PageRequest;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, OriginalUri, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::{Query, QueryRejection};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};
use vigil_common::types::{
    CreateAlarmDefinitionRequest, PatchAlarmDefinitionRequest, Severity,
    UpdateAlarmDefinitionRequest,
};
use vigil_storage::AlarmDefinitionRow;

const COLLECTION: &str = "/v2.0/alarm-definitions";

/// 告警定义
#[derive(Debug, Serialize, ToSchema)]
pub struct AlarmDefinitionResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    /// 阈值表达式
    pub expression: String,
    /// 子告警分组维度
    pub match_by: Vec<String>,
    pub severity: Severity,
    pub actions_enabled: bool,
    pub alarm_actions: Vec<String>,
    pub ok_actions: Vec<String>,
    pub undetermined_actions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub links: Vec<Link>,
}

impl From<AlarmDefinitionRow> for AlarmDefinitionResponse {
    fn from(row: AlarmDefinitionRow) -> Self {
        let links = vec![Link::self_link(format!("{COLLECTION}/{}", row.id))];
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            expression: row.expression,
            match_by: row.match_by,
            severity: row.severity,
            actions_enabled: row.actions_enabled,
            alarm_actions: row.alarm_actions,
            ok_actions: row.ok_actions,
            undetermined_actions: row.undetermined_actions,
            created_at: row.created_at,
            updated_at: row.updated_at,
            links,
        }
    }
}

/// 告警定义列表过滤参数
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AlarmDefinitionListParams {
    /// 名称精确匹配
    #[param(required = false)]
    pub name: Option<String>,
    /// 维度过滤，格式 `key:value[,key:value...]`，可重复传入
    #[param(required = false)]
    #[serde(default)]
    pub dimensions: Vec<String>,
    /// 上一页最后一条记录的 ID
    #[param(required = false)]
    pub offset: Option<String>,
    /// 每页条数（默认 20，最大 1000）
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
}

impl AlarmDefinitionListParams {
    fn page_request(&self) -> PageRequest {
        PageRequest {
            offset: self.offset.clone(),
            limit: self.limit,
        }
    }
}

/// 创建告警定义。
/// 所有引用的通知方式必须属于当前租户，否则整体失败且不写入任何数据。
#[utoipa::path(
    post,
    path = "/v2.0/alarm-definitions",
    tag = "AlarmDefinitions",
    security(("tenant_header" = [])),
    request_body = CreateAlarmDefinitionRequest,
    responses(
        (status = 201, description = "告警定义已创建", body = AlarmDefinitionResponse),
        (status = 401, description = "缺少 X-Tenant-Id", body = ApiError),
        (status = 409, description = "名称已存在", body = ApiError),
        (status = 422, description = "参数校验失败或通知方式不存在", body = ApiError)
    )
)]
async fn create_alarm_definition(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    payload: Result<Json<CreateAlarmDefinitionRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return json_rejection_response(&trace_id, &rejection),
    };
    match state.alarm_definitions.create(&tenant, req).await {
        Ok(row) => success_response(
            StatusCode::CREATED,
            &trace_id,
            AlarmDefinitionResponse::from(row),
        ),
        Err(e) => service_error_response(&trace_id, e),
    }
}

/// 分页查询告警定义列表。
/// 按 ID 升序；`offset` 为上一页最后一条记录的 ID。
#[utoipa::path(
    get,
    path = "/v2.0/alarm-definitions",
    tag = "AlarmDefinitions",
    security(("tenant_header" = [])),
    params(AlarmDefinitionListParams),
    responses(
        (status = 200, description = "告警定义列表", body = ListData<AlarmDefinitionResponse>),
        (status = 401, description = "缺少 X-Tenant-Id", body = ApiError),
        (status = 422, description = "过滤或分页参数无效", body = ApiError)
    )
)]
async fn list_alarm_definitions(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    params: Result<Query<AlarmDefinitionListParams>, QueryRejection>,
) -> impl IntoResponse {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => {
            return error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                &trace_id,
                "validation_error",
                &rejection.to_string(),
            )
        }
    };
    let result = state
        .alarm_definitions
        .list(
            &tenant,
            params.name.as_deref(),
            &params.dimensions,
            &params.page_request(),
        )
        .await;
    match result {
        Ok(page) => {
            let links = list_links(uri.path(), uri.query(), &page);
            let elements: Vec<AlarmDefinitionResponse> = page
                .elements
                .into_iter()
                .map(AlarmDefinitionResponse::from)
                .collect();
            success_response(StatusCode::OK, &trace_id, ListData { elements, links })
        }
        Err(e) => service_error_response(&trace_id, e),
    }
}

/// 获取指定告警定义。
#[utoipa::path(
    get,
    path = "/v2.0/alarm-definitions/{id}",
    tag = "AlarmDefinitions",
    security(("tenant_header" = [])),
    params(("id" = String, Path, description = "告警定义 ID")),
    responses(
        (status = 200, description = "告警定义详情", body = AlarmDefinitionResponse),
        (status = 401, description = "缺少 X-Tenant-Id", body = ApiError),
        (status = 404, description = "告警定义不存在", body = ApiError)
    )
)]
async fn get_alarm_definition(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.alarm_definitions.get(&tenant, &id).await {
        Ok(row) => success_response(StatusCode::OK, &trace_id, AlarmDefinitionResponse::from(row)),
        Err(e) => service_error_response(&trace_id, e),
    }
}

/// 全量更新告警定义。
/// 未提供的可选字段恢复默认值；`match_by` 不可修改。
#[utoipa::path(
    put,
    path = "/v2.0/alarm-definitions/{id}",
    tag = "AlarmDefinitions",
    security(("tenant_header" = [])),
    params(("id" = String, Path, description = "告警定义 ID")),
    request_body = UpdateAlarmDefinitionRequest,
    responses(
        (status = 200, description = "更新后的告警定义", body = AlarmDefinitionResponse),
        (status = 401, description = "缺少 X-Tenant-Id", body = ApiError),
        (status = 404, description = "告警定义不存在", body = ApiError),
        (status = 409, description = "名称已存在", body = ApiError),
        (status = 422, description = "参数校验失败、match_by 变更或通知方式不存在", body = ApiError)
    )
)]
async fn update_alarm_definition(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateAlarmDefinitionRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return json_rejection_response(&trace_id, &rejection),
    };
    match state.alarm_definitions.update(&tenant, &id, req).await {
        Ok(row) => success_response(StatusCode::OK, &trace_id, AlarmDefinitionResponse::from(row)),
        Err(e) => service_error_response(&trace_id, e),
    }
}

/// 部分更新告警定义，仅修改请求中提供的字段。
#[utoipa::path(
    patch,
    path = "/v2.0/alarm-definitions/{id}",
    tag = "AlarmDefinitions",
    security(("tenant_header" = [])),
    params(("id" = String, Path, description = "告警定义 ID")),
    request_body = PatchAlarmDefinitionRequest,
    responses(
        (status = 200, description = "更新后的告警定义", body = AlarmDefinitionResponse),
        (status = 401, description = "缺少 X-Tenant-Id", body = ApiError),
        (status = 404, description = "告警定义不存在", body = ApiError),
        (status = 409, description = "名称已存在", body = ApiError),
        (status = 422, description = "参数校验失败、match_by 变更或通知方式不存在", body = ApiError)
    )
)]
async fn patch_alarm_definition(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<PatchAlarmDefinitionRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return json_rejection_response(&trace_id, &rejection),
    };
    match state.alarm_definitions.patch(&tenant, &id, req).await {
        Ok(row) => success_response(StatusCode::OK, &trace_id, AlarmDefinitionResponse::from(row)),
        Err(e) => service_error_response(&trace_id, e),
    }
}

/// 删除告警定义及其全部通知动作关联。
#[utoipa::path(
    delete,
    path = "/v2.0/alarm-definitions/{id}",
    tag = "AlarmDefinitions",
    security(("tenant_header" = [])),
    params(("id" = String, Path, description = "告警定义 ID")),
    responses(
        (status = 204, description = "已删除"),
        (status = 401, description = "缺少 X-Tenant-Id", body = ApiError),
        (status = 404, description = "告警定义不存在", body = ApiError)
    )
)]
async fn delete_alarm_definition(
    Extension(trace_id): Extension<TraceId>,
    Extension(tenant): Extension<TenantId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.alarm_definitions.delete(&tenant, &id).await {
        Ok(()) => {
            tracing::info!(
                trace_id = %trace_id.0,
                tenant = %tenant.0,
                id = %id,
                "Alarm definition deleted"
            );
            no_content_response()
        }
        Err(e) => service_error_response(&trace_id, e),
    }
}

pub fn alarm_definition_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(create_alarm_definition, list_alarm_definitions))
        .routes(routes!(
            get_alarm_definition,
            update_alarm_definition,
            patch_alarm_definition,
            delete_alarm_definition
        ))
}
