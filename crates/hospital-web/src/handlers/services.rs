//! 检验/影像服务

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use hospital_core::{Service, ServiceRequest, ServiceRequestStatus, ServiceResult};
use hospital_database::{NewService, NewServiceRequest, NewServiceResult, ServiceRequestDetail};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{CurrentUser, ADMIN_ONLY, DOCTORS, LAB_STAFF, STAFF};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RequestQueueParams {
    pub status: Option<ServiceRequestStatus>,
}

/// 服务目录（公开）
pub async fn list_services(State(state): State<AppState>) -> ApiResult<Json<Vec<Service>>> {
    Ok(Json(state.queries().list_active_services().await?))
}

pub async fn create_service(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(service): Json<NewService>,
) -> ApiResult<impl IntoResponse> {
    current.require_any(ADMIN_ONLY)?;
    let created = state.queries().create_service(&service).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// 开具服务申请，开单医生为当前用户
pub async fn request_service(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(visit_id): Path<Uuid>,
    Json(request): Json<NewServiceRequest>,
) -> ApiResult<impl IntoResponse> {
    current.require_any(DOCTORS)?;
    let created = state
        .queries()
        .create_service_request(visit_id, current.id, &request)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_visit_services(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(visit_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ServiceRequestDetail>>> {
    current.require_any(STAFF)?;
    state.queries().require_visit(visit_id).await?;
    Ok(Json(state.queries().list_visit_services(visit_id).await?))
}

/// 技师工作队列，默认 PENDING
pub async fn list_service_requests(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<RequestQueueParams>,
) -> ApiResult<Json<Vec<ServiceRequestDetail>>> {
    current.require_any(LAB_STAFF)?;
    let status = params.status.unwrap_or(ServiceRequestStatus::Pending);
    Ok(Json(state.queries().list_service_requests(status).await?))
}

/// 录入结果，执行技师为当前用户
pub async fn record_result(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(result): Json<NewServiceResult>,
) -> ApiResult<(StatusCode, Json<ServiceResult>)> {
    current.require_any(LAB_STAFF)?;
    let created = state.queries().record_service_result(current.id, &result).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn cancel_request(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ServiceRequest>> {
    current.require_any(LAB_STAFF)?;
    Ok(Json(state.queries().cancel_service_request(id).await?))
}
