//! 门诊就诊：分诊、诊断、结束就诊

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use hospital_core::{Visit, VisitStatus};
use hospital_database::{DiagnosisUpdate, NewVisit, VisitWithPrescriptions};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{CurrentUser, CLINICIANS, DOCTORS};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VisitListParams {
    pub status: Option<VisitStatus>,
}

/// 分诊登记，初始状态 WAITING
pub async fn create_visit(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(visit): Json<NewVisit>,
) -> ApiResult<impl IntoResponse> {
    current.require_any(CLINICIANS)?;
    visit.validate()?;

    let created = state.queries().create_visit(&visit).await?;
    info!(visit_id = %created.id, priority = %created.priority, by = %current.username, "Visit registered");
    Ok((StatusCode::CREATED, Json(created)))
}

/// 候诊队列，急诊优先
pub async fn list_visits(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<VisitListParams>,
) -> ApiResult<Json<Vec<Visit>>> {
    current.require_any(CLINICIANS)?;
    Ok(Json(state.queries().list_visits(params.status).await?))
}

pub async fn get_visit(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<VisitWithPrescriptions>> {
    current.require_any(CLINICIANS)?;
    let visit = state.queries().require_visit(id).await?;
    let prescriptions = state.queries().list_prescriptions(id).await?;
    Ok(Json(VisitWithPrescriptions { visit, prescriptions }))
}

pub async fn update_diagnosis(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(update): Json<DiagnosisUpdate>,
) -> ApiResult<Json<Visit>> {
    current.require_any(DOCTORS)?;
    Ok(Json(state.queries().update_diagnosis(id, &update).await?))
}

/// IN_PROGRESS → COMPLETED
pub async fn finish_visit(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Visit>> {
    current.require_any(DOCTORS)?;
    let visit = state.queries().finish_visit(id).await?;
    info!(visit_id = %id, by = %current.username, "Visit finished");
    Ok(Json(visit))
}
