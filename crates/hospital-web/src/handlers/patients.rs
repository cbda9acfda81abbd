//! 患者档案

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use hospital_core::Patient;
use hospital_database::{NewPatient, PatientHistory, PatientUpdate};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::auth::{CurrentUser, ADMIN_ONLY, CLINICIANS};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PatientSearchParams {
    pub search: Option<String>,
}

pub async fn create_patient(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(patient): Json<NewPatient>,
) -> ApiResult<impl IntoResponse> {
    current.require_any(CLINICIANS)?;
    let patient = patient.normalized()?;

    let created = state.queries().create_patient(&patient).await?;
    info!(patient_id = %created.id, by = %current.username, "Patient registered");
    Ok((StatusCode::CREATED, Json(created)))
}

/// 按姓名、医保卡号、身份证号或电话模糊查询
pub async fn search_patients(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<PatientSearchParams>,
) -> ApiResult<Json<Vec<Patient>>> {
    current.require_any(CLINICIANS)?;
    Ok(Json(state.queries().search_patients(params.search.as_deref()).await?))
}

pub async fn get_patient(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Patient>> {
    current.require_any(CLINICIANS)?;
    Ok(Json(state.queries().require_patient(id).await?))
}

pub async fn update_patient(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(update): Json<PatientUpdate>,
) -> ApiResult<Json<Patient>> {
    current.require_any(CLINICIANS)?;
    let update = update.normalized()?;
    Ok(Json(state.queries().update_patient(id, &update).await?))
}

/// 软删除（仅管理员）
pub async fn delete_patient(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    current.require_any(ADMIN_ONLY)?;
    state.queries().soft_delete_patient(id).await?;
    info!(patient_id = %id, by = %current.username, "Patient deleted");
    Ok(Json(json!({ "message": "patient deleted", "id": id })))
}

/// 就诊历史（含处方）
pub async fn patient_history(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PatientHistory>> {
    current.require_any(CLINICIANS)?;
    Ok(Json(state.queries().patient_history(id).await?))
}
