//! 住院：科室、病房、床位、入院、转床、出院、医嘱

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use hospital_core::{Bed, BedAllocation, BedStatus, DailyOrder, Department, InpatientRecord};
use hospital_database::{
    AdmitPatient, BedMapDepartment, DischargeResult, InpatientBill, InpatientDetail,
    InpatientSummary, NewBed, NewDailyOrder, NewDepartment, NewRoom,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{CurrentUser, ADMIN_ONLY, CLINICIANS, STAFF};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BedStatusUpdate {
    pub status: BedStatus,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub new_bed_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct DischargeRequest {
    pub discharge_summary: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InpatientBillParams {
    #[serde(default)]
    pub insurance_percent: i32,
}

// ========== 科室、病房、床位 ==========

pub async fn list_departments(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<Department>>> {
    current.require_any(STAFF)?;
    Ok(Json(state.queries().list_departments().await?))
}

pub async fn create_department(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(dept): Json<NewDepartment>,
) -> ApiResult<impl IntoResponse> {
    current.require_any(ADMIN_ONLY)?;
    let created = state.queries().create_department(&dept).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn create_room(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(room): Json<NewRoom>,
) -> ApiResult<impl IntoResponse> {
    current.require_any(ADMIN_ONLY)?;
    let created = state.queries().create_room(&room).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn create_bed(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(bed): Json<NewBed>,
) -> ApiResult<impl IntoResponse> {
    current.require_any(ADMIN_ONLY)?;
    let created = state.queries().create_bed(&bed).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// 维护状态切换，占用中的床位不可手动修改
pub async fn update_bed_status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(update): Json<BedStatusUpdate>,
) -> ApiResult<Json<Bed>> {
    current.require_any(ADMIN_ONLY)?;
    Ok(Json(state.queries().update_bed_status(id, update.status).await?))
}

pub async fn bed_map(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<BedMapDepartment>>> {
    current.require_any(CLINICIANS)?;
    Ok(Json(state.queries().bed_map().await?))
}

// ========== 住院流程 ==========

pub async fn list_inpatients(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<InpatientSummary>>> {
    current.require_any(CLINICIANS)?;
    Ok(Json(state.queries().list_active_inpatients().await?))
}

pub async fn get_inpatient(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<InpatientDetail>> {
    current.require_any(CLINICIANS)?;
    Ok(Json(state.queries().inpatient_detail(id, Utc::now()).await?))
}

/// 住院账单预览（床位费 + 关联就诊的药品与服务）
pub async fn inpatient_bill(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Query(params): Query<InpatientBillParams>,
) -> ApiResult<Json<InpatientBill>> {
    current.require_any(CLINICIANS)?;
    let bill = state
        .queries()
        .inpatient_bill(id, params.insurance_percent, Utc::now())
        .await?;
    Ok(Json(bill))
}

pub async fn admit_patient(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(admit): Json<AdmitPatient>,
) -> ApiResult<(StatusCode, Json<InpatientRecord>)> {
    current.require_any(CLINICIANS)?;
    let record = state.queries().admit_patient(&admit, Utc::now()).await?;
    state.metrics.record_admission();
    info!(inpatient_id = %record.id, bed_id = %admit.bed_id, by = %current.username, "Patient admitted");
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn transfer_bed(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<TransferRequest>,
) -> ApiResult<Json<BedAllocation>> {
    current.require_any(CLINICIANS)?;
    let allocation = state
        .queries()
        .transfer_bed(id, request.new_bed_id, Utc::now())
        .await?;
    Ok(Json(allocation))
}

pub async fn discharge_patient(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    body: Option<Json<DischargeRequest>>,
) -> ApiResult<Json<DischargeResult>> {
    current.require_any(CLINICIANS)?;
    let request = body.map(|Json(b)| b).unwrap_or_default();

    let result = state
        .queries()
        .discharge_patient(id, request.discharge_summary.as_deref(), Utc::now())
        .await?;
    state.metrics.record_discharge();
    info!(inpatient_id = %id, bed_fee = %result.bed_fee.bed_fee_total, by = %current.username, "Patient discharged");
    Ok(Json(result))
}

pub async fn add_daily_order(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(order): Json<NewDailyOrder>,
) -> ApiResult<(StatusCode, Json<DailyOrder>)> {
    current.require_any(CLINICIANS)?;
    let created = state.queries().add_daily_order(id, current.id, &order).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
