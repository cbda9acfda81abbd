//! 药房：药品目录、库存预警、供应商、入库与处方

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Local;
use hospital_core::{HospitalError, ImportReceipt, Medicine, Supplier};
use hospital_database::{
    MedicineUpdate, NewImportReceipt, NewMedicine, NewPrescription, NewSupplier, PrescriptionDetail,
};
use hospital_workflow::{inventory::EXPIRY_WARNING_DAYS, InventoryAlert};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{CurrentUser, ADMIN_ONLY, DOCTORS, STAFF};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MedicineSearchParams {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExpiryParams {
    pub days: Option<i64>,
}

// ========== 药品目录 ==========

pub async fn list_medicines(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<MedicineSearchParams>,
) -> ApiResult<Json<Vec<Medicine>>> {
    current.require_any(STAFF)?;
    Ok(Json(state.queries().list_medicines(params.search.as_deref()).await?))
}

pub async fn get_medicine(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Medicine>> {
    current.require_any(STAFF)?;
    let medicine = state
        .queries()
        .get_medicine(id)
        .await?
        .ok_or_else(|| HospitalError::not_found("medicine not found"))?;
    Ok(Json(medicine))
}

pub async fn create_medicine(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(medicine): Json<NewMedicine>,
) -> ApiResult<impl IntoResponse> {
    current.require_any(ADMIN_ONLY)?;
    medicine.validate()?;
    let created = state.queries().create_medicine(&medicine).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_medicine(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(update): Json<MedicineUpdate>,
) -> ApiResult<Json<Medicine>> {
    current.require_any(ADMIN_ONLY)?;
    update.validate()?;
    Ok(Json(state.queries().update_medicine(id, &update).await?))
}

/// 30 天内（或指定天数内）过期的药品
pub async fn expiry_alert(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<ExpiryParams>,
) -> ApiResult<Json<Vec<Medicine>>> {
    current.require_any(STAFF)?;
    let days = params.days.unwrap_or(EXPIRY_WARNING_DAYS);
    if days < 0 {
        return Err(HospitalError::validation("days must not be negative").into());
    }
    let today = Local::now().date_naive();
    Ok(Json(state.queries().expiring_medicines(today, days).await?))
}

/// 库存预警：临期与低库存
pub async fn inventory_alerts(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<InventoryAlert>>> {
    current.require_any(STAFF)?;
    let today = Local::now().date_naive();
    Ok(Json(state.queries().inventory_alerts(today).await?))
}

// ========== 供应商与入库 ==========

pub async fn list_suppliers(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<Supplier>>> {
    current.require_any(ADMIN_ONLY)?;
    Ok(Json(state.queries().list_suppliers().await?))
}

pub async fn create_supplier(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(supplier): Json<NewSupplier>,
) -> ApiResult<impl IntoResponse> {
    current.require_any(ADMIN_ONLY)?;
    let created = state.queries().create_supplier(&supplier).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// 创建入库单草稿
pub async fn create_import(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(receipt): Json<NewImportReceipt>,
) -> ApiResult<impl IntoResponse> {
    current.require_any(ADMIN_ONLY)?;
    let created = state.queries().create_import(&receipt, current.id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_import(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ImportReceipt>> {
    current.require_any(ADMIN_ONLY)?;
    Ok(Json(state.queries().get_import(id).await?))
}

/// 确认入库，增加库存
pub async fn confirm_import(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ImportReceipt>> {
    current.require_any(ADMIN_ONLY)?;
    let receipt = state.queries().confirm_import(id).await?;
    info!(receipt_id = %id, by = %current.username, "Import receipt confirmed");
    Ok(Json(receipt))
}

// ========== 处方 ==========

/// 开处方并扣减库存
pub async fn create_prescription(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(prescription): Json<NewPrescription>,
) -> ApiResult<impl IntoResponse> {
    current.require_any(DOCTORS)?;

    match state.queries().create_prescription(&prescription).await {
        Ok(created) => {
            state.metrics.record_prescription();
            Ok((StatusCode::CREATED, Json(created)))
        }
        Err(e) => {
            if let HospitalError::InsufficientStock { available, requested } = &e {
                state.metrics.record_stock_rejection();
                warn!(
                    medicine_id = %prescription.medicine_id,
                    available = *available,
                    requested = *requested,
                    "Prescription rejected for insufficient stock"
                );
            }
            Err(e.into())
        }
    }
}

pub async fn list_prescriptions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(visit_id): Path<Uuid>,
) -> ApiResult<Json<Vec<PrescriptionDetail>>> {
    current.require_any(DOCTORS)?;
    state.queries().require_visit(visit_id).await?;
    Ok(Json(state.queries().list_prescriptions(visit_id).await?))
}
