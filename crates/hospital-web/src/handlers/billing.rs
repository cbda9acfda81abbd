//! 收费：账单预览与开具发票

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use hospital_core::{HospitalError, Invoice};
use hospital_database::NewInvoice;
use hospital_workflow::BillPreview;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{CurrentUser, NURSES};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct BillParams {
    #[serde(default)]
    pub insurance_percent: i32,
    #[serde(default)]
    pub procedure_fee: Decimal,
}

/// 账单预览，每次调用重新计算
pub async fn preview_bill(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(visit_id): Path<Uuid>,
    Query(params): Query<BillParams>,
) -> ApiResult<Json<BillPreview>> {
    current.require_any(NURSES)?;
    let bill = state
        .queries()
        .preview_bill(visit_id, state.exam_fee(), params.insurance_percent, params.procedure_fee)
        .await?;
    Ok(Json(bill))
}

/// 收费并开具发票：COMPLETED → PAID
pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(invoice): Json<NewInvoice>,
) -> ApiResult<impl IntoResponse> {
    current.require_any(NURSES)?;
    let created = state.queries().create_invoice(&invoice, state.exam_fee()).await?;
    state.metrics.record_invoice();
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(visit_id): Path<Uuid>,
) -> ApiResult<Json<Invoice>> {
    current.require_any(NURSES)?;
    let invoice = state
        .queries()
        .get_invoice_by_visit(visit_id)
        .await?
        .ok_or_else(|| HospitalError::not_found("invoice not found"))?;
    Ok(Json(invoice))
}
