//! 统计报表（仅管理员）

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Local;
use hospital_database::{DoctorPerformanceRow, OccupancyRow, RevenueRow, TopMedicineRow};
use serde::Deserialize;
use tracing::info;

use crate::auth::{CurrentUser, ADMIN_ONLY};
use crate::error::ApiResult;
use crate::export::{build_report_workbook, ReportBundle, XLSX_CONTENT_TYPE};
use crate::state::AppState;

const DEFAULT_REVENUE_DAYS: i32 = 7;
const DEFAULT_TOP_MEDICINES: i64 = 5;

#[derive(Debug, Deserialize)]
pub struct RevenueParams {
    pub days: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct TopMedicineParams {
    pub limit: Option<i64>,
}

pub async fn revenue(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<RevenueParams>,
) -> ApiResult<Json<Vec<RevenueRow>>> {
    current.require_any(ADMIN_ONLY)?;
    let days = params.days.unwrap_or(DEFAULT_REVENUE_DAYS);
    Ok(Json(state.queries().revenue_by_day(days).await?))
}

pub async fn top_medicines(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<TopMedicineParams>,
) -> ApiResult<Json<Vec<TopMedicineRow>>> {
    current.require_any(ADMIN_ONLY)?;
    let limit = params.limit.unwrap_or(DEFAULT_TOP_MEDICINES);
    Ok(Json(state.queries().top_medicines(limit).await?))
}

pub async fn occupancy(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<OccupancyRow>>> {
    current.require_any(ADMIN_ONLY)?;
    Ok(Json(state.queries().bed_occupancy().await?))
}

pub async fn doctor_performance(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<DoctorPerformanceRow>>> {
    current.require_any(ADMIN_ONLY)?;
    Ok(Json(state.queries().doctor_performance().await?))
}

/// 导出全部报表为 xlsx 下载
pub async fn export(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    current.require_any(ADMIN_ONLY)?;
    let queries = state.queries();

    let bundle = ReportBundle {
        revenue: queries.revenue_by_day(DEFAULT_REVENUE_DAYS).await?,
        top_medicines: queries.top_medicines(DEFAULT_TOP_MEDICINES).await?,
        occupancy: queries.bed_occupancy().await?,
        doctor_performance: queries.doctor_performance().await?,
    };
    let bytes = build_report_workbook(&bundle)?;

    let filename = format!(
        "attachment; filename=\"hospital-report-{}.xlsx\"",
        Local::now().format("%Y%m%d")
    );
    info!(by = %current.username, size = bytes.len(), "Report exported");

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, filename),
        ],
        bytes,
    ))
}
