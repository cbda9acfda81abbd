//! 排班与预约

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{Local, NaiveDate};
use hospital_core::{Appointment, DoctorSchedule, HospitalError, Result, UserRole};
use hospital_database::{AppointmentDetail, NewAppointment, NewSchedule, RescheduleAppointment};
use hospital_workflow::SlotAvailability;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{CurrentUser, CLINICIANS, DOCTORS};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SlotParams {
    pub date_str: String,
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| HospitalError::Validation(format!("invalid date '{}', expected YYYY-MM-DD", value)))
}

// ========== 排班 ==========

/// 创建排班，医生只能为自己排班
pub async fn create_schedule(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(schedule): Json<NewSchedule>,
) -> ApiResult<impl IntoResponse> {
    current.require_any(DOCTORS)?;
    if current.role == UserRole::Doctor && schedule.doctor_id != current.id {
        return Err(HospitalError::Forbidden("doctors can only manage their own schedule".to_string()).into());
    }

    let created = state.queries().create_schedule(&schedule).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_schedules(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(doctor_id): Path<Uuid>,
) -> ApiResult<Json<Vec<DoctorSchedule>>> {
    current.require_any(DOCTORS)?;
    Ok(Json(state.queries().list_schedules(doctor_id).await?))
}

/// 医生某天的可预约时段（公开）
pub async fn doctor_slots(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
    Query(params): Query<SlotParams>,
) -> ApiResult<Json<Vec<SlotAvailability>>> {
    let date = parse_date(&params.date_str)?;
    Ok(Json(state.queries().doctor_slots(doctor_id, date).await?))
}

// ========== 预约 ==========

/// 医护人员可改任意预约，患者账户只能改自己订的
fn ensure_can_modify(current: &CurrentUser, appointment: &Appointment) -> Result<()> {
    if current.role.is_staff() || appointment.booked_by == Some(current.id) {
        return Ok(());
    }
    tracing::warn!(
        user = %current.username,
        appointment_id = %appointment.id,
        "Rejected change to another account's appointment"
    );
    Err(HospitalError::Forbidden(
        "you can only change appointments you booked".to_string(),
    ))
}

pub async fn create_appointment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(appointment): Json<NewAppointment>,
) -> ApiResult<impl IntoResponse> {
    let now = Local::now().naive_local();
    let created = state.queries().create_appointment(&appointment, current.id, now).await?;
    info!(appointment_id = %created.id, by = %current.username, "Appointment booked");
    Ok((StatusCode::CREATED, Json(created)))
}

/// 改约，重新走冲突检查
pub async fn reschedule_appointment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(update): Json<RescheduleAppointment>,
) -> ApiResult<Json<Appointment>> {
    let queries = state.queries();
    ensure_can_modify(&current, &queries.get_appointment(id).await?)?;

    let now = Local::now().naive_local();
    let appointment = queries.reschedule_appointment(id, &update, now).await?;
    info!(appointment_id = %id, by = %current.username, "Appointment rescheduled");
    Ok(Json(appointment))
}

/// 取消预约，就诊前 1 小时内不可取消
pub async fn cancel_appointment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Appointment>> {
    let queries = state.queries();
    ensure_can_modify(&current, &queries.get_appointment(id).await?)?;

    let now = Local::now().naive_local();
    let appointment = queries.cancel_appointment(id, now).await?;
    info!(appointment_id = %id, by = %current.username, "Appointment cancelled");
    Ok(Json(appointment))
}

pub async fn confirm_appointment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Appointment>> {
    current.require_any(CLINICIANS)?;
    Ok(Json(state.queries().confirm_appointment(id).await?))
}

/// 到院签到，生成候诊记录
pub async fn check_in_appointment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    current.require_any(CLINICIANS)?;
    let visit = state.queries().check_in_appointment(id).await?;
    Ok((StatusCode::CREATED, Json(visit)))
}

/// 今日待就诊预约，医生只看自己的
pub async fn today_appointments(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<AppointmentDetail>>> {
    current.require_any(CLINICIANS)?;
    let doctor_filter = (current.role == UserRole::Doctor).then_some(current.id);
    let today = Local::now().date_naive();
    Ok(Json(state.queries().appointments_on(today, doctor_filter).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2026-03-09").unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
        );
        assert!(parse_date("09/03/2026").is_err());
    }

    fn account(role: UserRole) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            username: "user".to_string(),
            full_name: "Test User".to_string(),
            role,
        }
    }

    fn appointment_booked_by(booked_by: Option<Uuid>) -> Appointment {
        let start = chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            appointment_date: NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(),
            start_time: start,
            end_time: start + chrono::Duration::minutes(30),
            reason: None,
            status: hospital_core::AppointmentStatus::Pending,
            booked_by,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_patient_accounts_only_change_own_bookings() {
        let patient = account(UserRole::Patient);
        let other = account(UserRole::Patient);
        let nurse = account(UserRole::Nurse);

        let own = appointment_booked_by(Some(patient.id));
        assert!(ensure_can_modify(&patient, &own).is_ok());
        assert!(matches!(
            ensure_can_modify(&other, &own),
            Err(HospitalError::Forbidden(_))
        ));
        assert!(ensure_can_modify(&nurse, &own).is_ok());

        let legacy = appointment_booked_by(None);
        assert!(ensure_can_modify(&patient, &legacy).is_err());
        assert!(ensure_can_modify(&nurse, &legacy).is_ok());
    }
}
