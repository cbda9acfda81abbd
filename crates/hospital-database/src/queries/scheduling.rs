use super::DatabaseQueries;
use crate::models::*;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use hospital_core::{
    Appointment, AppointmentStatus, DoctorSchedule, HospitalError, Result, UserRole, Visit,
    VisitPriority, VisitStatus,
};
use hospital_workflow::scheduling::{
    ensure_booking_lead_time, ensure_cancellable, ensure_slot_in_schedule, generate_time_slots,
    mark_booked_slots, parse_slot_time, slot_end, validate_shift, weekday_index,
};
use hospital_workflow::{AppointmentEvent, SlotAvailability, StateMachine};
use sqlx::PgConnection;
use uuid::Uuid;

const APPOINTMENT_DETAIL_SELECT: &str = r#"
    SELECT a.*, p.full_name AS patient_name, u.full_name AS doctor_name
    FROM appointments a
    JOIN patients p ON p.id = a.patient_id
    JOIN users u ON u.id = a.doctor_id
"#;

impl<'a> DatabaseQueries<'a> {
    // ========== 排班相关操作 ==========

    /// 创建排班，每位医生每个工作日只有一条
    pub async fn create_schedule(&self, schedule: &NewSchedule) -> Result<DoctorSchedule> {
        let shift_start = parse_slot_time(&schedule.shift_start)?;
        let shift_end = parse_slot_time(&schedule.shift_end)?;
        validate_shift(schedule.day_of_week, shift_start, shift_end)?;

        let doctor = self
            .get_user_by_id(schedule.doctor_id)
            .await?
            .ok_or_else(|| HospitalError::not_found("doctor not found"))?;
        if doctor.role != UserRole::Doctor {
            return Err(HospitalError::validation("schedules can only be assigned to doctors"));
        }

        let pool = self.pool.pool();
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM doctor_schedules WHERE doctor_id = $1 AND day_of_week = $2)",
        )
        .bind(schedule.doctor_id)
        .bind(schedule.day_of_week)
        .fetch_one(pool)
        .await?;
        if exists {
            return Err(HospitalError::validation("doctor already has a schedule on this day"));
        }

        let row = sqlx::query_as::<_, DoctorSchedule>(
            r#"
            INSERT INTO doctor_schedules (id, doctor_id, day_of_week, shift_start, shift_end)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(schedule.doctor_id)
        .bind(schedule.day_of_week)
        .bind(shift_start)
        .bind(shift_end)
        .fetch_one(pool)
        .await?;

        tracing::info!(doctor_id = %row.doctor_id, day = row.day_of_week, "Schedule created");
        Ok(row)
    }

    pub async fn list_schedules(&self, doctor_id: Uuid) -> Result<Vec<DoctorSchedule>> {
        let results = sqlx::query_as::<_, DoctorSchedule>(
            "SELECT * FROM doctor_schedules WHERE doctor_id = $1 ORDER BY day_of_week",
        )
        .bind(doctor_id)
        .fetch_all(self.pool.pool())
        .await?;
        Ok(results)
    }

    async fn schedule_for_day(
        conn: &mut PgConnection,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<DoctorSchedule>> {
        let result = sqlx::query_as::<_, DoctorSchedule>(
            "SELECT * FROM doctor_schedules WHERE doctor_id = $1 AND day_of_week = $2",
        )
        .bind(doctor_id)
        .bind(weekday_index(date))
        .fetch_optional(&mut *conn)
        .await?;
        Ok(result)
    }

    /// 医生某天的时段及占用情况；当天无有效排班时返回空列表
    pub async fn doctor_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<SlotAvailability>> {
        let mut conn = self.pool.pool().acquire().await?;

        let schedule = match Self::schedule_for_day(&mut conn, doctor_id, date).await? {
            Some(s) if s.is_active => s,
            _ => return Ok(Vec::new()),
        };

        let booked: Vec<NaiveTime> = sqlx::query_scalar(
            r#"
            SELECT start_time FROM appointments
            WHERE doctor_id = $1 AND appointment_date = $2 AND status <> 'CANCELLED'
            "#,
        )
        .bind(doctor_id)
        .bind(date)
        .fetch_all(&mut *conn)
        .await?;

        let slots = generate_time_slots(schedule.shift_start, schedule.shift_end);
        Ok(mark_booked_slots(&slots, &booked))
    }

    /// 同一医生同一时段是否已有未取消的预约
    async fn slot_taken(
        conn: &mut PgConnection,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        exclude: Option<Uuid>,
    ) -> Result<bool> {
        let taken = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM appointments
                WHERE doctor_id = $1 AND appointment_date = $2 AND start_time = $3
                  AND status <> 'CANCELLED'
                  AND ($4::uuid IS NULL OR id <> $4)
            )
            "#,
        )
        .bind(doctor_id)
        .bind(date)
        .bind(start_time)
        .bind(exclude)
        .fetch_one(&mut *conn)
        .await?;
        Ok(taken)
    }

    /// 预约前校验：提前量、排班时段、时段冲突
    async fn check_bookable(
        conn: &mut PgConnection,
        doctor_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        now: NaiveDateTime,
        exclude: Option<Uuid>,
    ) -> Result<()> {
        ensure_booking_lead_time(date, start_time, now)?;

        let schedule = Self::schedule_for_day(conn, doctor_id, date).await?;
        ensure_slot_in_schedule(schedule.as_ref(), start_time)?;

        if Self::slot_taken(conn, doctor_id, date, start_time, exclude).await? {
            return Err(HospitalError::validation("doctor already has an appointment in this slot"));
        }
        Ok(())
    }

    // ========== 预约相关操作 ==========

    /// 创建预约，`now` 为本地时间，`booked_by` 为操作账户
    pub async fn create_appointment(
        &self,
        appt: &NewAppointment,
        booked_by: Uuid,
        now: NaiveDateTime,
    ) -> Result<Appointment> {
        let start_time = parse_slot_time(&appt.start_time)?;
        self.require_patient(appt.patient_id).await?;

        let mut conn = self.pool.pool().acquire().await?;
        Self::check_bookable(&mut conn, appt.doctor_id, appt.appointment_date, start_time, now, None)
            .await?;

        // 并发抢占同一时段时由部分唯一索引兜底，返回冲突
        let row = sqlx::query_as::<_, DbAppointment>(
            r#"
            INSERT INTO appointments (id, patient_id, doctor_id, appointment_date, start_time, end_time, reason, status, booked_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(appt.patient_id)
        .bind(appt.doctor_id)
        .bind(appt.appointment_date)
        .bind(start_time)
        .bind(slot_end(start_time))
        .bind(&appt.reason)
        .bind(AppointmentStatus::Pending.as_str())
        .bind(booked_by)
        .fetch_one(&mut *conn)
        .await?;

        tracing::info!(
            appointment_id = %row.id,
            doctor_id = %row.doctor_id,
            date = %row.appointment_date,
            start = %row.start_time,
            "Appointment booked"
        );
        Ok(row.into())
    }

    async fn lock_appointment(conn: &mut PgConnection, id: Uuid) -> Result<Appointment> {
        sqlx::query_as::<_, DbAppointment>("SELECT * FROM appointments WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .map(Appointment::from)
            .ok_or_else(|| HospitalError::not_found("appointment not found"))
    }

    async fn set_appointment_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment> {
        let row = sqlx::query_as::<_, DbAppointment>(
            "UPDATE appointments SET status = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_one(&mut *conn)
        .await?;
        Ok(row.into())
    }

    pub async fn get_appointment(&self, id: Uuid) -> Result<Appointment> {
        sqlx::query_as::<_, DbAppointment>("SELECT * FROM appointments WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?
            .map(Appointment::from)
            .ok_or_else(|| HospitalError::not_found("appointment not found"))
    }

    /// 改期，改期后回到 PENDING 等待确认
    pub async fn reschedule_appointment(
        &self,
        id: Uuid,
        update: &RescheduleAppointment,
        now: NaiveDateTime,
    ) -> Result<Appointment> {
        let start_time = parse_slot_time(&update.start_time)?;
        let mut tx = self.pool.pool().begin().await?;

        let appt = Self::lock_appointment(&mut tx, id).await?;
        let next = StateMachine::appointment().transition(&appt.status, &AppointmentEvent::Reschedule)?;

        Self::check_bookable(
            &mut tx,
            appt.doctor_id,
            update.appointment_date,
            start_time,
            now,
            Some(id),
        )
        .await?;

        let row = sqlx::query_as::<_, DbAppointment>(
            r#"
            UPDATE appointments SET
                appointment_date = $2,
                start_time = $3,
                end_time = $4,
                reason = COALESCE($5, reason),
                status = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.appointment_date)
        .bind(start_time)
        .bind(slot_end(start_time))
        .bind(&update.reason)
        .bind(next.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(appointment_id = %id, date = %update.appointment_date, "Appointment rescheduled");
        Ok(row.into())
    }

    pub async fn confirm_appointment(&self, id: Uuid) -> Result<Appointment> {
        let mut tx = self.pool.pool().begin().await?;
        let appt = Self::lock_appointment(&mut tx, id).await?;
        let next = StateMachine::appointment().transition(&appt.status, &AppointmentEvent::Confirm)?;

        let row = Self::set_appointment_status(&mut tx, id, next).await?;
        tx.commit().await?;
        tracing::info!(appointment_id = %id, "Appointment confirmed");
        Ok(row)
    }

    /// 取消预约，开始前1小时内不可取消
    pub async fn cancel_appointment(&self, id: Uuid, now: NaiveDateTime) -> Result<Appointment> {
        let mut tx = self.pool.pool().begin().await?;
        let appt = Self::lock_appointment(&mut tx, id).await?;
        let next = StateMachine::appointment().transition(&appt.status, &AppointmentEvent::Cancel)?;
        ensure_cancellable(appt.appointment_date, appt.start_time, now)?;

        let row = Self::set_appointment_status(&mut tx, id, next).await?;
        tx.commit().await?;
        tracing::info!(appointment_id = %id, "Appointment cancelled");
        Ok(row)
    }

    /// 签到：生成候诊就诊（主诉取预约原因），预约标记为 COMPLETED
    pub async fn check_in_appointment(&self, id: Uuid) -> Result<Visit> {
        let mut tx = self.pool.pool().begin().await?;
        let appt = Self::lock_appointment(&mut tx, id).await?;
        let next = StateMachine::appointment().transition(&appt.status, &AppointmentEvent::CheckIn)?;

        let visit = sqlx::query_as::<_, DbVisit>(
            r#"
            INSERT INTO visits (id, patient_id, doctor_id, status, priority, chief_complaint)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(appt.patient_id)
        .bind(appt.doctor_id)
        .bind(VisitStatus::Waiting.as_str())
        .bind(VisitPriority::Normal.as_str())
        .bind(&appt.reason)
        .fetch_one(&mut *tx)
        .await?;

        Self::set_appointment_status(&mut tx, id, next).await?;
        tx.commit().await?;

        tracing::info!(appointment_id = %id, visit_id = %visit.id, "Appointment checked in");
        Ok(visit.into())
    }

    /// 某天待就诊的预约（PENDING/CONFIRMED），可按医生过滤
    pub async fn appointments_on(
        &self,
        date: NaiveDate,
        doctor_id: Option<Uuid>,
    ) -> Result<Vec<AppointmentDetail>> {
        let results = sqlx::query_as::<_, DbAppointmentDetail>(&format!(
            r#"
            {}
            WHERE a.appointment_date = $1
              AND a.status IN ('PENDING', 'CONFIRMED')
              AND ($2::uuid IS NULL OR a.doctor_id = $2)
            ORDER BY a.start_time
            "#,
            APPOINTMENT_DETAIL_SELECT
        ))
        .bind(date)
        .bind(doctor_id)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(results.into_iter().map(AppointmentDetail::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{self, test_pool};
    use chrono::Duration;

    fn booking(patient_id: Uuid, doctor_id: Uuid, date: NaiveDate) -> NewAppointment {
        NewAppointment {
            patient_id,
            doctor_id,
            appointment_date: date,
            start_time: "09:00".to_string(),
            reason: Some("Khám định kỳ".to_string()),
        }
    }

    #[tokio::test]
    async fn test_slot_can_only_be_booked_once() {
        let Some(pool) = test_pool().await else { return };
        let queries = DatabaseQueries::new(&pool);

        let date = NaiveDate::from_ymd_opt(2031, 3, 10).unwrap();
        let now = (date - Duration::days(7)).and_hms_opt(8, 0, 0).unwrap();

        let doctor = test_support::doctor(&queries).await;
        let account = test_support::user(&queries, UserRole::Patient).await;
        let first = test_support::patient(&queries).await;
        let second = test_support::patient(&queries).await;

        queries
            .create_schedule(&NewSchedule {
                doctor_id: doctor.id,
                day_of_week: weekday_index(date),
                shift_start: "08:00".to_string(),
                shift_end: "12:00".to_string(),
            })
            .await
            .unwrap();

        let booked = queries
            .create_appointment(&booking(first.id, doctor.id, date), account.id, now)
            .await
            .unwrap();
        assert_eq!(booked.status, AppointmentStatus::Pending);
        assert_eq!(booked.booked_by, Some(account.id));

        let err = queries
            .create_appointment(&booking(second.id, doctor.id, date), account.id, now)
            .await
            .unwrap_err();
        assert!(matches!(err, HospitalError::Validation(_)), "{:?}", err);

        // 取消后时段重新开放
        let cancelled = queries.cancel_appointment(booked.id, now).await.unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

        let rebooked = queries
            .create_appointment(&booking(second.id, doctor.id, date), account.id, now)
            .await
            .unwrap();
        assert_eq!(rebooked.patient_id, second.id);
    }

    #[tokio::test]
    async fn test_booking_outside_schedule_is_rejected() {
        let Some(pool) = test_pool().await else { return };
        let queries = DatabaseQueries::new(&pool);

        let date = NaiveDate::from_ymd_opt(2031, 3, 11).unwrap();
        let now = (date - Duration::days(2)).and_hms_opt(8, 0, 0).unwrap();

        let doctor = test_support::doctor(&queries).await;
        let patient = test_support::patient(&queries).await;

        let err = queries
            .create_appointment(&booking(patient.id, doctor.id, date), doctor.id, now)
            .await
            .unwrap_err();
        assert!(matches!(err, HospitalError::Validation(_)), "{:?}", err);
    }
}
