use super::billing::visit_bill_lines;
use super::DatabaseQueries;
use crate::models::*;
use chrono::{DateTime, Utc};
use hospital_core::{
    Bed, BedAllocation, BedStatus, DailyOrder, Department, HospitalError, InpatientRecord,
    InpatientStatus, Result, Room,
};
use hospital_workflow::{BedFeeLine, BedFeeSummary, BillingInput};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

impl<'a> DatabaseQueries<'a> {
    // ========== 科室、病房与床位 ==========

    pub async fn list_departments(&self) -> Result<Vec<Department>> {
        let results = sqlx::query_as::<_, Department>("SELECT * FROM departments ORDER BY name")
            .fetch_all(self.pool.pool())
            .await?;
        Ok(results)
    }

    pub async fn create_department(&self, dept: &NewDepartment) -> Result<Department> {
        if dept.name.trim().is_empty() {
            return Err(HospitalError::validation("department name is required"));
        }
        let row = sqlx::query_as::<_, Department>(
            "INSERT INTO departments (id, name, description) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(dept.name.trim())
        .bind(&dept.description)
        .fetch_one(self.pool.pool())
        .await?;
        Ok(row)
    }

    pub async fn create_room(&self, room: &NewRoom) -> Result<Room> {
        if room.price_per_day.is_sign_negative() {
            return Err(HospitalError::validation("price_per_day must not be negative"));
        }
        let row = sqlx::query_as::<_, Room>(
            r#"
            INSERT INTO rooms (id, department_id, room_number, room_type, price_per_day)
            SELECT $1, d.id, $3, $4, $5 FROM departments d WHERE d.id = $2
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(room.department_id)
        .bind(room.room_number.trim())
        .bind(&room.room_type)
        .bind(room.price_per_day)
        .fetch_optional(self.pool.pool())
        .await?
        .ok_or_else(|| HospitalError::not_found("department not found"))?;
        Ok(row)
    }

    pub async fn create_bed(&self, bed: &NewBed) -> Result<Bed> {
        let row = sqlx::query_as::<_, DbBed>(
            r#"
            INSERT INTO beds (id, room_id, bed_number, status)
            SELECT $1, r.id, $3, $4 FROM rooms r WHERE r.id = $2
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(bed.room_id)
        .bind(bed.bed_number.trim())
        .bind(BedStatus::Available.as_str())
        .fetch_optional(self.pool.pool())
        .await?
        .ok_or_else(|| HospitalError::not_found("room not found"))?;
        Ok(row.into())
    }

    async fn lock_bed(conn: &mut PgConnection, id: Uuid) -> Result<Bed> {
        sqlx::query_as::<_, DbBed>("SELECT * FROM beds WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .map(Bed::from)
            .ok_or_else(|| HospitalError::not_found("bed not found"))
    }

    async fn set_bed_status(conn: &mut PgConnection, id: Uuid, status: BedStatus) -> Result<()> {
        sqlx::query("UPDATE beds SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// 手动切换床位状态（可用/维修）；占用状态只能由入院、转床和出院改变
    pub async fn update_bed_status(&self, id: Uuid, status: BedStatus) -> Result<Bed> {
        if status == BedStatus::Occupied {
            return Err(HospitalError::validation("beds become OCCUPIED only through admission"));
        }

        let mut tx = self.pool.pool().begin().await?;
        let bed = Self::lock_bed(&mut tx, id).await?;
        if bed.status == BedStatus::Occupied {
            return Err(HospitalError::validation("cannot change status of an occupied bed"));
        }

        Self::set_bed_status(&mut tx, id, status).await?;
        tx.commit().await?;

        tracing::info!(bed_id = %id, from = %bed.status, to = %status, "Bed status changed");
        Ok(Bed { status, ..bed })
    }

    /// 床位图：科室 → 病房 → 床位，占用床位附带患者
    pub async fn bed_map(&self) -> Result<Vec<BedMapDepartment>> {
        let rows = sqlx::query_as::<_, DbBedMapRow>(
            r#"
            SELECT d.id AS department_id, d.name AS department_name,
                   r.id AS room_id, r.room_number, r.room_type, r.price_per_day,
                   b.id AS bed_id, b.bed_number, b.status AS bed_status,
                   ir.id AS inpatient_id, p.full_name AS patient_name
            FROM departments d
            LEFT JOIN rooms r ON r.department_id = d.id
            LEFT JOIN beds b ON b.room_id = r.id
            LEFT JOIN bed_allocations ba ON ba.bed_id = b.id AND ba.check_out_time IS NULL
            LEFT JOIN inpatient_records ir ON ir.id = ba.inpatient_id
            LEFT JOIN patients p ON p.id = ir.patient_id
            ORDER BY d.name, r.room_number, b.bed_number
            "#,
        )
        .fetch_all(self.pool.pool())
        .await?;

        Ok(group_bed_map(rows))
    }

    // ========== 住院流程 ==========

    async fn lock_active_record(conn: &mut PgConnection, id: Uuid) -> Result<InpatientRecord> {
        let record = sqlx::query_as::<_, DbInpatientRecord>(
            "SELECT * FROM inpatient_records WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .map(InpatientRecord::from)
        .ok_or_else(|| HospitalError::not_found("inpatient record not found"))?;

        if record.status != InpatientStatus::Active {
            return Err(HospitalError::validation("inpatient record is not active"));
        }
        Ok(record)
    }

    /// 锁定床位并校验可用，返回病房当前日价
    async fn claim_bed(conn: &mut PgConnection, bed_id: Uuid) -> Result<Decimal> {
        let bed = Self::lock_bed(conn, bed_id).await?;
        if bed.status != BedStatus::Available {
            return Err(HospitalError::Validation(format!(
                "bed {} is not available ({})",
                bed.bed_number, bed.status
            )));
        }

        let price: Decimal = sqlx::query_scalar("SELECT price_per_day FROM rooms WHERE id = $1")
            .bind(bed.room_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(price)
    }

    async fn open_allocation(
        conn: &mut PgConnection,
        inpatient_id: Uuid,
        bed_id: Uuid,
        price_per_day: Decimal,
        now: DateTime<Utc>,
    ) -> Result<BedAllocation> {
        let allocation = sqlx::query_as::<_, BedAllocation>(
            r#"
            INSERT INTO bed_allocations (id, inpatient_id, bed_id, price_per_day, check_in_time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(inpatient_id)
        .bind(bed_id)
        .bind(price_per_day)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        Self::set_bed_status(conn, bed_id, BedStatus::Occupied).await?;
        Ok(allocation)
    }

    /// 关闭当前占用并释放床位，返回被关闭的占用
    async fn close_allocation(
        conn: &mut PgConnection,
        inpatient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<BedAllocation> {
        let allocation = sqlx::query_as::<_, BedAllocation>(
            r#"
            UPDATE bed_allocations SET check_out_time = $2
            WHERE inpatient_id = $1 AND check_out_time IS NULL
            RETURNING *
            "#,
        )
        .bind(inpatient_id)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| HospitalError::Internal("active inpatient has no open bed".to_string()))?;

        Self::set_bed_status(conn, allocation.bed_id, BedStatus::Available).await?;
        Ok(allocation)
    }

    /// 入院：建立住院记录并占用床位
    pub async fn admit_patient(&self, admit: &AdmitPatient, now: DateTime<Utc>) -> Result<InpatientRecord> {
        self.require_patient(admit.patient_id).await?;
        let mut tx = self.pool.pool().begin().await?;

        let already_admitted: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM inpatient_records WHERE patient_id = $1 AND status = 'ACTIVE')",
        )
        .bind(admit.patient_id)
        .fetch_one(&mut *tx)
        .await?;
        if already_admitted {
            return Err(HospitalError::validation("patient is already admitted"));
        }

        let price = Self::claim_bed(&mut tx, admit.bed_id).await?;

        let record = sqlx::query_as::<_, DbInpatientRecord>(
            r#"
            INSERT INTO inpatient_records (id, patient_id, visit_id, treating_doctor_id, admission_time, initial_diagnosis, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(admit.patient_id)
        .bind(admit.visit_id)
        .bind(admit.treating_doctor_id)
        .bind(now)
        .bind(&admit.initial_diagnosis)
        .bind(InpatientStatus::Active.as_str())
        .fetch_one(&mut *tx)
        .await?;

        Self::open_allocation(&mut tx, record.id, admit.bed_id, price, now).await?;
        tx.commit().await?;

        tracing::info!(
            inpatient_id = %record.id,
            patient_id = %admit.patient_id,
            bed_id = %admit.bed_id,
            "Patient admitted"
        );
        Ok(record.into())
    }

    /// 转床：关闭当前占用、释放原床位，按新病房现价开新占用
    pub async fn transfer_bed(
        &self,
        inpatient_id: Uuid,
        new_bed_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<BedAllocation> {
        let mut tx = self.pool.pool().begin().await?;
        Self::lock_active_record(&mut tx, inpatient_id).await?;

        let current_bed: Option<Uuid> = sqlx::query_scalar(
            "SELECT bed_id FROM bed_allocations WHERE inpatient_id = $1 AND check_out_time IS NULL",
        )
        .bind(inpatient_id)
        .fetch_optional(&mut *tx)
        .await?;
        if current_bed == Some(new_bed_id) {
            return Err(HospitalError::validation("patient is already in this bed"));
        }

        let price = Self::claim_bed(&mut tx, new_bed_id).await?;
        let closed = Self::close_allocation(&mut tx, inpatient_id, now).await?;
        let opened = Self::open_allocation(&mut tx, inpatient_id, new_bed_id, price, now).await?;

        tx.commit().await?;
        tracing::info!(
            inpatient_id = %inpatient_id,
            from_bed = %closed.bed_id,
            to_bed = %new_bed_id,
            "Bed transferred"
        );
        Ok(opened)
    }

    /// 出院：关闭占用、释放床位、记录出院小结
    pub async fn discharge_patient(
        &self,
        inpatient_id: Uuid,
        discharge_summary: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<DischargeResult> {
        let mut tx = self.pool.pool().begin().await?;
        Self::lock_active_record(&mut tx, inpatient_id).await?;

        let closed = Self::close_allocation(&mut tx, inpatient_id, now).await?;

        let record = sqlx::query_as::<_, DbInpatientRecord>(
            r#"
            UPDATE inpatient_records
            SET status = $2, discharge_time = $3, discharge_summary = COALESCE($4, discharge_summary)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(inpatient_id)
        .bind(InpatientStatus::Discharged.as_str())
        .bind(now)
        .bind(discharge_summary)
        .fetch_one(&mut *tx)
        .await?;

        let lines = Self::bed_history(&mut tx, inpatient_id, now).await?;
        tx.commit().await?;

        let bed_fee = BedFeeSummary::from_lines(lines);
        tracing::info!(
            inpatient_id = %inpatient_id,
            bed_fee = %bed_fee.bed_fee_total,
            "Patient discharged"
        );
        Ok(DischargeResult {
            record: record.into(),
            released_bed_id: closed.bed_id,
            bed_fee,
        })
    }

    /// 床位占用历史及费用
    async fn bed_history(
        conn: &mut PgConnection,
        inpatient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<BedFeeLine>> {
        let rows = sqlx::query_as::<_, DbAllocationRow>(
            r#"
            SELECT ba.*, b.bed_number, r.room_number
            FROM bed_allocations ba
            JOIN beds b ON b.id = ba.bed_id
            JOIN rooms r ON r.id = b.room_id
            WHERE ba.inpatient_id = $1
            ORDER BY ba.check_in_time
            "#,
        )
        .bind(inpatient_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| BedFeeLine::new(&row.allocation, row.bed_number, row.room_number, now))
            .collect())
    }

    pub async fn add_daily_order(
        &self,
        inpatient_id: Uuid,
        author_id: Uuid,
        order: &NewDailyOrder,
    ) -> Result<DailyOrder> {
        if order.progress_note.trim().is_empty() {
            return Err(HospitalError::validation("progress_note is required"));
        }

        let mut tx = self.pool.pool().begin().await?;
        Self::lock_active_record(&mut tx, inpatient_id).await?;

        let row = sqlx::query_as::<_, DailyOrder>(
            r#"
            INSERT INTO daily_orders (id, inpatient_id, author_id, progress_note, doctor_instruction, nurse_notes, vitals)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(inpatient_id)
        .bind(author_id)
        .bind(order.progress_note.trim())
        .bind(&order.doctor_instruction)
        .bind(&order.nurse_notes)
        .bind(&order.vitals)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }

    /// 在院患者列表
    pub async fn list_active_inpatients(&self) -> Result<Vec<InpatientSummary>> {
        let results = sqlx::query_as::<_, InpatientSummary>(
            r#"
            SELECT ir.id, ir.patient_id, p.full_name AS patient_name, ir.admission_time,
                   ir.initial_diagnosis, b.id AS bed_id, b.bed_number, r.room_number,
                   d.name AS department_name
            FROM inpatient_records ir
            JOIN patients p ON p.id = ir.patient_id
            LEFT JOIN bed_allocations ba ON ba.inpatient_id = ir.id AND ba.check_out_time IS NULL
            LEFT JOIN beds b ON b.id = ba.bed_id
            LEFT JOIN rooms r ON r.id = b.room_id
            LEFT JOIN departments d ON d.id = r.department_id
            WHERE ir.status = 'ACTIVE'
            ORDER BY ir.admission_time
            "#,
        )
        .fetch_all(self.pool.pool())
        .await?;
        Ok(results)
    }

    pub async fn count_active_inpatients(&self) -> Result<i64> {
        let count =
            sqlx::query_scalar("SELECT COUNT(*) FROM inpatient_records WHERE status = 'ACTIVE'")
                .fetch_one(self.pool.pool())
                .await?;
        Ok(count)
    }

    async fn get_inpatient_record(&self, id: Uuid) -> Result<InpatientRecord> {
        sqlx::query_as::<_, DbInpatientRecord>("SELECT * FROM inpatient_records WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?
            .map(InpatientRecord::from)
            .ok_or_else(|| HospitalError::not_found("inpatient record not found"))
    }

    /// 住院详情：患者信息、床位历史与费用、每日医嘱
    pub async fn inpatient_detail(&self, id: Uuid, now: DateTime<Utc>) -> Result<InpatientDetail> {
        let record = self.get_inpatient_record(id).await?;

        let patient = sqlx::query_as::<_, DbPatient>("SELECT * FROM patients WHERE id = $1")
            .bind(record.patient_id)
            .fetch_one(self.pool.pool())
            .await?
            .into();

        let mut conn = self.pool.pool().acquire().await?;
        let bed_history = Self::bed_history(&mut conn, id, now).await?;
        let bed_fee_total = bed_history.iter().map(|l| l.total_price).sum();

        let daily_orders = sqlx::query_as::<_, DailyOrder>(
            "SELECT * FROM daily_orders WHERE inpatient_id = $1 ORDER BY order_date DESC",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(InpatientDetail {
            record,
            patient,
            bed_history,
            bed_fee_total,
            daily_orders,
        })
    }

    /// 住院费用预览：床位费加上关联门诊的药品与服务
    pub async fn inpatient_bill(
        &self,
        id: Uuid,
        insurance_percent: i32,
        now: DateTime<Utc>,
    ) -> Result<InpatientBill> {
        let record = self.get_inpatient_record(id).await?;
        let mut conn = self.pool.pool().acquire().await?;

        let patient_name: String =
            sqlx::query_scalar("SELECT full_name FROM patients WHERE id = $1")
                .bind(record.patient_id)
                .fetch_one(&mut *conn)
                .await?;

        let bed_details = Self::bed_history(&mut conn, id, now).await?;
        let summary = BedFeeSummary::from_lines(bed_details);

        let (medicine_lines, service_lines) = match record.visit_id {
            Some(visit_id) => visit_bill_lines(&mut conn, visit_id).await?,
            None => (Vec::new(), Vec::new()),
        };

        let bill = BillingInput {
            medicine_lines,
            service_lines,
            bed_fee: summary.bed_fee_total,
            exam_fee: Decimal::ZERO,
            procedure_fee: Decimal::ZERO,
            insurance_percent,
        }
        .compute()?;

        Ok(InpatientBill {
            inpatient_id: id,
            patient_name,
            bed_details: summary.lines,
            bill,
        })
    }
}

/// 把扁平的连接查询结果整理成 科室 → 病房 → 床位
fn group_bed_map(rows: Vec<DbBedMapRow>) -> Vec<BedMapDepartment> {
    let mut departments: Vec<BedMapDepartment> = Vec::new();

    for row in rows {
        if departments.last().map(|d| d.department_id) != Some(row.department_id) {
            departments.push(BedMapDepartment {
                department_id: row.department_id,
                department_name: row.department_name.clone(),
                rooms: Vec::new(),
            });
        }
        let Some(department) = departments.last_mut() else {
            continue;
        };

        let (Some(room_id), Some(room_number)) = (row.room_id, row.room_number) else {
            continue;
        };
        if department.rooms.last().map(|r| r.room_id) != Some(room_id) {
            department.rooms.push(BedMapRoom {
                room_id,
                room_number,
                room_type: row.room_type.unwrap_or_default(),
                price_per_day: row.price_per_day.unwrap_or_default(),
                beds: Vec::new(),
            });
        }
        let Some(room) = department.rooms.last_mut() else {
            continue;
        };

        if let (Some(bed_id), Some(bed_number)) = (row.bed_id, row.bed_number) {
            room.beds.push(BedMapEntry {
                bed_id,
                bed_number,
                status: row
                    .bed_status
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(BedStatus::Maintenance),
                inpatient_id: row.inpatient_id,
                patient_name: row.patient_name,
            });
        }
    }

    departments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{self, bed_status, test_pool};
    use chrono::Duration;

    fn row(dept: Uuid, room: Option<Uuid>, bed: Option<(&str, &str)>) -> DbBedMapRow {
        DbBedMapRow {
            department_id: dept,
            department_name: "Nội tổng hợp".to_string(),
            room_id: room,
            room_number: room.map(|_| "101".to_string()),
            room_type: room.map(|_| "STANDARD".to_string()),
            price_per_day: room.map(|_| Decimal::from(300_000)),
            bed_id: bed.map(|_| Uuid::new_v4()),
            bed_number: bed.map(|(n, _)| n.to_string()),
            bed_status: bed.map(|(_, s)| s.to_string()),
            inpatient_id: None,
            patient_name: None,
        }
    }

    #[test]
    fn test_group_bed_map() {
        let d1 = Uuid::new_v4();
        let d2 = Uuid::new_v4();
        let r1 = Uuid::new_v4();

        let map = group_bed_map(vec![
            row(d1, Some(r1), Some(("B01", "AVAILABLE"))),
            row(d1, Some(r1), Some(("B02", "OCCUPIED"))),
            row(d2, None, None),
        ]);

        assert_eq!(map.len(), 2);
        assert_eq!(map[0].rooms.len(), 1);
        assert_eq!(map[0].rooms[0].beds.len(), 2);
        assert_eq!(map[0].rooms[0].beds[1].status, BedStatus::Occupied);
        assert!(map[1].rooms.is_empty());
    }

    #[test]
    fn test_room_without_beds() {
        let d1 = Uuid::new_v4();
        let map = group_bed_map(vec![row(d1, Some(Uuid::new_v4()), None)]);
        assert_eq!(map[0].rooms.len(), 1);
        assert!(map[0].rooms[0].beds.is_empty());
    }

    async fn open_allocations(pool: &crate::DatabasePool, inpatient_id: Uuid) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM bed_allocations WHERE inpatient_id = $1 AND check_out_time IS NULL",
        )
        .bind(inpatient_id)
        .fetch_one(pool.pool())
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_admit_transfer_discharge_keeps_beds_consistent() {
        let Some(pool) = test_pool().await else { return };
        let queries = DatabaseQueries::new(&pool);

        let beds = test_support::ward(&queries, 300_000, 2).await;
        let (bed_a, bed_b) = (beds[0].id, beds[1].id);
        let patient = test_support::patient(&queries).await;
        let admitted_at = Utc::now() - Duration::days(3);

        let record = queries
            .admit_patient(
                &AdmitPatient {
                    patient_id: patient.id,
                    bed_id: bed_a,
                    visit_id: None,
                    treating_doctor_id: None,
                    initial_diagnosis: Some("Viêm phổi".to_string()),
                },
                admitted_at,
            )
            .await
            .unwrap();
        assert_eq!(bed_status(&pool, bed_a).await, "OCCUPIED");
        assert_eq!(open_allocations(&pool, record.id).await, 1);

        let allocation = queries
            .transfer_bed(record.id, bed_b, admitted_at + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(allocation.bed_id, bed_b);
        assert_eq!(bed_status(&pool, bed_a).await, "AVAILABLE");
        assert_eq!(bed_status(&pool, bed_b).await, "OCCUPIED");
        assert_eq!(open_allocations(&pool, record.id).await, 1);

        let result = queries
            .discharge_patient(record.id, Some("Ổn định"), admitted_at + Duration::days(3))
            .await
            .unwrap();
        assert_eq!(result.released_bed_id, bed_b);
        assert_eq!(result.record.status, InpatientStatus::Discharged);
        assert_eq!(bed_status(&pool, bed_b).await, "AVAILABLE");
        assert_eq!(open_allocations(&pool, record.id).await, 0);

        let again = queries.discharge_patient(record.id, None, Utc::now()).await;
        assert!(again.is_err());
    }

    #[tokio::test]
    async fn test_occupied_bed_cannot_be_claimed_twice() {
        let Some(pool) = test_pool().await else { return };
        let queries = DatabaseQueries::new(&pool);

        let beds = test_support::ward(&queries, 250_000, 1).await;
        let first = test_support::patient(&queries).await;
        let second = test_support::patient(&queries).await;
        let admit = |patient_id| AdmitPatient {
            patient_id,
            bed_id: beds[0].id,
            visit_id: None,
            treating_doctor_id: None,
            initial_diagnosis: None,
        };

        queries.admit_patient(&admit(first.id), Utc::now()).await.unwrap();
        assert!(queries.admit_patient(&admit(second.id), Utc::now()).await.is_err());
    }

    #[tokio::test]
    async fn test_admit_with_unknown_visit_is_rejected() {
        let Some(pool) = test_pool().await else { return };
        let queries = DatabaseQueries::new(&pool);

        let beds = test_support::ward(&queries, 300_000, 1).await;
        let patient = test_support::patient(&queries).await;

        let err = queries
            .admit_patient(
                &AdmitPatient {
                    patient_id: patient.id,
                    bed_id: beds[0].id,
                    visit_id: Some(Uuid::new_v4()),
                    treating_doctor_id: None,
                    initial_diagnosis: None,
                },
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HospitalError::Validation(_)), "{:?}", err);

        // 事务回滚，床位仍空闲
        assert_eq!(bed_status(&pool, beds[0].id).await, "AVAILABLE");
    }
}
