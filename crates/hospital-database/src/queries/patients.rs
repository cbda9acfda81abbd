use super::DatabaseQueries;
use crate::models::*;
use hospital_core::{HospitalError, Patient, Result};
use sqlx::PgConnection;
use uuid::Uuid;

/// 患者列表上限
const PATIENT_LIST_LIMIT: i64 = 200;

impl<'a> DatabaseQueries<'a> {
    // ========== 患者相关操作 ==========

    /// 医保卡号或身份证号已被其他在册患者使用时拒绝
    async fn ensure_unique_identity(
        conn: &mut PgConnection,
        insurance_card: Option<&str>,
        cccd: Option<&str>,
        exclude: Option<Uuid>,
    ) -> Result<()> {
        if let Some(card) = insurance_card {
            let taken: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM patients
                    WHERE insurance_card = $1 AND deleted_at IS NULL
                      AND ($2::uuid IS NULL OR id <> $2)
                )
                "#,
            )
            .bind(card)
            .bind(exclude)
            .fetch_one(&mut *conn)
            .await?;
            if taken {
                return Err(HospitalError::validation("insurance card already exists"));
            }
        }

        if let Some(cccd) = cccd {
            let taken: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM patients
                    WHERE cccd = $1 AND deleted_at IS NULL
                      AND ($2::uuid IS NULL OR id <> $2)
                )
                "#,
            )
            .bind(cccd)
            .bind(exclude)
            .fetch_one(&mut *conn)
            .await?;
            if taken {
                return Err(HospitalError::validation("cccd already exists"));
            }
        }
        Ok(())
    }

    /// 创建新患者
    pub async fn create_patient(&self, patient: &NewPatient) -> Result<Patient> {
        let mut conn = self.pool.pool().acquire().await?;

        Self::ensure_unique_identity(
            &mut conn,
            patient.insurance_card.as_deref(),
            patient.cccd.as_deref(),
            None,
        )
        .await?;

        let row = sqlx::query_as::<_, DbPatient>(
            r#"
            INSERT INTO patients (
                id, full_name, dob, gender, phone, email, cccd, insurance_card, address,
                emergency_contact, blood_type, height, weight, allergies, medical_history
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&patient.full_name)
        .bind(patient.dob)
        .bind(patient.gender.as_str())
        .bind(&patient.phone)
        .bind(&patient.email)
        .bind(&patient.cccd)
        .bind(&patient.insurance_card)
        .bind(&patient.address)
        .bind(&patient.emergency_contact)
        .bind(&patient.blood_type)
        .bind(patient.height)
        .bind(patient.weight)
        .bind(&patient.allergies)
        .bind(&patient.medical_history)
        .fetch_one(&mut *conn)
        .await?;

        tracing::info!(patient_id = %row.id, "Patient registered");
        Ok(row.into())
    }

    /// 按姓名、医保卡号、身份证号或电话模糊搜索（不区分大小写）
    pub async fn search_patients(&self, search: Option<&str>) -> Result<Vec<Patient>> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let results = sqlx::query_as::<_, DbPatient>(
            r#"
            SELECT * FROM patients
            WHERE deleted_at IS NULL
              AND ($1::text IS NULL
                   OR full_name ILIKE $1
                   OR insurance_card ILIKE $1
                   OR cccd ILIKE $1
                   OR phone ILIKE $1)
            ORDER BY updated_at DESC
            LIMIT $2
            "#,
        )
        .bind(pattern)
        .bind(PATIENT_LIST_LIMIT)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(results.into_iter().map(Patient::from).collect())
    }

    /// 根据ID查找在册患者
    pub async fn get_patient(&self, id: Uuid) -> Result<Option<Patient>> {
        let result = sqlx::query_as::<_, DbPatient>(
            "SELECT * FROM patients WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(result.map(Patient::from))
    }

    pub async fn require_patient(&self, id: Uuid) -> Result<Patient> {
        self.get_patient(id)
            .await?
            .ok_or_else(|| HospitalError::not_found("patient not found"))
    }

    /// 更新患者信息
    pub async fn update_patient(&self, id: Uuid, update: &PatientUpdate) -> Result<Patient> {
        let mut conn = self.pool.pool().acquire().await?;

        Self::ensure_unique_identity(
            &mut conn,
            update.insurance_card.as_deref(),
            update.cccd.as_deref(),
            Some(id),
        )
        .await?;

        let row = sqlx::query_as::<_, DbPatient>(
            r#"
            UPDATE patients SET
                full_name = COALESCE($2, full_name),
                dob = COALESCE($3, dob),
                gender = COALESCE($4, gender),
                phone = COALESCE($5, phone),
                email = COALESCE($6, email),
                cccd = COALESCE($7, cccd),
                insurance_card = COALESCE($8, insurance_card),
                address = COALESCE($9, address),
                emergency_contact = COALESCE($10, emergency_contact),
                blood_type = COALESCE($11, blood_type),
                height = COALESCE($12, height),
                weight = COALESCE($13, weight),
                allergies = COALESCE($14, allergies),
                medical_history = COALESCE($15, medical_history),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.full_name.as_deref().map(str::trim))
        .bind(update.dob)
        .bind(update.gender.map(|g| g.as_str()))
        .bind(&update.phone)
        .bind(&update.email)
        .bind(&update.cccd)
        .bind(&update.insurance_card)
        .bind(&update.address)
        .bind(&update.emergency_contact)
        .bind(&update.blood_type)
        .bind(update.height)
        .bind(update.weight)
        .bind(&update.allergies)
        .bind(&update.medical_history)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| HospitalError::not_found("patient not found"))?;

        Ok(row.into())
    }

    /// 软删除患者，历史记录保留
    pub async fn soft_delete_patient(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE patients SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(HospitalError::not_found("patient not found"));
        }
        tracing::info!(patient_id = %id, "Patient soft-deleted");
        Ok(())
    }

    /// 患者就诊历史，最近的就诊在前
    pub async fn patient_history(&self, id: Uuid) -> Result<PatientHistory> {
        let patient = self.require_patient(id).await?;

        let visits = self.list_visits_for_patient(id).await?;
        let visit_ids: Vec<Uuid> = visits.iter().map(|v| v.id).collect();
        let mut prescriptions = self.prescriptions_for_visits(&visit_ids).await?;

        let visits = visits
            .into_iter()
            .map(|visit| {
                let (mine, rest): (Vec<_>, Vec<_>) =
                    prescriptions.drain(..).partition(|p| p.visit_id == visit.id);
                prescriptions = rest;
                VisitWithPrescriptions { visit, prescriptions: mine }
            })
            .collect();

        Ok(PatientHistory { patient, visits })
    }
}
