use super::DatabaseQueries;
use crate::models::*;
use hospital_core::{HospitalError, Result, Visit, VisitStatus};
use hospital_workflow::{StateMachine, VisitEvent};
use sqlx::PgConnection;
use uuid::Uuid;

impl<'a> DatabaseQueries<'a> {
    // ========== 就诊相关操作 ==========

    /// 锁定就诊行，供事务内的状态变更使用
    pub(crate) async fn lock_visit(conn: &mut PgConnection, id: Uuid) -> Result<Visit> {
        sqlx::query_as::<_, DbVisit>("SELECT * FROM visits WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .map(Visit::from)
            .ok_or_else(|| HospitalError::not_found("visit not found"))
    }

    /// 分诊登记，新就诊为 WAITING
    pub async fn create_visit(&self, visit: &NewVisit) -> Result<Visit> {
        self.require_patient(visit.patient_id).await?;

        let row = sqlx::query_as::<_, DbVisit>(
            r#"
            INSERT INTO visits (
                id, patient_id, doctor_id, status, priority, chief_complaint,
                pulse, temperature, blood_pressure, respiratory_rate
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(visit.patient_id)
        .bind(visit.doctor_id)
        .bind(VisitStatus::Waiting.as_str())
        .bind(visit.priority.as_str())
        .bind(&visit.chief_complaint)
        .bind(visit.pulse)
        .bind(visit.temperature)
        .bind(&visit.blood_pressure)
        .bind(visit.respiratory_rate)
        .fetch_one(self.pool.pool())
        .await?;

        tracing::info!(visit_id = %row.id, priority = %row.priority, "Visit registered");
        Ok(row.into())
    }

    /// 就诊列表；急诊优先，同优先级按登记时间
    pub async fn list_visits(&self, status: Option<VisitStatus>) -> Result<Vec<Visit>> {
        let results = sqlx::query_as::<_, DbVisit>(
            r#"
            SELECT * FROM visits
            WHERE $1::text IS NULL OR status = $1
            ORDER BY CASE priority WHEN 'EMERGENCY' THEN 0 WHEN 'URGENT' THEN 1 ELSE 2 END,
                     visit_date
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(self.pool.pool())
        .await?;

        Ok(results.into_iter().map(Visit::from).collect())
    }

    pub(crate) async fn list_visits_for_patient(&self, patient_id: Uuid) -> Result<Vec<Visit>> {
        let results = sqlx::query_as::<_, DbVisit>(
            "SELECT * FROM visits WHERE patient_id = $1 ORDER BY visit_date DESC",
        )
        .bind(patient_id)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(results.into_iter().map(Visit::from).collect())
    }

    pub async fn get_visit(&self, id: Uuid) -> Result<Option<Visit>> {
        let result = sqlx::query_as::<_, DbVisit>("SELECT * FROM visits WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(result.map(Visit::from))
    }

    pub async fn require_visit(&self, id: Uuid) -> Result<Visit> {
        self.get_visit(id)
            .await?
            .ok_or_else(|| HospitalError::not_found("visit not found"))
    }

    /// 录入诊断：WAITING → IN_PROGRESS，进行中可重复录入
    pub async fn update_diagnosis(&self, id: Uuid, update: &DiagnosisUpdate) -> Result<Visit> {
        if update.diagnosis.trim().is_empty() {
            return Err(HospitalError::validation("diagnosis is required"));
        }

        let mut tx = self.pool.pool().begin().await?;
        let visit = Self::lock_visit(&mut tx, id).await?;
        let next = StateMachine::visit().transition(&visit.status, &VisitEvent::Examine)?;

        let row = sqlx::query_as::<_, DbVisit>(
            r#"
            UPDATE visits SET
                diagnosis = $2,
                clinical_symptoms = COALESCE($3, clinical_symptoms),
                icd10 = COALESCE($4, icd10),
                advice = COALESCE($5, advice),
                follow_up_date = COALESCE($6, follow_up_date),
                status = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.diagnosis.trim())
        .bind(&update.clinical_symptoms)
        .bind(&update.icd10)
        .bind(&update.advice)
        .bind(update.follow_up_date)
        .bind(next.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(visit_id = %id, from = %visit.status, to = %next, "Diagnosis recorded");
        Ok(row.into())
    }

    /// 结束诊疗：IN_PROGRESS → COMPLETED
    pub async fn finish_visit(&self, id: Uuid) -> Result<Visit> {
        let mut tx = self.pool.pool().begin().await?;
        let visit = Self::lock_visit(&mut tx, id).await?;
        let next = StateMachine::visit().transition(&visit.status, &VisitEvent::Finish)?;

        let row = Self::set_visit_status(&mut tx, id, next).await?;
        tx.commit().await?;

        tracing::info!(visit_id = %id, "Visit finished, awaiting payment");
        Ok(row)
    }

    pub(crate) async fn set_visit_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: VisitStatus,
    ) -> Result<Visit> {
        let row = sqlx::query_as::<_, DbVisit>(
            "UPDATE visits SET status = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_one(&mut *conn)
        .await?;
        Ok(row.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{self, test_pool};
    use hospital_core::VisitPriority;

    #[tokio::test]
    async fn test_visit_with_unknown_doctor_is_client_error() {
        let Some(pool) = test_pool().await else { return };
        let queries = DatabaseQueries::new(&pool);
        let patient = test_support::patient(&queries).await;

        let err = queries
            .create_visit(&NewVisit {
                patient_id: patient.id,
                doctor_id: Some(Uuid::new_v4()),
                chief_complaint: None,
                pulse: None,
                temperature: None,
                blood_pressure: None,
                respiratory_rate: None,
                priority: VisitPriority::Normal,
            })
            .await
            .unwrap_err();
        assert!(
            matches!(&err, HospitalError::Validation(msg) if msg.contains("doctor_id")),
            "{:?}",
            err
        );
    }

    #[tokio::test]
    async fn test_new_visit_is_waiting() {
        let Some(pool) = test_pool().await else { return };
        let queries = DatabaseQueries::new(&pool);

        let doctor = test_support::doctor(&queries).await;
        let patient = test_support::patient(&queries).await;
        let visit = test_support::visit(&queries, patient.id, doctor.id).await;

        assert_eq!(visit.status, VisitStatus::Waiting);
        assert_eq!(queries.require_visit(visit.id).await.unwrap().doctor_id, Some(doctor.id));
    }
}
