use super::DatabaseQueries;
use crate::models::*;
use hospital_core::{
    HospitalError, Result, Service, ServiceRequest, ServiceRequestStatus, ServiceResult,
    VisitStatus,
};
use hospital_workflow::{ServiceRequestEvent, StateMachine};
use sqlx::PgConnection;
use uuid::Uuid;

const REQUEST_DETAIL_SELECT: &str = r#"
    SELECT r.*, s.name AS service_name, s.price
    FROM service_requests r
    JOIN services s ON s.id = r.service_id
"#;

impl<'a> DatabaseQueries<'a> {
    // ========== 检验检查服务 ==========

    /// 启用中的服务目录
    pub async fn list_active_services(&self) -> Result<Vec<Service>> {
        let results = sqlx::query_as::<_, DbService>(
            "SELECT * FROM services WHERE is_active ORDER BY service_type, name",
        )
        .fetch_all(self.pool.pool())
        .await?;
        Ok(results.into_iter().map(Service::from).collect())
    }

    pub async fn create_service(&self, service: &NewService) -> Result<Service> {
        if service.name.trim().is_empty() {
            return Err(HospitalError::validation("service name is required"));
        }
        if service.price.is_sign_negative() {
            return Err(HospitalError::validation("price must not be negative"));
        }

        let row = sqlx::query_as::<_, DbService>(
            r#"
            INSERT INTO services (id, name, service_type, price)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(service.name.trim())
        .bind(service.service_type.as_str())
        .bind(service.price)
        .fetch_one(self.pool.pool())
        .await?;

        tracing::info!(service_id = %row.id, name = %row.name, "Service created");
        Ok(row.into())
    }

    /// 医生为就诊开具检验/影像申请
    pub async fn create_service_request(
        &self,
        visit_id: Uuid,
        doctor_id: Uuid,
        req: &NewServiceRequest,
    ) -> Result<ServiceRequestDetail> {
        if req.quantity <= 0 {
            return Err(HospitalError::validation("quantity must be greater than 0"));
        }

        let visit = self.require_visit(visit_id).await?;
        if visit.status == VisitStatus::Paid {
            return Err(HospitalError::validation("cannot order services for a paid visit"));
        }

        let service = sqlx::query_as::<_, DbService>("SELECT * FROM services WHERE id = $1")
            .bind(req.service_id)
            .fetch_optional(self.pool.pool())
            .await?
            .map(Service::from)
            .ok_or_else(|| HospitalError::not_found("service not found"))?;
        if !service.is_active {
            return Err(HospitalError::validation("service is not active"));
        }

        let row = sqlx::query_as::<_, DbServiceRequest>(
            r#"
            INSERT INTO service_requests (id, visit_id, service_id, doctor_id, quantity, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(visit_id)
        .bind(service.id)
        .bind(doctor_id)
        .bind(req.quantity)
        .bind(ServiceRequestStatus::Pending.as_str())
        .fetch_one(self.pool.pool())
        .await?;

        tracing::info!(request_id = %row.id, visit_id = %visit_id, service = %service.name, "Service requested");
        Ok(ServiceRequestDetail {
            request: row.into(),
            service_name: service.name,
            price: service.price,
            result: None,
        })
    }

    /// 就诊的全部服务申请（含结果）
    pub async fn list_visit_services(&self, visit_id: Uuid) -> Result<Vec<ServiceRequestDetail>> {
        let rows = sqlx::query_as::<_, DbServiceRequestDetail>(&format!(
            "{} WHERE r.visit_id = $1 ORDER BY r.created_at",
            REQUEST_DETAIL_SELECT
        ))
        .bind(visit_id)
        .fetch_all(self.pool.pool())
        .await?;

        self.attach_results(rows).await
    }

    /// 技师工作队列，默认 PENDING
    pub async fn list_service_requests(
        &self,
        status: ServiceRequestStatus,
    ) -> Result<Vec<ServiceRequestDetail>> {
        let rows = sqlx::query_as::<_, DbServiceRequestDetail>(&format!(
            "{} WHERE r.status = $1 ORDER BY r.created_at",
            REQUEST_DETAIL_SELECT
        ))
        .bind(status.as_str())
        .fetch_all(self.pool.pool())
        .await?;

        self.attach_results(rows).await
    }

    async fn attach_results(
        &self,
        rows: Vec<DbServiceRequestDetail>,
    ) -> Result<Vec<ServiceRequestDetail>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.request.id).collect();
        let mut results = if ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query_as::<_, ServiceResult>(
                "SELECT * FROM service_results WHERE request_id = ANY($1)",
            )
            .bind(&ids)
            .fetch_all(self.pool.pool())
            .await?
        };

        Ok(rows
            .into_iter()
            .map(|row| {
                let result = results
                    .iter()
                    .position(|r| r.request_id == row.request.id)
                    .map(|i| results.swap_remove(i));
                ServiceRequestDetail {
                    request: row.request.into(),
                    service_name: row.service_name,
                    price: row.price,
                    result,
                }
            })
            .collect())
    }

    async fn lock_service_request(conn: &mut PgConnection, id: Uuid) -> Result<ServiceRequest> {
        sqlx::query_as::<_, DbServiceRequest>(
            "SELECT * FROM service_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .map(ServiceRequest::from)
        .ok_or_else(|| HospitalError::not_found("service request not found"))
    }

    /// 录入结果：PENDING → COMPLETED
    pub async fn record_service_result(
        &self,
        technician_id: Uuid,
        res: &NewServiceResult,
    ) -> Result<ServiceResult> {
        let mut tx = self.pool.pool().begin().await?;

        let request = Self::lock_service_request(&mut tx, res.request_id).await?;
        let next = StateMachine::service_request()
            .transition(&request.status, &ServiceRequestEvent::RecordResult)?;

        let result = sqlx::query_as::<_, ServiceResult>(
            r#"
            INSERT INTO service_results (id, request_id, technician_id, result_data, image_url, conclusion)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(res.request_id)
        .bind(technician_id)
        .bind(&res.result_data)
        .bind(&res.image_url)
        .bind(&res.conclusion)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE service_requests SET status = $2 WHERE id = $1")
            .bind(res.request_id)
            .bind(next.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(request_id = %res.request_id, "Service result recorded");
        Ok(result)
    }

    /// 取消申请：PENDING → CANCELLED，已取消的申请不计费
    pub async fn cancel_service_request(&self, id: Uuid) -> Result<ServiceRequest> {
        let mut tx = self.pool.pool().begin().await?;

        let request = Self::lock_service_request(&mut tx, id).await?;
        let next = StateMachine::service_request()
            .transition(&request.status, &ServiceRequestEvent::Cancel)?;

        let row = sqlx::query_as::<_, DbServiceRequest>(
            "UPDATE service_requests SET status = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(next.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(request_id = %id, "Service request cancelled");
        Ok(row.into())
    }
}
