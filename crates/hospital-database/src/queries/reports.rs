use super::DatabaseQueries;
use crate::models::*;
use hospital_core::{HospitalError, Result};

impl<'a> DatabaseQueries<'a> {
    // ========== 统计报表 ==========

    /// 最近 N 天每日收入，按日期倒序
    pub async fn revenue_by_day(&self, days: i32) -> Result<Vec<RevenueRow>> {
        if days <= 0 {
            return Err(HospitalError::validation("days must be greater than 0"));
        }

        let results = sqlx::query_as::<_, RevenueRow>(
            r#"
            SELECT DATE(payment_time) AS "date",
                   COALESCE(SUM(final_amount), 0) AS revenue,
                   COUNT(*) AS invoice_count
            FROM invoices
            WHERE payment_time >= CURRENT_DATE - ($1 - 1) * INTERVAL '1 day'
            GROUP BY DATE(payment_time)
            ORDER BY "date" DESC
            "#,
        )
        .bind(days)
        .fetch_all(self.pool.pool())
        .await?;
        Ok(results)
    }

    /// 用量最多的药品
    pub async fn top_medicines(&self, limit: i64) -> Result<Vec<TopMedicineRow>> {
        if limit <= 0 {
            return Err(HospitalError::validation("limit must be greater than 0"));
        }

        let results = sqlx::query_as::<_, TopMedicineRow>(
            r#"
            SELECT m.id AS medicine_id, m.name, SUM(p.quantity) AS sold_quantity, m.stock_quantity
            FROM prescriptions p
            JOIN medicines m ON m.id = p.medicine_id
            GROUP BY m.id, m.name, m.stock_quantity
            ORDER BY sold_quantity DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool.pool())
        .await?;
        Ok(results)
    }

    /// 各科室床位占用率
    pub async fn bed_occupancy(&self) -> Result<Vec<OccupancyRow>> {
        let rows = sqlx::query_as::<_, DbOccupancyRow>(
            r#"
            SELECT d.id AS department_id, d.name AS department_name,
                   COUNT(b.id) AS total_beds,
                   COUNT(b.id) FILTER (WHERE b.status = 'OCCUPIED') AS occupied_beds
            FROM departments d
            LEFT JOIN rooms r ON r.department_id = d.id
            LEFT JOIN beds b ON b.room_id = r.id
            GROUP BY d.id, d.name
            ORDER BY d.name
            "#,
        )
        .fetch_all(self.pool.pool())
        .await?;
        Ok(rows.into_iter().map(OccupancyRow::from).collect())
    }

    /// 医生工作量：接诊数、完成数与已收费金额
    pub async fn doctor_performance(&self) -> Result<Vec<DoctorPerformanceRow>> {
        let results = sqlx::query_as::<_, DoctorPerformanceRow>(
            r#"
            SELECT u.id AS doctor_id, u.full_name,
                   COUNT(v.id) AS total_visits,
                   COUNT(v.id) FILTER (WHERE v.status IN ('COMPLETED', 'PAID')) AS completed_visits,
                   COALESCE(SUM(i.final_amount), 0) AS revenue
            FROM users u
            LEFT JOIN visits v ON v.doctor_id = u.id
            LEFT JOIN invoices i ON i.visit_id = v.id
            WHERE u.role = 'DOCTOR'
            GROUP BY u.id, u.full_name
            ORDER BY revenue DESC, total_visits DESC
            "#,
        )
        .fetch_all(self.pool.pool())
        .await?;
        Ok(results)
    }
}
