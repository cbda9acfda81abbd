use super::DatabaseQueries;
use crate::models::*;
use chrono::{Duration, NaiveDate, Utc};
use hospital_core::{
    HospitalError, ImportLine, ImportReceipt, ImportStatus, Medicine, Prescription, Result,
    Supplier, VisitStatus,
};
use hospital_workflow::inventory::{self, InventoryAlert};
use sqlx::PgConnection;
use uuid::Uuid;

const PRESCRIPTION_DETAIL_SELECT: &str = r#"
    SELECT p.id, p.visit_id, p.medicine_id, m.name AS medicine_name, m.unit, m.price,
           p.quantity, p.note, p.dosage_morning, p.dosage_noon, p.dosage_afternoon,
           p.dosage_evening, p.usage_instruction, p.created_at
    FROM prescriptions p
    JOIN medicines m ON m.id = p.medicine_id
"#;

impl<'a> DatabaseQueries<'a> {
    // ========== 药品相关操作 ==========

    pub async fn list_medicines(&self, search: Option<&str>) -> Result<Vec<Medicine>> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let results = sqlx::query_as::<_, Medicine>(
            r#"
            SELECT * FROM medicines
            WHERE $1::text IS NULL OR name ILIKE $1 OR active_ingredient ILIKE $1
            ORDER BY name
            "#,
        )
        .bind(pattern)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(results)
    }

    pub async fn get_medicine(&self, id: Uuid) -> Result<Option<Medicine>> {
        let result = sqlx::query_as::<_, Medicine>("SELECT * FROM medicines WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(result)
    }

    pub async fn create_medicine(&self, medicine: &NewMedicine) -> Result<Medicine> {
        let row = sqlx::query_as::<_, Medicine>(
            r#"
            INSERT INTO medicines (
                id, name, active_ingredient, category, unit, dosage, price, import_price,
                stock_quantity, min_stock, expiry_date, batch_number, manufacturer, usage_instruction
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(medicine.name.trim())
        .bind(&medicine.active_ingredient)
        .bind(&medicine.category)
        .bind(medicine.unit.trim())
        .bind(&medicine.dosage)
        .bind(medicine.price)
        .bind(medicine.import_price)
        .bind(medicine.stock_quantity)
        .bind(medicine.min_stock)
        .bind(medicine.expiry_date)
        .bind(&medicine.batch_number)
        .bind(&medicine.manufacturer)
        .bind(&medicine.usage_instruction)
        .fetch_one(self.pool.pool())
        .await?;

        tracing::info!(medicine_id = %row.id, name = %row.name, "Medicine created");
        Ok(row)
    }

    pub async fn update_medicine(&self, id: Uuid, update: &MedicineUpdate) -> Result<Medicine> {
        sqlx::query_as::<_, Medicine>(
            r#"
            UPDATE medicines SET
                name = COALESCE($2, name),
                active_ingredient = COALESCE($3, active_ingredient),
                category = COALESCE($4, category),
                unit = COALESCE($5, unit),
                dosage = COALESCE($6, dosage),
                price = COALESCE($7, price),
                import_price = COALESCE($8, import_price),
                min_stock = COALESCE($9, min_stock),
                expiry_date = COALESCE($10, expiry_date),
                batch_number = COALESCE($11, batch_number),
                manufacturer = COALESCE($12, manufacturer),
                usage_instruction = COALESCE($13, usage_instruction)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.active_ingredient)
        .bind(&update.category)
        .bind(&update.unit)
        .bind(&update.dosage)
        .bind(update.price)
        .bind(update.import_price)
        .bind(update.min_stock)
        .bind(update.expiry_date)
        .bind(&update.batch_number)
        .bind(&update.manufacturer)
        .bind(&update.usage_instruction)
        .fetch_optional(self.pool.pool())
        .await?
        .ok_or_else(|| HospitalError::not_found("medicine not found"))
    }

    /// 有效期在 today + days 以内的药品（含已过期）
    pub async fn expiring_medicines(&self, today: NaiveDate, days: i64) -> Result<Vec<Medicine>> {
        let results = sqlx::query_as::<_, Medicine>(
            "SELECT * FROM medicines WHERE expiry_date <= $1 ORDER BY expiry_date",
        )
        .bind(today + Duration::days(days))
        .fetch_all(self.pool.pool())
        .await?;
        Ok(results)
    }

    /// 库存预警：临期与低库存
    pub async fn inventory_alerts(&self, today: NaiveDate) -> Result<Vec<InventoryAlert>> {
        let medicines = self.list_medicines(None).await?;
        Ok(inventory::inventory_alerts(&medicines, today))
    }

    // ========== 处方相关操作 ==========

    /// 开具处方并扣减库存
    ///
    /// 就诊与药品行均加锁；扣减语句带 `stock_quantity >= $qty` 条件，
    /// 并发扣减导致库存不足时拒绝而不是写成负数。
    pub async fn create_prescription(&self, pres: &NewPrescription) -> Result<Prescription> {
        let mut tx = self.pool.pool().begin().await?;

        let visit = Self::lock_visit(&mut tx, pres.visit_id).await?;
        if matches!(visit.status, VisitStatus::Completed | VisitStatus::Paid) {
            return Err(HospitalError::Validation(format!(
                "cannot prescribe for a visit in status {}",
                visit.status
            )));
        }

        let medicine = sqlx::query_as::<_, Medicine>(
            "SELECT * FROM medicines WHERE id = $1 FOR UPDATE",
        )
        .bind(pres.medicine_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| HospitalError::not_found("medicine not found"))?;

        inventory::check_stock(medicine.stock_quantity, pres.quantity)?;

        let updated = sqlx::query(
            r#"
            UPDATE medicines SET stock_quantity = stock_quantity - $2
            WHERE id = $1 AND stock_quantity >= $2
            "#,
        )
        .bind(pres.medicine_id)
        .bind(pres.quantity)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(HospitalError::InsufficientStock {
                available: medicine.stock_quantity,
                requested: pres.quantity,
            });
        }

        let prescription = sqlx::query_as::<_, Prescription>(
            r#"
            INSERT INTO prescriptions (
                id, visit_id, medicine_id, quantity, note, dosage_morning, dosage_noon,
                dosage_afternoon, dosage_evening, usage_instruction
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(pres.visit_id)
        .bind(pres.medicine_id)
        .bind(pres.quantity)
        .bind(&pres.note)
        .bind(&pres.dosage_morning)
        .bind(&pres.dosage_noon)
        .bind(&pres.dosage_afternoon)
        .bind(&pres.dosage_evening)
        .bind(&pres.usage_instruction)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            visit_id = %pres.visit_id,
            medicine_id = %pres.medicine_id,
            quantity = pres.quantity,
            remaining = medicine.stock_quantity - pres.quantity,
            "Prescription created"
        );
        Ok(prescription)
    }

    pub async fn list_prescriptions(&self, visit_id: Uuid) -> Result<Vec<PrescriptionDetail>> {
        self.prescriptions_for_visits(&[visit_id]).await
    }

    pub(crate) async fn prescriptions_for_visits(
        &self,
        visit_ids: &[Uuid],
    ) -> Result<Vec<PrescriptionDetail>> {
        if visit_ids.is_empty() {
            return Ok(Vec::new());
        }

        let results = sqlx::query_as::<_, PrescriptionDetail>(&format!(
            "{} WHERE p.visit_id = ANY($1) ORDER BY p.created_at",
            PRESCRIPTION_DETAIL_SELECT
        ))
        .bind(visit_ids)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(results)
    }

    // ========== 供应商与入库 ==========

    pub async fn list_suppliers(&self) -> Result<Vec<Supplier>> {
        let results = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers ORDER BY name")
            .fetch_all(self.pool.pool())
            .await?;
        Ok(results)
    }

    pub async fn create_supplier(&self, supplier: &NewSupplier) -> Result<Supplier> {
        if supplier.name.trim().is_empty() {
            return Err(HospitalError::validation("supplier name is required"));
        }

        let row = sqlx::query_as::<_, Supplier>(
            "INSERT INTO suppliers (id, name, phone, address) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(supplier.name.trim())
        .bind(&supplier.phone)
        .bind(&supplier.address)
        .fetch_one(self.pool.pool())
        .await?;
        Ok(row)
    }

    /// 创建入库单草稿，此时不影响库存
    pub async fn create_import(
        &self,
        receipt: &NewImportReceipt,
        created_by: Uuid,
    ) -> Result<ImportReceipt> {
        receipt.validate()?;
        let mut tx = self.pool.pool().begin().await?;

        let supplier_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM suppliers WHERE id = $1)")
                .bind(receipt.supplier_id)
                .fetch_one(&mut *tx)
                .await?;
        if !supplier_exists {
            return Err(HospitalError::not_found("supplier not found"));
        }

        let header = sqlx::query_as::<_, DbImportReceipt>(
            r#"
            INSERT INTO import_receipts (id, supplier_id, note, status, total_amount, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(receipt.supplier_id)
        .bind(&receipt.note)
        .bind(ImportStatus::Draft.as_str())
        .bind(receipt.total_amount())
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        let mut lines = Vec::with_capacity(receipt.lines.len());
        for line in &receipt.lines {
            let medicine_exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM medicines WHERE id = $1)")
                    .bind(line.medicine_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if !medicine_exists {
                return Err(HospitalError::NotFound(format!(
                    "medicine {} not found",
                    line.medicine_id
                )));
            }

            let inserted = sqlx::query_as::<_, ImportLine>(
                r#"
                INSERT INTO import_lines (id, receipt_id, medicine_id, quantity, import_price, batch_number, expiry_date)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(header.id)
            .bind(line.medicine_id)
            .bind(line.quantity)
            .bind(line.import_price)
            .bind(&line.batch_number)
            .bind(line.expiry_date)
            .fetch_one(&mut *tx)
            .await?;
            lines.push(inserted);
        }

        tx.commit().await?;
        tracing::info!(receipt_id = %header.id, lines = lines.len(), "Import receipt drafted");
        Ok(header.with_lines(lines))
    }

    pub async fn get_import(&self, id: Uuid) -> Result<ImportReceipt> {
        let mut conn = self.pool.pool().acquire().await?;
        let header = sqlx::query_as::<_, DbImportReceipt>(
            "SELECT * FROM import_receipts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| HospitalError::not_found("import receipt not found"))?;

        let lines = Self::import_lines(&mut conn, id).await?;
        Ok(header.with_lines(lines))
    }

    async fn import_lines(conn: &mut PgConnection, receipt_id: Uuid) -> Result<Vec<ImportLine>> {
        let lines = sqlx::query_as::<_, ImportLine>(
            "SELECT * FROM import_lines WHERE receipt_id = $1",
        )
        .bind(receipt_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(lines)
    }

    /// 确认入库：增加库存并更新批号、有效期与进价；每张单据只能确认一次
    pub async fn confirm_import(&self, id: Uuid) -> Result<ImportReceipt> {
        let mut tx = self.pool.pool().begin().await?;

        let header = sqlx::query_as::<_, DbImportReceipt>(
            "SELECT * FROM import_receipts WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| HospitalError::not_found("import receipt not found"))?;

        if header.status.parse::<ImportStatus>()? != ImportStatus::Draft {
            return Err(HospitalError::validation("import receipt already confirmed"));
        }

        let lines = Self::import_lines(&mut tx, id).await?;
        for line in &lines {
            sqlx::query(
                r#"
                UPDATE medicines SET
                    stock_quantity = stock_quantity + $2,
                    import_price = $3,
                    batch_number = COALESCE($4, batch_number),
                    expiry_date = COALESCE($5, expiry_date)
                WHERE id = $1
                "#,
            )
            .bind(line.medicine_id)
            .bind(line.quantity)
            .bind(line.import_price)
            .bind(&line.batch_number)
            .bind(line.expiry_date)
            .execute(&mut *tx)
            .await?;
        }

        let header = sqlx::query_as::<_, DbImportReceipt>(
            r#"
            UPDATE import_receipts SET status = $2, confirmed_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(ImportStatus::Confirmed.as_str())
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(receipt_id = %id, lines = lines.len(), "Import receipt confirmed");
        Ok(header.with_lines(lines))
    }
}

#[cfg(test)]
mod tests {
    use crate::queries::test_support::{self, test_pool};
    use super::*;

    fn prescription(visit_id: Uuid, medicine_id: Uuid, quantity: i32) -> NewPrescription {
        NewPrescription {
            visit_id,
            medicine_id,
            quantity,
            note: None,
            dosage_morning: Some("1".to_string()),
            dosage_noon: None,
            dosage_afternoon: None,
            dosage_evening: Some("1".to_string()),
            usage_instruction: Some("Uống sau ăn".to_string()),
        }
    }

    #[tokio::test]
    async fn test_prescription_deducts_stock_and_rejects_overdraw() {
        let Some(pool) = test_pool().await else { return };
        let queries = DatabaseQueries::new(&pool);

        let doctor = test_support::doctor(&queries).await;
        let patient = test_support::patient(&queries).await;
        let visit = test_support::visit(&queries, patient.id, doctor.id).await;
        let medicine = test_support::medicine(&queries, 10).await;

        queries
            .create_prescription(&prescription(visit.id, medicine.id, 3))
            .await
            .unwrap();
        let stock = queries.get_medicine(medicine.id).await.unwrap().unwrap().stock_quantity;
        assert_eq!(stock, 7);

        let err = queries
            .create_prescription(&prescription(visit.id, medicine.id, 10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HospitalError::InsufficientStock { available: 7, requested: 10 }
        ));

        let stock = queries.get_medicine(medicine.id).await.unwrap().unwrap().stock_quantity;
        assert_eq!(stock, 7);
        assert_eq!(queries.list_prescriptions(visit.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_prescription_for_unknown_medicine() {
        let Some(pool) = test_pool().await else { return };
        let queries = DatabaseQueries::new(&pool);

        let doctor = test_support::doctor(&queries).await;
        let patient = test_support::patient(&queries).await;
        let visit = test_support::visit(&queries, patient.id, doctor.id).await;

        let err = queries
            .create_prescription(&prescription(visit.id, Uuid::new_v4(), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, HospitalError::NotFound(_)));
    }
}
