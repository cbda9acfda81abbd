use super::DatabaseQueries;
use crate::models::*;
use hospital_core::{HospitalError, Invoice, Result};
use hospital_workflow::{BillLine, BillPreview, BillingInput, StateMachine, VisitEvent};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct BillLineRow {
    item_id: Uuid,
    name: String,
    quantity: i32,
    unit_price: Decimal,
}

impl From<BillLineRow> for BillLine {
    fn from(row: BillLineRow) -> Self {
        BillLine::new(row.item_id, row.name, row.quantity, row.unit_price)
    }
}

/// 就诊的药品与服务明细
pub(crate) async fn visit_bill_lines(
    conn: &mut PgConnection,
    visit_id: Uuid,
) -> Result<(Vec<BillLine>, Vec<BillLine>)> {
    let medicine_lines = sqlx::query_as::<_, BillLineRow>(
        r#"
        SELECT m.id AS item_id, m.name, p.quantity, m.price AS unit_price
        FROM prescriptions p
        JOIN medicines m ON m.id = p.medicine_id
        WHERE p.visit_id = $1
        ORDER BY p.created_at
        "#,
    )
    .bind(visit_id)
    .fetch_all(&mut *conn)
    .await?;

    let service_lines = sqlx::query_as::<_, BillLineRow>(
        r#"
        SELECT s.id AS item_id, s.name, r.quantity, s.price AS unit_price
        FROM service_requests r
        JOIN services s ON s.id = r.service_id
        WHERE r.visit_id = $1 AND r.status <> 'CANCELLED'
        ORDER BY r.created_at
        "#,
    )
    .bind(visit_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok((
        medicine_lines.into_iter().map(BillLine::from).collect(),
        service_lines.into_iter().map(BillLine::from).collect(),
    ))
}

impl<'a> DatabaseQueries<'a> {
    // ========== 收费相关操作 ==========

    /// 账单预览，每次调用重新计算，不落库
    pub async fn preview_bill(
        &self,
        visit_id: Uuid,
        exam_fee: Decimal,
        insurance_percent: i32,
        procedure_fee: Decimal,
    ) -> Result<BillPreview> {
        self.require_visit(visit_id).await?;
        let mut conn = self.pool.pool().acquire().await?;

        let (medicine_lines, service_lines) = visit_bill_lines(&mut conn, visit_id).await?;
        BillingInput {
            medicine_lines,
            service_lines,
            bed_fee: Decimal::ZERO,
            exam_fee,
            procedure_fee,
            insurance_percent,
        }
        .compute()
    }

    /// 开具发票：COMPLETED → PAID，每次就诊只能开一张
    pub async fn create_invoice(&self, invoice: &NewInvoice, exam_fee: Decimal) -> Result<Invoice> {
        let mut tx = self.pool.pool().begin().await?;

        let visit = Self::lock_visit(&mut tx, invoice.visit_id).await?;

        let already_billed: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM invoices WHERE visit_id = $1)")
                .bind(invoice.visit_id)
                .fetch_one(&mut *tx)
                .await?;
        if already_billed {
            return Err(HospitalError::Conflict("visit already has an invoice".to_string()));
        }

        let next = StateMachine::visit().transition(&visit.status, &VisitEvent::Pay)?;

        let (medicine_lines, service_lines) = visit_bill_lines(&mut tx, invoice.visit_id).await?;
        let bill = BillingInput {
            medicine_lines,
            service_lines,
            bed_fee: Decimal::ZERO,
            exam_fee,
            procedure_fee: invoice.procedure_fee,
            insurance_percent: invoice.insurance_percent,
        }
        .compute()?;

        let row = sqlx::query_as::<_, DbInvoice>(
            r#"
            INSERT INTO invoices (
                id, visit_id, medicine_total, service_total, exam_fee, procedure_fee,
                sub_total, insurance_percent, discount, final_amount, payment_method
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice.visit_id)
        .bind(bill.medicine_total)
        .bind(bill.service_total)
        .bind(bill.exam_fee)
        .bind(bill.procedure_fee)
        .bind(bill.sub_total)
        .bind(bill.insurance_percent)
        .bind(bill.discount)
        .bind(bill.final_amount)
        .bind(invoice.payment_method.as_str())
        .fetch_one(&mut *tx)
        .await?;

        Self::set_visit_status(&mut tx, invoice.visit_id, next).await?;
        tx.commit().await?;

        tracing::info!(
            visit_id = %invoice.visit_id,
            final_amount = %bill.final_amount,
            method = %invoice.payment_method,
            "Invoice paid"
        );
        Ok(row.into())
    }

    pub async fn get_invoice_by_visit(&self, visit_id: Uuid) -> Result<Option<Invoice>> {
        let result = sqlx::query_as::<_, DbInvoice>("SELECT * FROM invoices WHERE visit_id = $1")
            .bind(visit_id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(result.map(Invoice::from))
    }
}
