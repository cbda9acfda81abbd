//! 收费计算
//!
//! 账单由药品、检验服务、床位费、诊查费和手术/操作费汇总，再按医保比例折扣。
//! 预览时每次重新计算，只有开具发票时才落库。

use hospital_core::{HospitalError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 账单明细行
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillLine {
    pub item_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

impl BillLine {
    pub fn new(item_id: Uuid, name: impl Into<String>, quantity: i32, unit_price: Decimal) -> Self {
        Self {
            item_id,
            name: name.into(),
            quantity,
            unit_price,
            total: unit_price * Decimal::from(quantity),
        }
    }
}

/// 账单计算输入
#[derive(Debug, Clone, Default)]
pub struct BillingInput {
    pub medicine_lines: Vec<BillLine>,
    pub service_lines: Vec<BillLine>,
    pub bed_fee: Decimal,
    pub exam_fee: Decimal,
    pub procedure_fee: Decimal,
    pub insurance_percent: i32,
}

/// 账单预览
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillPreview {
    pub medicine_details: Vec<BillLine>,
    pub service_details: Vec<BillLine>,
    pub medicine_total: Decimal,
    pub service_total: Decimal,
    pub bed_fee: Decimal,
    pub exam_fee: Decimal,
    pub procedure_fee: Decimal,
    pub sub_total: Decimal,
    pub insurance_percent: i32,
    pub discount: Decimal,
    pub final_amount: Decimal,
}

/// 校验医保比例
pub fn validate_insurance_percent(percent: i32) -> Result<()> {
    if !(0..=100).contains(&percent) {
        return Err(HospitalError::Validation(format!(
            "insurance_percent must be between 0 and 100, got {}",
            percent
        )));
    }
    Ok(())
}

/// 按医保比例计算折扣额（保留两位小数）
pub fn insurance_discount(sub_total: Decimal, insurance_percent: i32) -> Decimal {
    (sub_total * Decimal::from(insurance_percent) / Decimal::from(100)).round_dp(2)
}

impl BillingInput {
    /// 计算账单
    pub fn compute(self) -> Result<BillPreview> {
        validate_insurance_percent(self.insurance_percent)?;
        if self.procedure_fee.is_sign_negative() {
            return Err(HospitalError::validation("procedure_fee must not be negative"));
        }
        if self.exam_fee.is_sign_negative() || self.bed_fee.is_sign_negative() {
            return Err(HospitalError::validation("fees must not be negative"));
        }

        let medicine_total: Decimal = self.medicine_lines.iter().map(|l| l.total).sum();
        let service_total: Decimal = self.service_lines.iter().map(|l| l.total).sum();

        let sub_total =
            medicine_total + service_total + self.bed_fee + self.exam_fee + self.procedure_fee;
        let discount = insurance_discount(sub_total, self.insurance_percent);
        let final_amount = sub_total - discount;

        Ok(BillPreview {
            medicine_details: self.medicine_lines,
            service_details: self.service_lines,
            medicine_total,
            service_total,
            bed_fee: self.bed_fee,
            exam_fee: self.exam_fee,
            procedure_fee: self.procedure_fee,
            sub_total,
            insurance_percent: self.insurance_percent,
            discount,
            final_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vnd(amount: i64) -> Decimal {
        Decimal::from(amount)
    }

    #[test]
    fn test_bill_sums_all_sources() {
        let input = BillingInput {
            medicine_lines: vec![
                BillLine::new(Uuid::new_v4(), "Paracetamol", 10, vnd(2_000)),
                BillLine::new(Uuid::new_v4(), "Amoxicillin", 2, vnd(15_500)),
            ],
            service_lines: vec![BillLine::new(Uuid::new_v4(), "X-Quang phổi", 1, vnd(120_000))],
            exam_fee: vnd(50_000),
            procedure_fee: vnd(30_000),
            ..Default::default()
        };

        let bill = input.compute().unwrap();
        assert_eq!(bill.medicine_total, vnd(51_000));
        assert_eq!(bill.service_total, vnd(120_000));
        assert_eq!(bill.sub_total, vnd(251_000));
        assert_eq!(bill.discount, Decimal::ZERO);
        assert_eq!(bill.final_amount, vnd(251_000));
    }

    #[test]
    fn test_insurance_discount_applied() {
        let input = BillingInput {
            medicine_lines: vec![BillLine::new(Uuid::new_v4(), "Vitamin C", 3, vnd(10_000))],
            exam_fee: vnd(50_000),
            insurance_percent: 80,
            ..Default::default()
        };

        let bill = input.compute().unwrap();
        assert_eq!(bill.sub_total, vnd(80_000));
        assert_eq!(bill.discount, vnd(64_000));
        // final_amount = sub_total × (1 − insurance_percent/100)
        let expected = bill.sub_total * (Decimal::ONE - Decimal::from(80) / Decimal::from(100));
        assert_eq!(bill.final_amount, expected);
    }

    #[test]
    fn test_fractional_discount_is_rounded() {
        let input = BillingInput {
            procedure_fee: Decimal::new(3333, 2), // 33.33
            insurance_percent: 33,
            ..Default::default()
        };

        let bill = input.compute().unwrap();
        assert_eq!(bill.discount, Decimal::new(1100, 2));
        assert_eq!(bill.final_amount, Decimal::new(2233, 2));
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let input = BillingInput { insurance_percent: 101, ..Default::default() };
        assert!(matches!(input.compute(), Err(HospitalError::Validation(_))));

        let input = BillingInput { insurance_percent: -5, ..Default::default() };
        assert!(input.compute().is_err());

        let input = BillingInput { procedure_fee: vnd(-1), ..Default::default() };
        assert!(input.compute().is_err());
    }

    #[test]
    fn test_full_coverage_is_free() {
        let input = BillingInput {
            exam_fee: vnd(50_000),
            bed_fee: vnd(1_500_000),
            insurance_percent: 100,
            ..Default::default()
        };

        let bill = input.compute().unwrap();
        assert_eq!(bill.final_amount, Decimal::ZERO);
    }
}
