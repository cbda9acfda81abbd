//! 库存规则

use chrono::{Duration, NaiveDate};
use hospital_core::{HospitalError, Medicine, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 药品列表中“即将过期”的天数
pub const EXPIRY_WARNING_DAYS: i64 = 30;
/// 库存预警中的过期提前量
pub const EXPIRY_ALERT_DAYS: i64 = 60;

/// 扣减前校验库存，返回扣减后的剩余量
pub fn check_stock(available: i32, requested: i32) -> Result<i32> {
    if requested <= 0 {
        return Err(HospitalError::validation("quantity must be greater than 0"));
    }
    if available < requested {
        return Err(HospitalError::InsufficientStock { available, requested });
    }
    Ok(available - requested)
}

/// 有效期在 today + within_days 之内（含已过期）
pub fn is_expiring(expiry_date: Option<NaiveDate>, today: NaiveDate, within_days: i64) -> bool {
    match expiry_date {
        Some(expiry) => expiry <= today + Duration::days(within_days),
        None => false,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryAlertType {
    Expiry,
    LowStock,
}

/// 库存预警项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryAlert {
    pub medicine_id: Uuid,
    pub name: String,
    pub alert_type: InventoryAlertType,
    pub stock: i32,
    pub min_stock: i32,
    pub expiry_date: Option<NaiveDate>,
}

impl InventoryAlert {
    fn new(medicine: &Medicine, alert_type: InventoryAlertType) -> Self {
        Self {
            medicine_id: medicine.id,
            name: medicine.name.clone(),
            alert_type,
            stock: medicine.stock_quantity,
            min_stock: medicine.min_stock,
            expiry_date: medicine.expiry_date,
        }
    }
}

/// 生成库存预警：60天内过期、低于最低库存
///
/// 同一药品可能同时出现两类预警。
pub fn inventory_alerts(medicines: &[Medicine], today: NaiveDate) -> Vec<InventoryAlert> {
    let mut alerts = Vec::new();
    for medicine in medicines {
        if is_expiring(medicine.expiry_date, today, EXPIRY_ALERT_DAYS) {
            alerts.push(InventoryAlert::new(medicine, InventoryAlertType::Expiry));
        }
        if medicine.stock_quantity < medicine.min_stock {
            alerts.push(InventoryAlert::new(medicine, InventoryAlertType::LowStock));
        }
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn medicine(stock: i32, min_stock: i32, expiry: Option<NaiveDate>) -> Medicine {
        Medicine {
            id: Uuid::new_v4(),
            name: "Paracetamol 500mg".to_string(),
            active_ingredient: None,
            category: None,
            unit: "viên".to_string(),
            dosage: None,
            price: Decimal::from(2_000),
            import_price: Decimal::from(1_200),
            stock_quantity: stock,
            min_stock,
            expiry_date: expiry,
            batch_number: None,
            manufacturer: None,
            usage_instruction: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_stock_deduction_sequence() {
        let stock = check_stock(10, 3).unwrap();
        assert_eq!(stock, 7);

        let err = check_stock(stock, 10).unwrap_err();
        assert!(err.to_string().contains("insufficient stock"));
        assert!(matches!(err, HospitalError::InsufficientStock { available: 7, requested: 10 }));
    }

    #[test]
    fn test_exact_stock_allowed() {
        assert_eq!(check_stock(5, 5).unwrap(), 0);
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        assert!(matches!(check_stock(5, 0), Err(HospitalError::Validation(_))));
        assert!(check_stock(5, -1).is_err());
    }

    #[test]
    fn test_inventory_alerts() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let medicines = vec![
            medicine(100, 10, Some(today + Duration::days(45))),
            medicine(3, 10, Some(today + Duration::days(365))),
            medicine(100, 10, None),
            medicine(1, 10, Some(today - Duration::days(1))),
        ];

        let alerts = inventory_alerts(&medicines, today);
        let types: Vec<_> = alerts.iter().map(|a| a.alert_type).collect();
        assert_eq!(
            types,
            vec![
                InventoryAlertType::Expiry,
                InventoryAlertType::LowStock,
                InventoryAlertType::Expiry,
                InventoryAlertType::LowStock,
            ]
        );
    }

    #[test]
    fn test_is_expiring_window() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(is_expiring(Some(today + Duration::days(30)), today, EXPIRY_WARNING_DAYS));
        assert!(!is_expiring(Some(today + Duration::days(31)), today, EXPIRY_WARNING_DAYS));
        assert!(!is_expiring(None, today, EXPIRY_WARNING_DAYS));
    }
}
