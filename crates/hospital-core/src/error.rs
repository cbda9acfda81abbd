//! 错误定义模块

use thiserror::Error;

/// 医院系统统一错误类型
#[derive(Error, Debug)]
pub enum HospitalError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("网络错误: {0}")]
    Network(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("未认证: {0}")]
    Unauthorized(String),

    #[error("权限错误: {0}")]
    Forbidden(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("数据冲突: {0}")]
    Conflict(String),

    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i32, requested: i32 },

    #[error("无效状态转换: 从 {from} 到 {event}")]
    InvalidStateTransition { from: String, event: String },

    #[error("系统内部错误: {0}")]
    Internal(String),
}

impl HospitalError {
    pub fn not_found(what: impl Into<String>) -> Self {
        HospitalError::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        HospitalError::Validation(msg.into())
    }
}

/// 唯一约束对应的提示信息
const UNIQUE_MESSAGES: &[(&str, &str)] = &[
    ("users_username_key", "username already exists"),
    ("uq_users_email", "email is already registered"),
    ("uq_patients_insurance_card", "insurance card is already registered"),
    ("uq_patients_cccd", "citizen ID is already registered"),
    ("uq_appointments_slot", "time slot is already booked"),
    ("uq_bed_allocations_open_bed", "bed is already occupied"),
    ("uq_inpatient_active_patient", "patient is already admitted"),
    ("invoices_visit_id_key", "visit already has an invoice"),
    ("service_results_request_id_key", "result already recorded"),
    ("doctor_schedules_doctor_id_day_of_week_key", "schedule already exists for this day"),
    ("departments_name_key", "department already exists"),
    ("rooms_department_id_room_number_key", "room number already exists in this department"),
    ("beds_room_id_bed_number_key", "bed number already exists in this room"),
];

/// PostgreSQL 约束错误（SQLSTATE 23xxx）转成客户端错误，不暴露约束名
pub fn constraint_violation(
    code: &str,
    table: Option<&str>,
    constraint: Option<&str>,
) -> Option<HospitalError> {
    match code {
        // unique_violation
        "23505" => {
            let message = constraint
                .and_then(|name| UNIQUE_MESSAGES.iter().find(|(c, _)| *c == name))
                .map(|(_, msg)| *msg)
                .unwrap_or("record already exists");
            Some(HospitalError::Conflict(message.to_string()))
        }
        // foreign_key_violation，约束名形如 `<table>_<column>_fkey`
        "23503" => {
            let column = match (table, constraint) {
                (Some(table), Some(name)) => name
                    .strip_prefix(table)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .and_then(|rest| rest.strip_suffix("_fkey")),
                _ => None,
            };
            let message = match column {
                Some(column) => format!("referenced {} does not exist", column),
                None => "referenced record does not exist".to_string(),
            };
            Some(HospitalError::Validation(message))
        }
        // not_null_violation / check_violation
        "23502" => Some(HospitalError::validation("a required field is missing")),
        "23514" => Some(HospitalError::validation("value is out of the allowed range")),
        _ => None,
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for HospitalError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => HospitalError::NotFound("record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                let mapped = db_err
                    .code()
                    .and_then(|code| constraint_violation(&code, db_err.table(), db_err.constraint()));
                mapped.unwrap_or_else(|| HospitalError::Database(db_err.to_string()))
            }
            other => HospitalError::Database(other.to_string()),
        }
    }
}

/// 医院系统统一结果类型
pub type Result<T> = std::result::Result<T, HospitalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = HospitalError::InsufficientStock { available: 7, requested: 10 };
        let msg = err.to_string();
        assert!(msg.contains("insufficient stock"));
        assert!(msg.contains('7'));
    }

    #[test]
    fn test_foreign_key_violation_is_client_error() {
        let err = constraint_violation(
            "23503",
            Some("inpatient_records"),
            Some("inpatient_records_visit_id_fkey"),
        )
        .unwrap();
        match err {
            HospitalError::Validation(msg) => assert_eq!(msg, "referenced visit_id does not exist"),
            other => panic!("unexpected error: {:?}", other),
        }

        let err = constraint_violation("23503", None, None).unwrap();
        assert!(matches!(err, HospitalError::Validation(_)));
    }

    #[test]
    fn test_unique_violation_hides_constraint_name() {
        let err = constraint_violation("23505", Some("patients"), Some("uq_patients_cccd")).unwrap();
        match err {
            HospitalError::Conflict(msg) => {
                assert_eq!(msg, "citizen ID is already registered");
                assert!(!msg.contains("uq_"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = constraint_violation("23505", Some("x"), Some("x_unknown_key")).unwrap();
        assert!(matches!(err, HospitalError::Conflict(ref m) if m == "record already exists"));
    }

    #[test]
    fn test_other_codes_are_not_mapped() {
        assert!(constraint_violation("40001", None, None).is_none());
    }
}
