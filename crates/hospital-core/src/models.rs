//! 核心数据模型定义

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HospitalError;

/// 以字符串形式存储在数据库中的枚举
///
/// 数据库与 JSON 使用同一套大写文本，例如 `IN_PROGRESS`。
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = HospitalError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(HospitalError::Validation(format!(
                        "unknown {} value: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

// ========== 用户 ==========

text_enum! {
    /// 用户角色
    UserRole {
        Admin => "ADMIN",
        Doctor => "DOCTOR",
        Nurse => "NURSE",
        Technician => "TECHNICIAN",
        Patient => "PATIENT",
    }
}

impl UserRole {
    /// 医护人员（非患者账户）
    pub fn is_staff(&self) -> bool {
        !matches!(self, UserRole::Patient)
    }
}

/// 用户信息（不包含密码）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// ========== 患者 ==========

text_enum! {
    /// 性别
    Gender {
        Male => "MALE",
        Female => "FEMALE",
        Other => "OTHER",
    }
}

/// 患者档案
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub dob: NaiveDate,
    pub gender: Gender,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub cccd: Option<String>,           // 身份证号
    pub insurance_card: Option<String>, // 医保卡号 (BHYT)
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub blood_type: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub allergies: Option<String>,
    pub medical_history: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ========== 药品与库存 ==========

/// 药品（库存项）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    pub active_ingredient: Option<String>,
    pub category: Option<String>,
    pub unit: String,
    pub dosage: Option<String>,
    pub price: Decimal,
    pub import_price: Decimal,
    pub stock_quantity: i32,
    pub min_stock: i32,
    pub expiry_date: Option<NaiveDate>,
    pub batch_number: Option<String>,
    pub manufacturer: Option<String>,
    pub usage_instruction: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 供应商
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

text_enum! {
    /// 入库单状态
    ImportStatus {
        Draft => "DRAFT",
        Confirmed => "CONFIRMED",
    }
}

/// 入库单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReceipt {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub note: Option<String>,
    pub status: ImportStatus,
    pub total_amount: Decimal,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub lines: Vec<ImportLine>,
}

/// 入库明细
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct ImportLine {
    pub id: Uuid,
    pub receipt_id: Uuid,
    pub medicine_id: Uuid,
    pub quantity: i32,
    pub import_price: Decimal,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

// ========== 门诊 ==========

text_enum! {
    /// 就诊状态
    VisitStatus {
        Waiting => "WAITING",
        InProgress => "IN_PROGRESS",
        Completed => "COMPLETED",
        Paid => "PAID",
    }
}

text_enum! {
    /// 分诊优先级
    VisitPriority {
        Normal => "NORMAL",
        Urgent => "URGENT",
        Emergency => "EMERGENCY",
    }
}

/// 就诊记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub visit_date: DateTime<Utc>,
    pub status: VisitStatus,
    pub priority: VisitPriority,
    pub chief_complaint: Option<String>,
    pub pulse: Option<i32>,
    pub temperature: Option<f64>,
    pub blood_pressure: Option<String>,
    pub respiratory_rate: Option<i32>,
    pub clinical_symptoms: Option<String>,
    pub diagnosis: Option<String>,
    pub icd10: Option<String>,
    pub advice: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

/// 处方明细
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct Prescription {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub medicine_id: Uuid,
    pub quantity: i32,
    pub note: Option<String>,
    pub dosage_morning: Option<String>,
    pub dosage_noon: Option<String>,
    pub dosage_afternoon: Option<String>,
    pub dosage_evening: Option<String>,
    pub usage_instruction: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ========== 收费 ==========

text_enum! {
    /// 支付方式
    PaymentMethod {
        Cash => "CASH",
        Card => "CARD",
        Transfer => "TRANSFER",
    }
}

/// 发票
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub medicine_total: Decimal,
    pub service_total: Decimal,
    pub exam_fee: Decimal,
    pub procedure_fee: Decimal,
    pub sub_total: Decimal,
    pub insurance_percent: i32,
    pub discount: Decimal,
    pub final_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_time: DateTime<Utc>,
}

// ========== 预约 ==========

/// 医生每周排班
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct DoctorSchedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: i16, // 0 = 周一
    pub shift_start: NaiveTime,
    pub shift_end: NaiveTime,
    pub is_active: bool,
}

text_enum! {
    /// 预约状态
    AppointmentStatus {
        Pending => "PENDING",
        Confirmed => "CONFIRMED",
        Completed => "COMPLETED",
        Cancelled => "CANCELLED",
    }
}

/// 预约
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub reason: Option<String>,
    pub status: AppointmentStatus,
    /// 预约操作人账户
    pub booked_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// ========== 检验检查 ==========

text_enum! {
    /// 服务类别
    ServiceType {
        Lab => "LAB",
        Imaging => "IMAGING",
        Other => "OTHER",
    }
}

/// 检验/影像服务目录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub service_type: ServiceType,
    pub price: Decimal,
    pub is_active: bool,
}

text_enum! {
    /// 服务申请状态
    ServiceRequestStatus {
        Pending => "PENDING",
        Completed => "COMPLETED",
        Cancelled => "CANCELLED",
    }
}

/// 服务申请
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub service_id: Uuid,
    pub doctor_id: Uuid,
    pub quantity: i32,
    pub status: ServiceRequestStatus,
    pub created_at: DateTime<Utc>,
}

/// 服务结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct ServiceResult {
    pub id: Uuid,
    pub request_id: Uuid,
    pub technician_id: Uuid,
    pub result_data: Option<String>,
    pub image_url: Option<String>,
    pub conclusion: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ========== 住院 ==========

/// 科室
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// 病房
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct Room {
    pub id: Uuid,
    pub department_id: Uuid,
    pub room_number: String,
    pub room_type: String,
    pub price_per_day: Decimal,
}

text_enum! {
    /// 床位状态
    BedStatus {
        Available => "AVAILABLE",
        Occupied => "OCCUPIED",
        Maintenance => "MAINTENANCE",
    }
}

/// 床位
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bed {
    pub id: Uuid,
    pub room_id: Uuid,
    pub bed_number: String,
    pub status: BedStatus,
}

text_enum! {
    /// 住院状态
    InpatientStatus {
        Active => "ACTIVE",
        Discharged => "DISCHARGED",
    }
}

/// 住院记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InpatientRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub visit_id: Option<Uuid>,
    pub treating_doctor_id: Option<Uuid>,
    pub admission_time: DateTime<Utc>,
    pub discharge_time: Option<DateTime<Utc>>,
    pub initial_diagnosis: Option<String>,
    pub discharge_summary: Option<String>,
    pub status: InpatientStatus,
}

/// 床位占用区间，价格在分配时锁定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct BedAllocation {
    pub id: Uuid,
    pub inpatient_id: Uuid,
    pub bed_id: Uuid,
    pub price_per_day: Decimal,
    pub check_in_time: DateTime<Utc>,
    pub check_out_time: Option<DateTime<Utc>>,
}

/// 每日医嘱/病程记录
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct DailyOrder {
    pub id: Uuid,
    pub inpatient_id: Uuid,
    pub author_id: Uuid,
    pub order_date: DateTime<Utc>,
    pub progress_note: String,
    pub doctor_instruction: Option<String>,
    pub nurse_notes: Option<String>,
    pub vitals: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_text_matches_json() {
        let json = serde_json::to_string(&VisitStatus::InProgress).unwrap();
        assert_eq!(json, format!("\"{}\"", VisitStatus::InProgress.as_str()));
        assert_eq!(VisitStatus::from_str("IN_PROGRESS").unwrap(), VisitStatus::InProgress);
    }

    #[test]
    fn test_unknown_text_rejected() {
        assert!(BedStatus::from_str("BROKEN").is_err());
        assert!(UserRole::from_str("admin").is_err());
    }

    #[test]
    fn test_staff_roles() {
        assert!(UserRole::Nurse.is_staff());
        assert!(!UserRole::Patient.is_staff());
    }
}
