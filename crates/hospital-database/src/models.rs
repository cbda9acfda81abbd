//! 数据库模型

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use hospital_core::models::*;
use hospital_core::utils::{is_valid_cccd, is_valid_email, is_valid_phone, normalize_optional};
use hospital_core::{HospitalError, Result};
use hospital_workflow::{BedFeeLine, BedFeeSummary, BillPreview};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// 数据库表模型 - 枚举列以文本存储，读取时转换；无法识别的值回落到默认状态

/// 数据库用户表
#[derive(Debug, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(db_user: DbUser) -> Self {
        User {
            id: db_user.id,
            username: db_user.username,
            full_name: db_user.full_name,
            email: db_user.email,
            phone: db_user.phone,
            role: db_user.role.parse().unwrap_or(UserRole::Patient),
            is_active: db_user.is_active,
            created_at: db_user.created_at,
        }
    }
}

/// 登录校验所需的用户凭据
#[derive(Debug, FromRow)]
pub struct DbUserCredentials {
    #[sqlx(flatten)]
    pub user: DbUser,
    pub password_hash: String,
}

/// 密码重置验证码
#[derive(Debug, FromRow)]
pub struct DbResetToken {
    pub id: Uuid,
    pub reset_token: Option<String>,
    pub reset_token_exp: Option<DateTime<Utc>>,
    pub reset_attempts: i32,
}

/// 数据库患者表
#[derive(Debug, FromRow)]
pub struct DbPatient {
    pub id: Uuid,
    pub full_name: String,
    pub dob: NaiveDate,
    pub gender: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub cccd: Option<String>,
    pub insurance_card: Option<String>,
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

impl From<DbPatient> for Patient {
    fn from(db_patient: DbPatient) -> Self {
        Patient {
            id: db_patient.id,
            full_name: db_patient.full_name,
            dob: db_patient.dob,
            gender: db_patient.gender.parse().unwrap_or(Gender::Other),
            phone: db_patient.phone,
            email: db_patient.email,
            cccd: db_patient.cccd,
            insurance_card: db_patient.insurance_card,
            address: db_patient.address,
            emergency_contact: db_patient.emergency_contact,
            blood_type: db_patient.blood_type,
            height: db_patient.height,
            weight: db_patient.weight,
            allergies: db_patient.allergies,
            medical_history: db_patient.medical_history,
            created_at: db_patient.created_at,
            updated_at: db_patient.updated_at,
        }
    }
}

/// 数据库入库单表
#[derive(Debug, FromRow)]
pub struct DbImportReceipt {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub note: Option<String>,
    pub status: String,
    pub total_amount: Decimal,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl DbImportReceipt {
    pub fn with_lines(self, lines: Vec<ImportLine>) -> ImportReceipt {
        ImportReceipt {
            id: self.id,
            supplier_id: self.supplier_id,
            note: self.note,
            status: self.status.parse().unwrap_or(ImportStatus::Draft),
            total_amount: self.total_amount,
            created_by: self.created_by,
            created_at: self.created_at,
            confirmed_at: self.confirmed_at,
            lines,
        }
    }
}

/// 数据库就诊表
#[derive(Debug, FromRow)]
pub struct DbVisit {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub visit_date: DateTime<Utc>,
    pub status: String,
    pub priority: String,
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

impl From<DbVisit> for Visit {
    fn from(db_visit: DbVisit) -> Self {
        Visit {
            id: db_visit.id,
            patient_id: db_visit.patient_id,
            doctor_id: db_visit.doctor_id,
            visit_date: db_visit.visit_date,
            status: db_visit.status.parse().unwrap_or(VisitStatus::Waiting),
            priority: db_visit.priority.parse().unwrap_or(VisitPriority::Normal),
            chief_complaint: db_visit.chief_complaint,
            pulse: db_visit.pulse,
            temperature: db_visit.temperature,
            blood_pressure: db_visit.blood_pressure,
            respiratory_rate: db_visit.respiratory_rate,
            clinical_symptoms: db_visit.clinical_symptoms,
            diagnosis: db_visit.diagnosis,
            icd10: db_visit.icd10,
            advice: db_visit.advice,
            follow_up_date: db_visit.follow_up_date,
        }
    }
}

/// 数据库发票表
#[derive(Debug, FromRow)]
pub struct DbInvoice {
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
    pub payment_method: String,
    pub payment_time: DateTime<Utc>,
}

impl From<DbInvoice> for Invoice {
    fn from(db_invoice: DbInvoice) -> Self {
        Invoice {
            id: db_invoice.id,
            visit_id: db_invoice.visit_id,
            medicine_total: db_invoice.medicine_total,
            service_total: db_invoice.service_total,
            exam_fee: db_invoice.exam_fee,
            procedure_fee: db_invoice.procedure_fee,
            sub_total: db_invoice.sub_total,
            insurance_percent: db_invoice.insurance_percent,
            discount: db_invoice.discount,
            final_amount: db_invoice.final_amount,
            payment_method: db_invoice.payment_method.parse().unwrap_or(PaymentMethod::Cash),
            payment_time: db_invoice.payment_time,
        }
    }
}

/// 数据库预约表
#[derive(Debug, FromRow)]
pub struct DbAppointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub reason: Option<String>,
    pub status: String,
    pub booked_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<DbAppointment> for Appointment {
    fn from(db_appt: DbAppointment) -> Self {
        Appointment {
            id: db_appt.id,
            patient_id: db_appt.patient_id,
            doctor_id: db_appt.doctor_id,
            appointment_date: db_appt.appointment_date,
            start_time: db_appt.start_time,
            end_time: db_appt.end_time,
            reason: db_appt.reason,
            status: db_appt.status.parse().unwrap_or(AppointmentStatus::Pending),
            booked_by: db_appt.booked_by,
            created_at: db_appt.created_at,
        }
    }
}

/// 数据库服务目录表
#[derive(Debug, FromRow)]
pub struct DbService {
    pub id: Uuid,
    pub name: String,
    pub service_type: String,
    pub price: Decimal,
    pub is_active: bool,
}

impl From<DbService> for Service {
    fn from(db_service: DbService) -> Self {
        Service {
            id: db_service.id,
            name: db_service.name,
            service_type: db_service.service_type.parse().unwrap_or(ServiceType::Other),
            price: db_service.price,
            is_active: db_service.is_active,
        }
    }
}

/// 数据库服务申请表
#[derive(Debug, FromRow)]
pub struct DbServiceRequest {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub service_id: Uuid,
    pub doctor_id: Uuid,
    pub quantity: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<DbServiceRequest> for ServiceRequest {
    fn from(db_req: DbServiceRequest) -> Self {
        ServiceRequest {
            id: db_req.id,
            visit_id: db_req.visit_id,
            service_id: db_req.service_id,
            doctor_id: db_req.doctor_id,
            quantity: db_req.quantity,
            status: db_req.status.parse().unwrap_or(ServiceRequestStatus::Pending),
            created_at: db_req.created_at,
        }
    }
}

/// 数据库床位表
#[derive(Debug, FromRow)]
pub struct DbBed {
    pub id: Uuid,
    pub room_id: Uuid,
    pub bed_number: String,
    pub status: String,
}

impl From<DbBed> for Bed {
    fn from(db_bed: DbBed) -> Self {
        Bed {
            id: db_bed.id,
            room_id: db_bed.room_id,
            bed_number: db_bed.bed_number,
            status: db_bed.status.parse().unwrap_or(BedStatus::Maintenance),
        }
    }
}

/// 数据库住院记录表
#[derive(Debug, FromRow)]
pub struct DbInpatientRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub visit_id: Option<Uuid>,
    pub treating_doctor_id: Option<Uuid>,
    pub admission_time: DateTime<Utc>,
    pub discharge_time: Option<DateTime<Utc>>,
    pub initial_diagnosis: Option<String>,
    pub discharge_summary: Option<String>,
    pub status: String,
}

impl From<DbInpatientRecord> for InpatientRecord {
    fn from(db_record: DbInpatientRecord) -> Self {
        InpatientRecord {
            id: db_record.id,
            patient_id: db_record.patient_id,
            visit_id: db_record.visit_id,
            treating_doctor_id: db_record.treating_doctor_id,
            admission_time: db_record.admission_time,
            discharge_time: db_record.discharge_time,
            initial_diagnosis: db_record.initial_diagnosis,
            discharge_summary: db_record.discharge_summary,
            status: db_record.status.parse().unwrap_or(InpatientStatus::Active),
        }
    }
}

// 插入模型 - 用于创建新记录

/// 新用户插入模型
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
}

/// 个人资料更新
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
}

fn check_contact(phone: Option<&str>, email: Option<&str>) -> Result<()> {
    if let Some(phone) = phone {
        if !is_valid_phone(phone) {
            return Err(HospitalError::Validation(format!("invalid phone number: {}", phone)));
        }
    }
    if let Some(email) = email {
        if !is_valid_email(email) {
            return Err(HospitalError::Validation(format!("invalid email: {}", email)));
        }
    }
    Ok(())
}

/// 新患者
#[derive(Debug, Clone, Deserialize)]
pub struct NewPatient {
    pub full_name: String,
    pub dob: NaiveDate,
    pub gender: Gender,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub cccd: Option<String>,
    pub insurance_card: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub blood_type: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub allergies: Option<String>,
    pub medical_history: Option<String>,
}

impl NewPatient {
    /// 规范化空字段并校验格式
    pub fn normalized(mut self) -> Result<Self> {
        self.full_name = self.full_name.trim().to_string();
        if self.full_name.is_empty() {
            return Err(HospitalError::validation("full_name is required"));
        }
        self.phone = normalize_optional(self.phone);
        self.email = normalize_optional(self.email);
        self.cccd = normalize_optional(self.cccd);
        self.insurance_card = normalize_optional(self.insurance_card);
        check_contact(self.phone.as_deref(), self.email.as_deref())?;
        if let Some(cccd) = &self.cccd {
            if !is_valid_cccd(cccd) {
                return Err(HospitalError::validation("cccd must be 12 digits"));
            }
        }
        Ok(self)
    }
}

/// 患者信息更新，未提供的字段保持不变
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientUpdate {
    pub full_name: Option<String>,
    pub dob: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub cccd: Option<String>,
    pub insurance_card: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub blood_type: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub allergies: Option<String>,
    pub medical_history: Option<String>,
}

impl PatientUpdate {
    pub fn normalized(mut self) -> Result<Self> {
        if let Some(name) = &self.full_name {
            if name.trim().is_empty() {
                return Err(HospitalError::validation("full_name must not be empty"));
            }
        }
        self.phone = normalize_optional(self.phone);
        self.email = normalize_optional(self.email);
        self.cccd = normalize_optional(self.cccd);
        self.insurance_card = normalize_optional(self.insurance_card);
        check_contact(self.phone.as_deref(), self.email.as_deref())?;
        if let Some(cccd) = &self.cccd {
            if !is_valid_cccd(cccd) {
                return Err(HospitalError::validation("cccd must be 12 digits"));
            }
        }
        Ok(self)
    }
}

/// 新药品
#[derive(Debug, Clone, Deserialize)]
pub struct NewMedicine {
    pub name: String,
    pub active_ingredient: Option<String>,
    pub category: Option<String>,
    pub unit: String,
    pub dosage: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub import_price: Decimal,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default = "default_min_stock")]
    pub min_stock: i32,
    pub expiry_date: Option<NaiveDate>,
    pub batch_number: Option<String>,
    pub manufacturer: Option<String>,
    pub usage_instruction: Option<String>,
}

fn default_min_stock() -> i32 {
    10
}

impl NewMedicine {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.unit.trim().is_empty() {
            return Err(HospitalError::validation("name and unit are required"));
        }
        if self.price.is_sign_negative() || self.import_price.is_sign_negative() {
            return Err(HospitalError::validation("price must not be negative"));
        }
        if self.stock_quantity < 0 || self.min_stock < 0 {
            return Err(HospitalError::validation("stock quantities must not be negative"));
        }
        Ok(())
    }
}

/// 药品信息更新（库存只能通过处方和入库单变动）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicineUpdate {
    pub name: Option<String>,
    pub active_ingredient: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub dosage: Option<String>,
    pub price: Option<Decimal>,
    pub import_price: Option<Decimal>,
    pub min_stock: Option<i32>,
    pub expiry_date: Option<NaiveDate>,
    pub batch_number: Option<String>,
    pub manufacturer: Option<String>,
    pub usage_instruction: Option<String>,
}

impl MedicineUpdate {
    pub fn validate(&self) -> Result<()> {
        if self.price.is_some_and(|p| p.is_sign_negative())
            || self.import_price.is_some_and(|p| p.is_sign_negative())
        {
            return Err(HospitalError::validation("price must not be negative"));
        }
        if self.min_stock.is_some_and(|m| m < 0) {
            return Err(HospitalError::validation("min_stock must not be negative"));
        }
        Ok(())
    }
}

/// 新供应商
#[derive(Debug, Clone, Deserialize)]
pub struct NewSupplier {
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// 入库明细行
#[derive(Debug, Clone, Deserialize)]
pub struct NewImportLine {
    pub medicine_id: Uuid,
    pub quantity: i32,
    pub import_price: Decimal,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

/// 新入库单（草稿）
#[derive(Debug, Clone, Deserialize)]
pub struct NewImportReceipt {
    pub supplier_id: Uuid,
    pub note: Option<String>,
    pub lines: Vec<NewImportLine>,
}

impl NewImportReceipt {
    pub fn validate(&self) -> Result<()> {
        if self.lines.is_empty() {
            return Err(HospitalError::validation("import receipt must contain at least one line"));
        }
        for line in &self.lines {
            if line.quantity <= 0 {
                return Err(HospitalError::validation("import quantity must be greater than 0"));
            }
            if line.import_price.is_sign_negative() {
                return Err(HospitalError::validation("import_price must not be negative"));
            }
        }
        Ok(())
    }

    pub fn total_amount(&self) -> Decimal {
        self.lines
            .iter()
            .map(|l| l.import_price * Decimal::from(l.quantity))
            .sum()
    }
}

/// 新就诊（分诊）
#[derive(Debug, Clone, Deserialize)]
pub struct NewVisit {
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub chief_complaint: Option<String>,
    pub pulse: Option<i32>,
    pub temperature: Option<f64>,
    pub blood_pressure: Option<String>,
    pub respiratory_rate: Option<i32>,
    #[serde(default = "default_priority")]
    pub priority: VisitPriority,
}

fn default_priority() -> VisitPriority {
    VisitPriority::Normal
}

impl NewVisit {
    pub fn validate(&self) -> Result<()> {
        if self.pulse.is_some_and(|p| p <= 0) || self.respiratory_rate.is_some_and(|r| r <= 0) {
            return Err(HospitalError::validation("vital signs must be positive"));
        }
        if self.temperature.is_some_and(|t| !(25.0..=45.0).contains(&t)) {
            return Err(HospitalError::validation("temperature out of range"));
        }
        Ok(())
    }
}

/// 诊断录入
#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosisUpdate {
    pub diagnosis: String,
    pub clinical_symptoms: Option<String>,
    pub icd10: Option<String>,
    pub advice: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

/// 新处方明细
#[derive(Debug, Clone, Deserialize)]
pub struct NewPrescription {
    pub visit_id: Uuid,
    pub medicine_id: Uuid,
    pub quantity: i32,
    pub note: Option<String>,
    pub dosage_morning: Option<String>,
    pub dosage_noon: Option<String>,
    pub dosage_afternoon: Option<String>,
    pub dosage_evening: Option<String>,
    pub usage_instruction: Option<String>,
}

/// 开具发票
#[derive(Debug, Clone, Deserialize)]
pub struct NewInvoice {
    pub visit_id: Uuid,
    #[serde(default)]
    pub insurance_percent: i32,
    #[serde(default)]
    pub procedure_fee: Decimal,
    #[serde(default = "default_payment_method")]
    pub payment_method: PaymentMethod,
}

fn default_payment_method() -> PaymentMethod {
    PaymentMethod::Cash
}

/// 新排班，时间格式 `HH:MM`
#[derive(Debug, Clone, Deserialize)]
pub struct NewSchedule {
    pub doctor_id: Uuid,
    pub day_of_week: i16,
    pub shift_start: String,
    pub shift_end: String,
}

/// 新预约，时间格式 `HH:MM`
#[derive(Debug, Clone, Deserialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: String,
    pub reason: Option<String>,
}

/// 预约改期
#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleAppointment {
    pub appointment_date: NaiveDate,
    pub start_time: String,
    pub reason: Option<String>,
}

/// 新服务目录项
#[derive(Debug, Clone, Deserialize)]
pub struct NewService {
    pub name: String,
    pub service_type: ServiceType,
    pub price: Decimal,
}

/// 新服务申请
#[derive(Debug, Clone, Deserialize)]
pub struct NewServiceRequest {
    pub service_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

/// 新服务结果
#[derive(Debug, Clone, Deserialize)]
pub struct NewServiceResult {
    pub request_id: Uuid,
    pub result_data: Option<String>,
    pub image_url: Option<String>,
    pub conclusion: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDepartment {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRoom {
    pub department_id: Uuid,
    pub room_number: String,
    #[serde(default = "default_room_type")]
    pub room_type: String,
    pub price_per_day: Decimal,
}

fn default_room_type() -> String {
    "STANDARD".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBed {
    pub room_id: Uuid,
    pub bed_number: String,
}

/// 入院
#[derive(Debug, Clone, Deserialize)]
pub struct AdmitPatient {
    pub patient_id: Uuid,
    pub bed_id: Uuid,
    pub visit_id: Option<Uuid>,
    pub treating_doctor_id: Option<Uuid>,
    pub initial_diagnosis: Option<String>,
}

/// 每日医嘱
#[derive(Debug, Clone, Deserialize)]
pub struct NewDailyOrder {
    pub progress_note: String,
    pub doctor_instruction: Option<String>,
    pub nurse_notes: Option<String>,
    pub vitals: Option<serde_json::Value>,
}

// 查询视图 - 关联查询结果

/// 处方明细（含药品信息）
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PrescriptionDetail {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub medicine_id: Uuid,
    pub medicine_name: String,
    pub unit: String,
    pub price: Decimal,
    pub quantity: i32,
    pub note: Option<String>,
    pub dosage_morning: Option<String>,
    pub dosage_noon: Option<String>,
    pub dosage_afternoon: Option<String>,
    pub dosage_evening: Option<String>,
    pub usage_instruction: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 就诊及其处方
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitWithPrescriptions {
    #[serde(flatten)]
    pub visit: Visit,
    pub prescriptions: Vec<PrescriptionDetail>,
}

/// 患者就诊历史
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientHistory {
    #[serde(flatten)]
    pub patient: Patient,
    pub visits: Vec<VisitWithPrescriptions>,
}

/// 预约列表项（含患者与医生姓名）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDetail {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient_name: String,
    pub doctor_name: String,
}

#[derive(Debug, FromRow)]
pub struct DbAppointmentDetail {
    #[sqlx(flatten)]
    pub appointment: DbAppointment,
    pub patient_name: String,
    pub doctor_name: String,
}

impl From<DbAppointmentDetail> for AppointmentDetail {
    fn from(row: DbAppointmentDetail) -> Self {
        AppointmentDetail {
            appointment: row.appointment.into(),
            patient_name: row.patient_name,
            doctor_name: row.doctor_name,
        }
    }
}

/// 服务申请（含服务名称、单价与结果）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequestDetail {
    #[serde(flatten)]
    pub request: ServiceRequest,
    pub service_name: String,
    pub price: Decimal,
    pub result: Option<ServiceResult>,
}

#[derive(Debug, FromRow)]
pub struct DbServiceRequestDetail {
    #[sqlx(flatten)]
    pub request: DbServiceRequest,
    pub service_name: String,
    pub price: Decimal,
}

/// 床位图中的床位
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BedMapEntry {
    pub bed_id: Uuid,
    pub bed_number: String,
    pub status: BedStatus,
    pub inpatient_id: Option<Uuid>,
    pub patient_name: Option<String>,
}

/// 床位图中的病房
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BedMapRoom {
    pub room_id: Uuid,
    pub room_number: String,
    pub room_type: String,
    pub price_per_day: Decimal,
    pub beds: Vec<BedMapEntry>,
}

/// 床位图中的科室
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BedMapDepartment {
    pub department_id: Uuid,
    pub department_name: String,
    pub rooms: Vec<BedMapRoom>,
}

/// 床位图查询行
#[derive(Debug, FromRow)]
pub struct DbBedMapRow {
    pub department_id: Uuid,
    pub department_name: String,
    pub room_id: Option<Uuid>,
    pub room_number: Option<String>,
    pub room_type: Option<String>,
    pub price_per_day: Option<Decimal>,
    pub bed_id: Option<Uuid>,
    pub bed_number: Option<String>,
    pub bed_status: Option<String>,
    pub inpatient_id: Option<Uuid>,
    pub patient_name: Option<String>,
}

/// 在院患者列表项
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InpatientSummary {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub admission_time: DateTime<Utc>,
    pub initial_diagnosis: Option<String>,
    pub bed_id: Option<Uuid>,
    pub bed_number: Option<String>,
    pub room_number: Option<String>,
    pub department_name: Option<String>,
}

/// 床位占用历史查询行
#[derive(Debug, FromRow)]
pub struct DbAllocationRow {
    #[sqlx(flatten)]
    pub allocation: BedAllocation,
    pub bed_number: String,
    pub room_number: String,
}

/// 住院详情
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InpatientDetail {
    #[serde(flatten)]
    pub record: InpatientRecord,
    pub patient: Patient,
    pub bed_history: Vec<BedFeeLine>,
    pub bed_fee_total: Decimal,
    pub daily_orders: Vec<DailyOrder>,
}

/// 出院结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DischargeResult {
    pub record: InpatientRecord,
    pub released_bed_id: Uuid,
    pub bed_fee: BedFeeSummary,
}

/// 住院费用预览
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InpatientBill {
    pub inpatient_id: Uuid,
    pub patient_name: String,
    pub bed_details: Vec<BedFeeLine>,
    #[serde(flatten)]
    pub bill: BillPreview,
}

// 报表行

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RevenueRow {
    pub date: NaiveDate,
    pub revenue: Decimal,
    pub invoice_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TopMedicineRow {
    pub medicine_id: Uuid,
    pub name: String,
    pub sold_quantity: i64,
    pub stock_quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupancyRow {
    pub department_id: Uuid,
    pub department_name: String,
    pub total_beds: i64,
    pub occupied_beds: i64,
    /// 百分比，保留一位小数
    pub occupancy_rate: f64,
}

#[derive(Debug, FromRow)]
pub struct DbOccupancyRow {
    pub department_id: Uuid,
    pub department_name: String,
    pub total_beds: i64,
    pub occupied_beds: i64,
}

impl From<DbOccupancyRow> for OccupancyRow {
    fn from(row: DbOccupancyRow) -> Self {
        let occupancy_rate = if row.total_beds == 0 {
            0.0
        } else {
            (row.occupied_beds as f64 * 1000.0 / row.total_beds as f64).round() / 10.0
        };
        OccupancyRow {
            department_id: row.department_id,
            department_name: row.department_name,
            total_beds: row.total_beds,
            occupied_beds: row.occupied_beds,
            occupancy_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DoctorPerformanceRow {
    pub doctor_id: Uuid,
    pub full_name: String,
    pub total_visits: i64,
    pub completed_visits: i64,
    pub revenue: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_patient() -> NewPatient {
        NewPatient {
            full_name: "  Nguyễn Văn An ".to_string(),
            dob: NaiveDate::from_ymd_opt(1990, 4, 12).unwrap(),
            gender: Gender::Male,
            phone: Some("0901234567".to_string()),
            email: Some("".to_string()),
            cccd: Some("001090004567".to_string()),
            insurance_card: Some("   ".to_string()),
            address: None,
            emergency_contact: None,
            blood_type: None,
            height: None,
            weight: None,
            allergies: None,
            medical_history: None,
        }
    }

    #[test]
    fn test_new_patient_normalized() {
        let patient = new_patient().normalized().unwrap();
        assert_eq!(patient.full_name, "Nguyễn Văn An");
        assert_eq!(patient.email, None);
        assert_eq!(patient.insurance_card, None);
    }

    #[test]
    fn test_new_patient_rejects_bad_fields() {
        let mut patient = new_patient();
        patient.cccd = Some("123".to_string());
        assert!(patient.normalized().is_err());

        let mut patient = new_patient();
        patient.phone = Some("abc".to_string());
        assert!(patient.normalized().is_err());

        let mut patient = new_patient();
        patient.full_name = " ".to_string();
        assert!(patient.normalized().is_err());
    }

    #[test]
    fn test_import_receipt_total() {
        let receipt = NewImportReceipt {
            supplier_id: Uuid::new_v4(),
            note: None,
            lines: vec![
                NewImportLine {
                    medicine_id: Uuid::new_v4(),
                    quantity: 100,
                    import_price: Decimal::from(1_200),
                    batch_number: None,
                    expiry_date: None,
                },
                NewImportLine {
                    medicine_id: Uuid::new_v4(),
                    quantity: 20,
                    import_price: Decimal::from(15_000),
                    batch_number: Some("B2024".to_string()),
                    expiry_date: None,
                },
            ],
        };
        assert!(receipt.validate().is_ok());
        assert_eq!(receipt.total_amount(), Decimal::from(420_000));

        let empty = NewImportReceipt { lines: vec![], ..receipt };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_occupancy_rate() {
        let row = OccupancyRow::from(DbOccupancyRow {
            department_id: Uuid::new_v4(),
            department_name: "Nội".to_string(),
            total_beds: 3,
            occupied_beds: 1,
        });
        assert_eq!(row.occupancy_rate, 33.3);

        let empty = OccupancyRow::from(DbOccupancyRow {
            department_id: Uuid::new_v4(),
            department_name: "Ngoại".to_string(),
            total_beds: 0,
            occupied_beds: 0,
        });
        assert_eq!(empty.occupancy_rate, 0.0);
    }

    #[test]
    fn test_visit_defaults_from_json() {
        let visit: NewVisit = serde_json::from_value(serde_json::json!({
            "patient_id": Uuid::new_v4(),
            "pulse": 80,
            "temperature": 37.2
        }))
        .unwrap();
        assert_eq!(visit.priority, VisitPriority::Normal);
        assert!(visit.validate().is_ok());
    }
}
