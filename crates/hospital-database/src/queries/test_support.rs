//! 数据库测试夹具
//!
//! 需要设置 `DATABASE_URL` 指向一个可写的 PostgreSQL，未设置时测试直接跳过。
//! 所有名称带随机后缀，可以在同一个库上反复运行。

use super::DatabaseQueries;
use crate::connection::{DatabasePool, PoolSettings};
use crate::models::*;
use chrono::NaiveDate;
use hospital_core::{Bed, Gender, Medicine, Patient, User, UserRole, Visit, VisitPriority};
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::sync::OnceCell;
use uuid::Uuid;

static SCHEMA: OnceCell<()> = OnceCell::const_new();

/// 连接测试库并确保表结构存在
pub(crate) async fn test_pool() -> Option<DatabasePool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping database test");
        return None;
    };

    let pool = DatabasePool::connect(&PoolSettings {
        url,
        max_connections: 5,
        min_connections: 0,
        connect_timeout: Duration::from_secs(10),
    })
    .await
    .unwrap();

    SCHEMA
        .get_or_init(|| async {
            DatabaseQueries::new(&pool).create_tables().await.unwrap();
        })
        .await;
    Some(pool)
}

fn suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

pub(crate) async fn user(queries: &DatabaseQueries<'_>, role: UserRole) -> User {
    queries
        .create_user(&NewUser {
            username: format!("{}_{}", role.as_str().to_lowercase(), suffix()),
            password_hash: "not-a-real-hash".to_string(),
            full_name: "Trần Văn An".to_string(),
            email: None,
            phone: None,
            role,
        })
        .await
        .unwrap()
}

pub(crate) async fn doctor(queries: &DatabaseQueries<'_>) -> User {
    user(queries, UserRole::Doctor).await
}

pub(crate) async fn patient(queries: &DatabaseQueries<'_>) -> Patient {
    queries
        .create_patient(&NewPatient {
            full_name: format!("Nguyễn Thị {}", suffix()),
            dob: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
            gender: Gender::Female,
            phone: None,
            email: None,
            cccd: None,
            insurance_card: None,
            address: None,
            emergency_contact: None,
            blood_type: None,
            height: None,
            weight: None,
            allergies: None,
            medical_history: None,
        })
        .await
        .unwrap()
}

pub(crate) async fn medicine(queries: &DatabaseQueries<'_>, stock: i32) -> Medicine {
    queries
        .create_medicine(&NewMedicine {
            name: format!("Paracetamol {}", suffix()),
            active_ingredient: Some("Paracetamol".to_string()),
            category: None,
            unit: "viên".to_string(),
            dosage: Some("500mg".to_string()),
            price: Decimal::from(2_000),
            import_price: Decimal::from(1_200),
            stock_quantity: stock,
            min_stock: 0,
            expiry_date: None,
            batch_number: None,
            manufacturer: None,
            usage_instruction: None,
        })
        .await
        .unwrap()
}

pub(crate) async fn visit(queries: &DatabaseQueries<'_>, patient_id: Uuid, doctor_id: Uuid) -> Visit {
    queries
        .create_visit(&NewVisit {
            patient_id,
            doctor_id: Some(doctor_id),
            chief_complaint: Some("Sốt cao".to_string()),
            pulse: Some(88),
            temperature: Some(38.5),
            blood_pressure: Some("120/80".to_string()),
            respiratory_rate: Some(18),
            priority: VisitPriority::Normal,
        })
        .await
        .unwrap()
}

/// 新建科室、病房和指定数量的空床
pub(crate) async fn ward(queries: &DatabaseQueries<'_>, price_per_day: i64, beds: usize) -> Vec<Bed> {
    let department = queries
        .create_department(&NewDepartment {
            name: format!("Nội tổng hợp {}", suffix()),
            description: None,
        })
        .await
        .unwrap();
    let room = queries
        .create_room(&NewRoom {
            department_id: department.id,
            room_number: "101".to_string(),
            room_type: "STANDARD".to_string(),
            price_per_day: Decimal::from(price_per_day),
        })
        .await
        .unwrap();

    let mut created = Vec::with_capacity(beds);
    for n in 1..=beds {
        let bed = queries
            .create_bed(&NewBed {
                room_id: room.id,
                bed_number: format!("B{:02}", n),
            })
            .await
            .unwrap();
        created.push(bed);
    }
    created
}

pub(crate) async fn bed_status(pool: &DatabasePool, bed_id: Uuid) -> String {
    sqlx::query_scalar("SELECT status FROM beds WHERE id = $1")
        .bind(bed_id)
        .fetch_one(pool.pool())
        .await
        .unwrap()
}
