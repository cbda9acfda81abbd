//! 数据库查询操作
//!
//! 按业务领域拆分到子模块，所有操作都挂在 [`DatabaseQueries`] 上。
//! 多步写操作在单个事务内完成，出错时事务随 drop 回滚。

mod billing;
mod inpatient;
mod patients;
mod pharmacy;
mod reports;
mod scheduling;
mod services;
mod users;
mod visits;

#[cfg(test)]
mod test_support;

use crate::connection::DatabasePool;
use hospital_core::Result;

/// 数据库查询操作接口
pub struct DatabaseQueries<'a> {
    pool: &'a DatabasePool,
}

impl<'a> DatabaseQueries<'a> {
    pub fn new(pool: &'a DatabasePool) -> Self {
        Self { pool }
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        for (name, ddl) in TABLES {
            sqlx::query(ddl).execute(pool).await?;
            tracing::debug!(table = name, "Table ensured");
        }
        for ddl in COLUMN_UPGRADES {
            sqlx::query(ddl).execute(pool).await?;
        }

        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引，包括保证业务不变量的部分唯一索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = vec![
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_users_email ON users(email) WHERE email IS NOT NULL",
            "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)",
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_patients_insurance_card ON patients(insurance_card) WHERE insurance_card IS NOT NULL AND deleted_at IS NULL",
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_patients_cccd ON patients(cccd) WHERE cccd IS NOT NULL AND deleted_at IS NULL",
            "CREATE INDEX IF NOT EXISTS idx_patients_full_name ON patients(full_name)",
            "CREATE INDEX IF NOT EXISTS idx_medicines_expiry_date ON medicines(expiry_date)",
            "CREATE INDEX IF NOT EXISTS idx_visits_patient_id ON visits(patient_id)",
            "CREATE INDEX IF NOT EXISTS idx_visits_status ON visits(status)",
            "CREATE INDEX IF NOT EXISTS idx_prescriptions_visit_id ON prescriptions(visit_id)",
            "CREATE INDEX IF NOT EXISTS idx_invoices_payment_time ON invoices(payment_time)",
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_appointments_slot ON appointments(doctor_id, appointment_date, start_time) WHERE status <> 'CANCELLED'",
            "CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments(appointment_date)",
            "CREATE INDEX IF NOT EXISTS idx_service_requests_visit_id ON service_requests(visit_id)",
            "CREATE INDEX IF NOT EXISTS idx_service_requests_status ON service_requests(status)",
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_bed_allocations_open_bed ON bed_allocations(bed_id) WHERE check_out_time IS NULL",
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_inpatient_active_patient ON inpatient_records(patient_id) WHERE status = 'ACTIVE'",
            "CREATE INDEX IF NOT EXISTS idx_bed_allocations_inpatient_id ON bed_allocations(inpatient_id)",
            "CREATE INDEX IF NOT EXISTS idx_daily_orders_inpatient_id ON daily_orders(inpatient_id)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql).execute(pool).await?;
        }

        tracing::info!("Database indexes created successfully");
        Ok(())
    }
}

/// 旧库补列
const COLUMN_UPGRADES: &[&str] = &[
    "ALTER TABLE users ADD COLUMN IF NOT EXISTS reset_attempts INTEGER NOT NULL DEFAULT 0",
    "ALTER TABLE appointments ADD COLUMN IF NOT EXISTS booked_by UUID REFERENCES users(id)",
];

/// 建表语句，按外键依赖顺序排列
const TABLES: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            username VARCHAR(64) UNIQUE NOT NULL,
            password_hash VARCHAR(255) NOT NULL,
            full_name VARCHAR(255) NOT NULL,
            email VARCHAR(255),
            phone VARCHAR(20),
            role VARCHAR(20) NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            reset_token VARCHAR(6),
            reset_token_exp TIMESTAMP WITH TIME ZONE,
            reset_attempts INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
    "#,
    ),
    (
        "patients",
        r#"
        CREATE TABLE IF NOT EXISTS patients (
            id UUID PRIMARY KEY,
            full_name VARCHAR(255) NOT NULL,
            dob DATE NOT NULL,
            gender VARCHAR(10) NOT NULL,
            phone VARCHAR(20),
            email VARCHAR(255),
            cccd VARCHAR(12),
            insurance_card VARCHAR(32),
            address TEXT,
            emergency_contact TEXT,
            blood_type VARCHAR(8),
            height DOUBLE PRECISION,
            weight DOUBLE PRECISION,
            allergies TEXT,
            medical_history TEXT,
            deleted_at TIMESTAMP WITH TIME ZONE,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
    "#,
    ),
    (
        "medicines",
        r#"
        CREATE TABLE IF NOT EXISTS medicines (
            id UUID PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            active_ingredient VARCHAR(255),
            category VARCHAR(100),
            unit VARCHAR(32) NOT NULL,
            dosage VARCHAR(100),
            price NUMERIC(15,2) NOT NULL DEFAULT 0,
            import_price NUMERIC(15,2) NOT NULL DEFAULT 0,
            stock_quantity INTEGER NOT NULL DEFAULT 0 CHECK (stock_quantity >= 0),
            min_stock INTEGER NOT NULL DEFAULT 10,
            expiry_date DATE,
            batch_number VARCHAR(64),
            manufacturer VARCHAR(255),
            usage_instruction TEXT,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
    "#,
    ),
    (
        "suppliers",
        r#"
        CREATE TABLE IF NOT EXISTS suppliers (
            id UUID PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            phone VARCHAR(20),
            address TEXT,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
    "#,
    ),
    (
        "import_receipts",
        r#"
        CREATE TABLE IF NOT EXISTS import_receipts (
            id UUID PRIMARY KEY,
            supplier_id UUID NOT NULL REFERENCES suppliers(id),
            note TEXT,
            status VARCHAR(20) NOT NULL DEFAULT 'DRAFT',
            total_amount NUMERIC(15,2) NOT NULL DEFAULT 0,
            created_by UUID NOT NULL REFERENCES users(id),
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            confirmed_at TIMESTAMP WITH TIME ZONE
        )
    "#,
    ),
    (
        "import_lines",
        r#"
        CREATE TABLE IF NOT EXISTS import_lines (
            id UUID PRIMARY KEY,
            receipt_id UUID NOT NULL REFERENCES import_receipts(id),
            medicine_id UUID NOT NULL REFERENCES medicines(id),
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            import_price NUMERIC(15,2) NOT NULL,
            batch_number VARCHAR(64),
            expiry_date DATE
        )
    "#,
    ),
    (
        "visits",
        r#"
        CREATE TABLE IF NOT EXISTS visits (
            id UUID PRIMARY KEY,
            patient_id UUID NOT NULL REFERENCES patients(id),
            doctor_id UUID REFERENCES users(id),
            visit_date TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            status VARCHAR(20) NOT NULL DEFAULT 'WAITING',
            priority VARCHAR(20) NOT NULL DEFAULT 'NORMAL',
            chief_complaint TEXT,
            pulse INTEGER,
            temperature DOUBLE PRECISION,
            blood_pressure VARCHAR(20),
            respiratory_rate INTEGER,
            clinical_symptoms TEXT,
            diagnosis TEXT,
            icd10 VARCHAR(16),
            advice TEXT,
            follow_up_date DATE
        )
    "#,
    ),
    (
        "prescriptions",
        r#"
        CREATE TABLE IF NOT EXISTS prescriptions (
            id UUID PRIMARY KEY,
            visit_id UUID NOT NULL REFERENCES visits(id),
            medicine_id UUID NOT NULL REFERENCES medicines(id),
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            note TEXT,
            dosage_morning VARCHAR(32),
            dosage_noon VARCHAR(32),
            dosage_afternoon VARCHAR(32),
            dosage_evening VARCHAR(32),
            usage_instruction TEXT,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
    "#,
    ),
    (
        "invoices",
        r#"
        CREATE TABLE IF NOT EXISTS invoices (
            id UUID PRIMARY KEY,
            visit_id UUID UNIQUE NOT NULL REFERENCES visits(id),
            medicine_total NUMERIC(15,2) NOT NULL,
            service_total NUMERIC(15,2) NOT NULL,
            exam_fee NUMERIC(15,2) NOT NULL,
            procedure_fee NUMERIC(15,2) NOT NULL,
            sub_total NUMERIC(15,2) NOT NULL,
            insurance_percent INTEGER NOT NULL CHECK (insurance_percent BETWEEN 0 AND 100),
            discount NUMERIC(15,2) NOT NULL,
            final_amount NUMERIC(15,2) NOT NULL,
            payment_method VARCHAR(20) NOT NULL,
            payment_time TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
    "#,
    ),
    (
        "doctor_schedules",
        r#"
        CREATE TABLE IF NOT EXISTS doctor_schedules (
            id UUID PRIMARY KEY,
            doctor_id UUID NOT NULL REFERENCES users(id),
            day_of_week SMALLINT NOT NULL CHECK (day_of_week BETWEEN 0 AND 6),
            shift_start TIME NOT NULL,
            shift_end TIME NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            UNIQUE (doctor_id, day_of_week)
        )
    "#,
    ),
    (
        "appointments",
        r#"
        CREATE TABLE IF NOT EXISTS appointments (
            id UUID PRIMARY KEY,
            patient_id UUID NOT NULL REFERENCES patients(id),
            doctor_id UUID NOT NULL REFERENCES users(id),
            appointment_date DATE NOT NULL,
            start_time TIME NOT NULL,
            end_time TIME NOT NULL,
            reason TEXT,
            status VARCHAR(20) NOT NULL DEFAULT 'PENDING',
            booked_by UUID REFERENCES users(id),
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
    "#,
    ),
    (
        "services",
        r#"
        CREATE TABLE IF NOT EXISTS services (
            id UUID PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            service_type VARCHAR(20) NOT NULL,
            price NUMERIC(15,2) NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT TRUE
        )
    "#,
    ),
    (
        "service_requests",
        r#"
        CREATE TABLE IF NOT EXISTS service_requests (
            id UUID PRIMARY KEY,
            visit_id UUID NOT NULL REFERENCES visits(id),
            service_id UUID NOT NULL REFERENCES services(id),
            doctor_id UUID NOT NULL REFERENCES users(id),
            quantity INTEGER NOT NULL DEFAULT 1 CHECK (quantity > 0),
            status VARCHAR(20) NOT NULL DEFAULT 'PENDING',
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
    "#,
    ),
    (
        "service_results",
        r#"
        CREATE TABLE IF NOT EXISTS service_results (
            id UUID PRIMARY KEY,
            request_id UUID UNIQUE NOT NULL REFERENCES service_requests(id),
            technician_id UUID NOT NULL REFERENCES users(id),
            result_data TEXT,
            image_url TEXT,
            conclusion TEXT,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
    "#,
    ),
    (
        "departments",
        r#"
        CREATE TABLE IF NOT EXISTS departments (
            id UUID PRIMARY KEY,
            name VARCHAR(255) UNIQUE NOT NULL,
            description TEXT
        )
    "#,
    ),
    (
        "rooms",
        r#"
        CREATE TABLE IF NOT EXISTS rooms (
            id UUID PRIMARY KEY,
            department_id UUID NOT NULL REFERENCES departments(id),
            room_number VARCHAR(32) NOT NULL,
            room_type VARCHAR(32) NOT NULL,
            price_per_day NUMERIC(15,2) NOT NULL,
            UNIQUE (department_id, room_number)
        )
    "#,
    ),
    (
        "beds",
        r#"
        CREATE TABLE IF NOT EXISTS beds (
            id UUID PRIMARY KEY,
            room_id UUID NOT NULL REFERENCES rooms(id),
            bed_number VARCHAR(32) NOT NULL,
            status VARCHAR(20) NOT NULL DEFAULT 'AVAILABLE',
            UNIQUE (room_id, bed_number)
        )
    "#,
    ),
    (
        "inpatient_records",
        r#"
        CREATE TABLE IF NOT EXISTS inpatient_records (
            id UUID PRIMARY KEY,
            patient_id UUID NOT NULL REFERENCES patients(id),
            visit_id UUID REFERENCES visits(id),
            treating_doctor_id UUID REFERENCES users(id),
            admission_time TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            discharge_time TIMESTAMP WITH TIME ZONE,
            initial_diagnosis TEXT,
            discharge_summary TEXT,
            status VARCHAR(20) NOT NULL DEFAULT 'ACTIVE'
        )
    "#,
    ),
    (
        "bed_allocations",
        r#"
        CREATE TABLE IF NOT EXISTS bed_allocations (
            id UUID PRIMARY KEY,
            inpatient_id UUID NOT NULL REFERENCES inpatient_records(id),
            bed_id UUID NOT NULL REFERENCES beds(id),
            price_per_day NUMERIC(15,2) NOT NULL,
            check_in_time TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            check_out_time TIMESTAMP WITH TIME ZONE
        )
    "#,
    ),
    (
        "daily_orders",
        r#"
        CREATE TABLE IF NOT EXISTS daily_orders (
            id UUID PRIMARY KEY,
            inpatient_id UUID NOT NULL REFERENCES inpatient_records(id),
            author_id UUID NOT NULL REFERENCES users(id),
            order_date TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            progress_note TEXT NOT NULL,
            doctor_instruction TEXT,
            nurse_notes TEXT,
            vitals JSONB
        )
    "#,
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_ordered_by_dependency() {
        let position = |name: &str| TABLES.iter().position(|(n, _)| *n == name).unwrap();
        assert!(position("users") < position("patients"));
        assert!(position("patients") < position("visits"));
        assert!(position("visits") < position("invoices"));
        assert!(position("beds") < position("bed_allocations"));
        assert!(position("inpatient_records") < position("daily_orders"));
    }

    #[test]
    fn test_every_table_is_idempotent() {
        for (name, ddl) in TABLES {
            assert!(ddl.contains("CREATE TABLE IF NOT EXISTS"), "{}", name);
            assert!(ddl.contains(name), "{}", name);
        }
    }
}
