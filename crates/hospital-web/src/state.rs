//! 应用共享状态

use std::sync::Arc;

use hospital_admin::{HospitalConfig, HospitalMetrics};
use hospital_database::{DatabasePool, DatabaseQueries};
use rust_decimal::Decimal;

use crate::auth::AuthService;
use crate::mailer::Mailer;

/// 每个处理器共享的状态
#[derive(Clone)]
pub struct AppState {
    pub pool: DatabasePool,
    pub config: Arc<HospitalConfig>,
    pub auth: Arc<AuthService>,
    pub metrics: HospitalMetrics,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(
        pool: DatabasePool,
        config: HospitalConfig,
        metrics: HospitalMetrics,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let auth = AuthService::new(&config.auth.jwt_secret, config.auth.token_expiry_minutes);
        Self {
            pool,
            config: Arc::new(config),
            auth: Arc::new(auth),
            metrics,
            mailer,
        }
    }

    pub fn queries(&self) -> DatabaseQueries<'_> {
        DatabaseQueries::new(&self.pool)
    }

    /// 门诊诊查费
    pub fn exam_fee(&self) -> Decimal {
        Decimal::from(self.config.billing.exam_fee)
    }
}
