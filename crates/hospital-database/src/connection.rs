//! 数据库连接管理

use hospital_core::{HospitalError, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// 连接池参数
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
}

/// 数据库连接池
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// 建立连接池并立即验证连接
    pub async fn connect(settings: &PoolSettings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.connect_timeout)
            .connect(&settings.url)
            .await
            .map_err(|e| HospitalError::Database(format!("failed to connect: {}", e)))?;

        tracing::info!(
            max_connections = settings.max_connections,
            "Database pool established"
        );
        Ok(Self { pool })
    }

    /// 延迟连接，首次查询时才真正建立连接
    pub fn connect_lazy(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .connect_lazy(url)
            .map_err(|e| HospitalError::Config(format!("invalid database url: {}", e)))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 连通性检查
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
