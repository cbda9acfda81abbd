//! # 医院数据库模块
//!
//! PostgreSQL 连接池、表结构与全部查询。多步写操作（处方扣库存、入院、转床、
//! 出院、开票等）都在单个事务中完成。

pub mod connection;
pub mod models;
pub mod queries;

// 重新导出主要类型
pub use connection::{DatabasePool, PoolSettings};
pub use models::*;
pub use queries::DatabaseQueries;
