//! # 医院系统运维模块
//!
//! 提供配置管理、日志初始化和 Prometheus 指标

pub mod config;
pub mod logging;
pub mod monitoring;

pub use config::{load_config, ConfigValidator, HospitalConfig, MailConfig};
pub use logging::init_logging;
pub use monitoring::HospitalMetrics;
