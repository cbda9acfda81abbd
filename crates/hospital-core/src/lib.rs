//! # Hospital Core
//!
//! 医院管理系统的核心模块，提供领域数据结构、错误定义和通用工具。

pub mod error;
pub mod models;
pub mod utils;

pub use error::{HospitalError, Result};
pub use models::*;
