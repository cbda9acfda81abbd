//! # Hospital Web
//!
//! HTTP 接口层：路由、JWT 认证与角色校验、业务处理器和报表导出

pub mod auth;
pub mod error;
pub mod export;
pub mod handlers;
pub mod mailer;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use server::WebServer;
pub use state::AppState;
