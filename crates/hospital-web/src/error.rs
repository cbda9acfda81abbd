//! 错误到 HTTP 响应的映射

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hospital_core::HospitalError;
use serde_json::json;
use tracing::error;

/// 处理器返回的错误类型
#[derive(Debug)]
pub struct ApiError(pub HospitalError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<HospitalError> for ApiError {
    fn from(err: HospitalError) -> Self {
        ApiError(err)
    }
}

/// 错误对应的状态码
pub fn status_code(err: &HospitalError) -> StatusCode {
    match err {
        HospitalError::NotFound(_) => StatusCode::NOT_FOUND,
        HospitalError::Validation(_)
        | HospitalError::InsufficientStock { .. }
        | HospitalError::InvalidStateTransition { .. }
        | HospitalError::Conflict(_) => StatusCode::BAD_REQUEST,
        HospitalError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        HospitalError::Forbidden(_) => StatusCode::FORBIDDEN,
        HospitalError::Config(_)
        | HospitalError::Database(_)
        | HospitalError::Network(_)
        | HospitalError::Serialization(_)
        | HospitalError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn client_message(err: &HospitalError) -> String {
    match err {
        HospitalError::NotFound(msg)
        | HospitalError::Validation(msg)
        | HospitalError::Conflict(msg)
        | HospitalError::Unauthorized(msg)
        | HospitalError::Forbidden(msg) => msg.clone(),
        HospitalError::InsufficientStock { .. } => err.to_string(),
        HospitalError::InvalidStateTransition { from, event } => {
            format!("invalid state transition: cannot {} from {}", event, from)
        }
        _ => "internal server error".to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_code(&self.0);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }

        let body = Json(json!({
            "error": true,
            "message": client_message(&self.0),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_code(&HospitalError::not_found("x")), StatusCode::NOT_FOUND);
        assert_eq!(status_code(&HospitalError::validation("x")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_code(&HospitalError::InsufficientStock { available: 7, requested: 10 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_code(&HospitalError::Conflict("dup".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_code(&HospitalError::Unauthorized("x".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_code(&HospitalError::Forbidden("x".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_code(&HospitalError::Database("boom".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let err = HospitalError::Database("password authentication failed".to_string());
        assert_eq!(client_message(&err), "internal server error");

        let err = HospitalError::InsufficientStock { available: 7, requested: 10 };
        let msg = client_message(&err);
        assert!(msg.contains("insufficient stock"));
        assert!(msg.contains('7'));
    }
}
