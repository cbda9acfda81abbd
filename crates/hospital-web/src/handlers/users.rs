//! 账户、登录与密码找回

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use chrono::{Duration, Utc};
use hospital_core::{
    utils::{generate_otp, is_valid_email, is_valid_phone, normalize_optional},
    HospitalError, Result, User, UserRole,
};
use hospital_database::{NewUser, ProfileUpdate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::auth::{self, CurrentUser, ADMIN_ONLY};
use crate::error::ApiResult;
use crate::mailer::otp_mail_body;
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 6;

/// 登录请求
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// 登录响应
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// 有效期（秒）
    pub expires_in: i64,
    pub user: User,
}

/// 患者自助注册
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// 管理员创建员工账号
#[derive(Debug, Deserialize)]
pub struct CreateStaffRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub role: UserRole,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(HospitalError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn validate_contact(email: &Option<String>, phone: &Option<String>) -> Result<()> {
    if let Some(email) = email {
        if !is_valid_email(email) {
            return Err(HospitalError::validation("invalid email"));
        }
    }
    if let Some(phone) = phone {
        if !is_valid_phone(phone) {
            return Err(HospitalError::validation("invalid phone number"));
        }
    }
    Ok(())
}

/// 哈希在阻塞线程池中执行
async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .map_err(|e| HospitalError::Internal(format!("password hashing task failed: {}", e)))?
}

async fn new_account(
    username: String,
    password: String,
    full_name: String,
    email: Option<String>,
    phone: Option<String>,
    role: UserRole,
) -> Result<NewUser> {
    let username = username.trim().to_string();
    let full_name = full_name.trim().to_string();
    if username.is_empty() {
        return Err(HospitalError::validation("username is required"));
    }
    if full_name.is_empty() {
        return Err(HospitalError::validation("full_name is required"));
    }
    validate_password(&password)?;

    let email = normalize_optional(email);
    let phone = normalize_optional(phone);
    validate_contact(&email, &phone)?;

    Ok(NewUser {
        username,
        password_hash: hash_password(password).await?,
        full_name,
        email,
        phone,
        role,
    })
}

/// 登录处理器
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    info!("Login attempt for user: {}", request.username);

    let credentials = state
        .queries()
        .get_user_credentials(request.username.trim())
        .await?;

    let Some(credentials) = credentials else {
        warn!("Login failed: unknown user {}", request.username);
        return Err(HospitalError::Unauthorized("incorrect username or password".to_string()).into());
    };

    let password = request.password;
    let hash = credentials.password_hash;
    let matches = tokio::task::spawn_blocking(move || auth::verify_password(&password, &hash))
        .await
        .map_err(|e| HospitalError::Internal(format!("password check task failed: {}", e)))?;
    if !matches {
        warn!("Login failed: wrong password for {}", request.username);
        return Err(HospitalError::Unauthorized("incorrect username or password".to_string()).into());
    }

    let user = User::from(credentials.user);
    if !user.is_active {
        warn!("Login rejected: account disabled for {}", user.username);
        return Err(HospitalError::Forbidden("account is disabled".to_string()).into());
    }

    let access_token = state.auth.issue_token(&user)?;
    info!("User logged in successfully: {}", user.username);

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer",
        expires_in: state.auth.token_expiry().num_seconds(),
        user,
    }))
}

/// 患者注册，角色固定为 PATIENT
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let account = new_account(
        request.username,
        request.password,
        request.full_name,
        request.email,
        request.phone,
        UserRole::Patient,
    )
    .await?;

    let user = state.queries().create_user(&account).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// 创建员工账号（仅管理员）
pub async fn create_staff(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<CreateStaffRequest>,
) -> ApiResult<impl IntoResponse> {
    current.require_any(ADMIN_ONLY)?;
    if !request.role.is_staff() {
        return Err(HospitalError::validation("staff accounts cannot have the PATIENT role").into());
    }

    let account = new_account(
        request.username,
        request.password,
        request.full_name,
        request.email,
        request.phone,
        request.role,
    )
    .await?;

    let user = state.queries().create_user(&account).await?;
    info!(admin = %current.username, username = %user.username, role = %user.role, "Staff account created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// 员工列表（仅管理员）
pub async fn list_staff(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<User>>> {
    current.require_any(ADMIN_ONLY)?;
    Ok(Json(state.queries().list_staff().await?))
}

/// 医生列表（公开，用于预约）
pub async fn list_doctors(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.queries().list_doctors().await?))
}

/// 获取当前用户信息
pub async fn me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<User>> {
    let user = state
        .queries()
        .get_user_by_id(current.id)
        .await?
        .ok_or_else(|| HospitalError::not_found("user not found"))?;
    Ok(Json(user))
}

/// 更新当前用户资料
pub async fn update_me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(request): Json<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    let email = normalize_optional(request.email);
    let phone = normalize_optional(request.phone);
    validate_contact(&email, &phone)?;

    let password_hash = match request.password {
        Some(password) => {
            validate_password(&password)?;
            Some(hash_password(password).await?)
        }
        None => None,
    };

    let update = ProfileUpdate {
        full_name: normalize_optional(request.full_name),
        email,
        phone,
        password_hash,
    };
    let user = state.queries().update_profile(current.id, &update).await?;
    info!(user = %current.username, "Profile updated");
    Ok(Json(user))
}

/// 发送重置密码验证码
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = request.email.trim();
    let user = state
        .queries()
        .find_user_by_email(email)
        .await?
        .ok_or_else(|| HospitalError::not_found("email not found"))?;

    let otp = generate_otp();
    let expiry_minutes = state.config.auth.otp_expiry_minutes;
    let expires_at = Utc::now() + Duration::minutes(expiry_minutes);
    state.queries().set_reset_token(user.id, &otp, expires_at).await?;

    state
        .mailer
        .send(
            email,
            "[Hospital App] Password reset code",
            &otp_mail_body(&user.full_name, &otp, expiry_minutes),
        )
        .await?;

    info!(user_id = %user.id, "Password reset code issued");
    Ok(Json(json!({ "message": "OTP has been sent to your email" })))
}

/// 使用验证码重置密码
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_password(&request.new_password)?;
    let password_hash = hash_password(request.new_password).await?;

    state
        .queries()
        .reset_password(request.email.trim(), request.otp.trim(), &password_hash, Utc::now())
        .await?;

    Ok(Json(json!({ "message": "Password has been reset" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_length() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn test_contact_validation() {
        assert!(validate_contact(&Some("a@b.vn".to_string()), &None).is_ok());
        assert!(validate_contact(&Some("not-an-email".to_string()), &None).is_err());
        assert!(validate_contact(&None, &Some("12ab".to_string())).is_err());
    }

    #[tokio::test]
    async fn test_new_account_trims_and_hashes() {
        let account = new_account(
            "  letan01 ".to_string(),
            "matkhau123".to_string(),
            " Phạm Thu Hà ".to_string(),
            Some(" ".to_string()),
            None,
            UserRole::Nurse,
        )
        .await
        .unwrap();

        assert_eq!(account.username, "letan01");
        assert_eq!(account.full_name, "Phạm Thu Hà");
        assert_eq!(account.email, None);
        assert!(auth::verify_password("matkhau123", &account.password_hash));
    }
}
