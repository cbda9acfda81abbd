//! 用户认证和授权
//!
//! JWT (HS256) 签发与校验、argon2 密码哈希、认证中间件和角色校验

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use hospital_core::{HospitalError, Result, User, UserRole};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// 医护人员（ADMIN 总是允许，无需列出）
pub const STAFF: &[UserRole] = &[UserRole::Doctor, UserRole::Nurse, UserRole::Technician];
/// 临床人员
pub const CLINICIANS: &[UserRole] = &[UserRole::Doctor, UserRole::Nurse];
pub const DOCTORS: &[UserRole] = &[UserRole::Doctor];
pub const NURSES: &[UserRole] = &[UserRole::Nurse];
/// 检验/影像执行人员
pub const LAB_STAFF: &[UserRole] = &[UserRole::Technician, UserRole::Doctor];
pub const ADMIN_ONLY: &[UserRole] = &[];

/// JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 用户ID
    pub sub: String,
    pub username: String,
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

/// 已认证的当前用户，由中间件放入请求扩展
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub role: UserRole,
}

impl CurrentUser {
    /// 角色校验，ADMIN 总是允许
    pub fn require_any(&self, roles: &[UserRole]) -> Result<()> {
        if self.role == UserRole::Admin || roles.contains(&self.role) {
            Ok(())
        } else {
            warn!(user = %self.username, role = %self.role, "Access denied");
            Err(HospitalError::Forbidden(format!(
                "role {} is not allowed to perform this action",
                self.role
            )))
        }
    }
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            role: user.role,
        }
    }
}

/// 令牌服务
#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_expiry: Duration,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("token_expiry", &self.token_expiry)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(jwt_secret: &str, token_expiry_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            token_expiry: Duration::minutes(token_expiry_minutes),
        }
    }

    pub fn token_expiry(&self) -> Duration {
        self.token_expiry
    }

    /// 生成JWT token
    pub fn issue_token(&self, user: &User) -> Result<String> {
        self.issue_token_at(user, Utc::now())
    }

    pub fn issue_token_at(&self, user: &User, now: DateTime<Utc>) -> Result<String> {
        let exp = now + self.token_expiry;
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role.as_str().to_string(),
            exp: exp.timestamp().max(0) as usize,
            iat: now.timestamp().max(0) as usize,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| HospitalError::Internal(format!("failed to sign token: {}", e)))
    }

    /// 验证JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| HospitalError::Unauthorized(format!("invalid token: {}", e)))
    }
}

/// 密码哈希（argon2id）
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HospitalError::Internal(format!("failed to hash password: {}", e)))
}

/// 校验密码，哈希格式错误视为不匹配
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// 认证中间件
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let token = bearer_token(&request)
        .ok_or_else(|| HospitalError::Unauthorized("missing bearer token".to_string()))?;

    let claims = state.auth.verify_token(token)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| HospitalError::Unauthorized("invalid token subject".to_string()))?;

    let user = state
        .queries()
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| HospitalError::Unauthorized("user no longer exists".to_string()))?;
    if !user.is_active {
        return Err(HospitalError::Unauthorized("account is disabled".to_string()).into());
    }

    request.extensions_mut().insert(CurrentUser::from(user));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            username: "bs.lan".to_string(),
            full_name: "Trần Thị Lan".to_string(),
            email: None,
            phone: None,
            role,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_and_verify_token() {
        let auth = AuthService::new("a-test-secret-of-32-characters!!", 30);
        let doctor = user(UserRole::Doctor);

        let token = auth.issue_token(&doctor).unwrap();
        let claims = auth.verify_token(&token).unwrap();
        assert_eq!(claims.sub, doctor.id.to_string());
        assert_eq!(claims.role, "DOCTOR");
        assert_eq!(claims.username, "bs.lan");
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let auth = AuthService::new("a-test-secret-of-32-characters!!", 30);
        let issued = Utc::now() - Duration::minutes(31);
        let token = auth.issue_token_at(&user(UserRole::Nurse), issued).unwrap();

        let err = auth.verify_token(&token).unwrap_err();
        assert!(matches!(err, HospitalError::Unauthorized(_)));
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let issuer = AuthService::new("first-secret-with-enough-length", 30);
        let verifier = AuthService::new("second-secret-with-enough-length", 30);
        let token = issuer.issue_token(&user(UserRole::Admin)).unwrap();
        assert!(verifier.verify_token(&token).is_err());
    }

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret-pass", &hash));
        assert!(!verify_password("wrong-pass", &hash));
        assert!(!verify_password("s3cret-pass", "plaintext"));
    }

    #[test]
    fn test_role_guard() {
        let nurse = CurrentUser::from(user(UserRole::Nurse));
        assert!(nurse.require_any(CLINICIANS).is_ok());
        assert!(nurse.require_any(DOCTORS).is_err());
        assert!(matches!(
            nurse.require_any(ADMIN_ONLY),
            Err(HospitalError::Forbidden(_))
        ));

        let admin = CurrentUser::from(user(UserRole::Admin));
        assert!(admin.require_any(ADMIN_ONLY).is_ok());
        assert!(admin.require_any(LAB_STAFF).is_ok());

        let patient = CurrentUser::from(user(UserRole::Patient));
        assert!(patient.require_any(STAFF).is_err());
    }
}
