use super::DatabaseQueries;
use crate::models::*;
use chrono::{DateTime, Utc};
use hospital_core::{HospitalError, Result, User, UserRole};
use uuid::Uuid;

/// 验证码连续输错次数上限，达到后作废
pub const MAX_OTP_ATTEMPTS: i32 = 5;

/// 验证码校验结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OtpCheck {
    Valid,
    Wrong,
    Expired,
}

fn check_otp(token: &DbResetToken, otp: &str, now: DateTime<Utc>) -> OtpCheck {
    match (&token.reset_token, token.reset_token_exp) {
        (Some(expected), _) if expected != otp => OtpCheck::Wrong,
        (None, _) => OtpCheck::Wrong,
        (Some(_), Some(exp)) if exp >= now => OtpCheck::Valid,
        _ => OtpCheck::Expired,
    }
}

const USER_COLUMNS: &str =
    "id, username, full_name, email, phone, role, is_active, created_at";

impl<'a> DatabaseQueries<'a> {
    // ========== 用户相关操作 ==========

    /// 创建用户，用户名重复返回冲突
    pub async fn create_user(&self, user: &NewUser) -> Result<User> {
        let pool = self.pool.pool();

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                .bind(&user.username)
                .fetch_one(pool)
                .await?;
        if exists {
            return Err(HospitalError::Conflict(format!(
                "username '{}' already exists",
                user.username
            )));
        }

        let row = sqlx::query_as::<_, DbUser>(&format!(
            r#"
            INSERT INTO users (id, username, password_hash, full_name, email, phone, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .fetch_one(pool)
        .await?;

        tracing::info!(username = %user.username, role = %user.role, "User created");
        Ok(row.into())
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbUser>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(result.map(User::from))
    }

    /// 按用户名取登录凭据
    pub async fn get_user_credentials(&self, username: &str) -> Result<Option<DbUserCredentials>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbUserCredentials>(&format!(
            "SELECT {}, password_hash FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(pool)
        .await?;

        Ok(result)
    }

    pub async fn count_users(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool.pool())
            .await?;
        Ok(count)
    }

    /// 员工列表（不含患者账户）
    pub async fn list_staff(&self) -> Result<Vec<User>> {
        self.list_users_by_roles(&[
            UserRole::Admin,
            UserRole::Doctor,
            UserRole::Nurse,
            UserRole::Technician,
        ])
        .await
    }

    pub async fn list_doctors(&self) -> Result<Vec<User>> {
        self.list_users_by_roles(&[UserRole::Doctor]).await
    }

    async fn list_users_by_roles(&self, roles: &[UserRole]) -> Result<Vec<User>> {
        let roles: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();

        let results = sqlx::query_as::<_, DbUser>(&format!(
            "SELECT {} FROM users WHERE role = ANY($1) AND is_active ORDER BY full_name",
            USER_COLUMNS
        ))
        .bind(&roles)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(results.into_iter().map(User::from).collect())
    }

    /// 更新个人资料，未提供的字段保持不变
    pub async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<User> {
        let result = sqlx::query_as::<_, DbUser>(&format!(
            r#"
            UPDATE users SET
                full_name = COALESCE($2, full_name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                password_hash = COALESCE($5, password_hash)
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(&update.full_name)
        .bind(&update.email)
        .bind(&update.phone)
        .bind(&update.password_hash)
        .fetch_optional(self.pool.pool())
        .await?;

        result
            .map(User::from)
            .ok_or_else(|| HospitalError::not_found("user not found"))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let result = sqlx::query_as::<_, DbUser>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(result.map(User::from))
    }

    /// 保存密码重置验证码
    pub async fn set_reset_token(
        &self,
        user_id: Uuid,
        otp: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE users SET reset_token = $2, reset_token_exp = $3, reset_attempts = 0 WHERE id = $1",
        )
        .bind(user_id)
        .bind(otp)
        .bind(expires_at)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    /// 校验验证码并设置新密码。验证码使用后清除，连续输错
    /// [`MAX_OTP_ATTEMPTS`] 次后作废
    pub async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = self.pool.pool().begin().await?;

        let token = sqlx::query_as::<_, DbResetToken>(
            "SELECT id, reset_token, reset_token_exp, reset_attempts FROM users WHERE email = $1 FOR UPDATE",
        )
        .bind(email)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| HospitalError::not_found("user not found"))?;

        match check_otp(&token, otp, now) {
            OtpCheck::Valid => {}
            OtpCheck::Expired => return Err(HospitalError::validation("OTP has expired")),
            OtpCheck::Wrong => {
                if token.reset_token.is_some() {
                    let attempts = token.reset_attempts + 1;
                    if attempts >= MAX_OTP_ATTEMPTS {
                        sqlx::query(
                            r#"
                            UPDATE users
                            SET reset_token = NULL, reset_token_exp = NULL, reset_attempts = 0
                            WHERE id = $1
                            "#,
                        )
                        .bind(token.id)
                        .execute(&mut *tx)
                        .await?;
                        tracing::warn!(user_id = %token.id, "Reset OTP revoked after too many failed attempts");
                    } else {
                        sqlx::query("UPDATE users SET reset_attempts = $2 WHERE id = $1")
                            .bind(token.id)
                            .bind(attempts)
                            .execute(&mut *tx)
                            .await?;
                    }
                    tx.commit().await?;
                }
                return Err(HospitalError::validation("invalid OTP"));
            }
        }

        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, reset_token = NULL, reset_token_exp = NULL, reset_attempts = 0
            WHERE id = $1
            "#,
        )
        .bind(token.id)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(user_id = %token.id, "Password reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::test_pool;
    use chrono::Duration;

    fn token(code: Option<&str>, exp: Option<DateTime<Utc>>) -> DbResetToken {
        DbResetToken {
            id: Uuid::new_v4(),
            reset_token: code.map(str::to_string),
            reset_token_exp: exp,
            reset_attempts: 0,
        }
    }

    #[test]
    fn test_check_otp() {
        let now = Utc::now();
        let live = token(Some("042917"), Some(now + Duration::minutes(10)));
        assert_eq!(check_otp(&live, "042917", now), OtpCheck::Valid);
        assert_eq!(check_otp(&live, "000000", now), OtpCheck::Wrong);

        let stale = token(Some("042917"), Some(now - Duration::minutes(1)));
        assert_eq!(check_otp(&stale, "042917", now), OtpCheck::Expired);
        // 错误的验证码不泄露是否过期
        assert_eq!(check_otp(&stale, "000000", now), OtpCheck::Wrong);

        let revoked = token(None, None);
        assert_eq!(check_otp(&revoked, "042917", now), OtpCheck::Wrong);
    }

    #[tokio::test]
    async fn test_reset_token_revoked_after_repeated_wrong_codes() {
        let Some(pool) = test_pool().await else { return };
        let queries = DatabaseQueries::new(&pool);

        let tag = Uuid::new_v4().simple().to_string();
        let email = format!("otp_{}@example.vn", &tag[..8]);
        let user = queries
            .create_user(&NewUser {
                username: format!("otp_{}", &tag[..8]),
                password_hash: "old-hash".to_string(),
                full_name: "Phạm Thu Hà".to_string(),
                email: Some(email.clone()),
                phone: None,
                role: UserRole::Patient,
            })
            .await
            .unwrap();

        let now = Utc::now();
        queries
            .set_reset_token(user.id, "042917", now + Duration::minutes(15))
            .await
            .unwrap();

        for _ in 0..MAX_OTP_ATTEMPTS {
            let err = queries
                .reset_password(&email, "000000", "new-hash", now)
                .await
                .unwrap_err();
            assert!(matches!(err, HospitalError::Validation(_)));
        }

        // 正确的验证码也已失效
        let err = queries
            .reset_password(&email, "042917", "new-hash", now)
            .await
            .unwrap_err();
        assert!(matches!(err, HospitalError::Validation(_)));

        let credentials = queries
            .get_user_credentials(&user.username)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(credentials.password_hash, "old-hash");
    }
}
