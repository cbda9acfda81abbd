//! 邮件发送
//!
//! `mail.enabled = true` 时走 SMTP，否则只写日志

use std::sync::Arc;

use async_trait::async_trait;
use hospital_admin::MailConfig;
use hospital_core::{HospitalError, Result};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

/// 邮件发送接口
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// 按配置选择发送方式
pub fn build_mailer(config: &MailConfig) -> Result<Arc<dyn Mailer>> {
    if config.enabled {
        info!(server = %config.smtp_server, port = config.smtp_port, "SMTP mail delivery enabled");
        Ok(Arc::new(SmtpMailer::new(config)?))
    } else {
        info!("Mail delivery disabled, messages are only logged");
        Ok(Arc::new(LogMailer::new(config.from_address.clone())))
    }
}

/// 通过 SMTP 发送
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let from: Mailbox = config.from_address.parse().map_err(|e| {
            HospitalError::Config(format!("invalid sender address {}: {}", config.from_address, e))
        })?;

        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_server)
        }
        .map_err(|e| {
            HospitalError::Config(format!("invalid SMTP server {}: {}", config.smtp_server, e))
        })?;

        let mut builder = builder.port(config.smtp_port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let message = build_message(&self.from, to, subject, body)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| HospitalError::Internal(format!("SMTP delivery to {} failed: {}", to, e)))?;

        info!(to = %to, subject = %subject, "Mail sent");
        Ok(())
    }
}

/// 纯文本邮件
fn build_message(from: &Mailbox, to: &str, subject: &str, body: &str) -> Result<Message> {
    let to: Mailbox = to
        .parse()
        .map_err(|e| HospitalError::validation(format!("invalid recipient address {}: {}", to, e)))?;

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| HospitalError::Internal(format!("failed to build mail: {}", e)))
}

/// 把邮件写入日志，不真正发送
#[derive(Debug, Clone)]
pub struct LogMailer {
    from_address: String,
}

impl LogMailer {
    pub fn new(from_address: impl Into<String>) -> Self {
        Self {
            from_address: from_address.into(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        info!(from = %self.from_address, to = %to, subject = %subject, "Mail delivery disabled, message dropped");
        tracing::debug!(body = %body, "Mail body");
        Ok(())
    }
}

/// 重置密码邮件正文
pub fn otp_mail_body(full_name: &str, otp: &str, expiry_minutes: i64) -> String {
    format!(
        "Xin chào {},\n\nMã xác thực (OTP) của bạn là: {}\nMã này sẽ hết hạn sau {} phút.\n",
        full_name, otp, expiry_minutes
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_mailer_accepts_messages() {
        let mailer = LogMailer::new("no-reply@hospital.local");
        assert!(mailer.send("a@b.vn", "OTP", "123456").await.is_ok());
    }

    #[tokio::test]
    async fn test_disabled_config_builds_log_mailer() {
        let mailer = build_mailer(&MailConfig::default()).unwrap();
        assert!(mailer.send("a@b.vn", "OTP", "123456").await.is_ok());
    }

    #[test]
    fn test_smtp_mailer_rejects_bad_sender() {
        let config = MailConfig {
            enabled: true,
            from_address: "not an address".to_string(),
            ..MailConfig::default()
        };
        assert!(matches!(SmtpMailer::new(&config), Err(HospitalError::Config(_))));
    }

    #[test]
    fn test_build_message_checks_recipient() {
        let from: Mailbox = "Hospital <no-reply@hospital.local>".parse().unwrap();

        let message = build_message(&from, "patient@example.vn", "OTP", "042917").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: patient@example.vn"));
        assert!(raw.contains("042917"));

        let err = build_message(&from, "nobody", "OTP", "042917").unwrap_err();
        assert!(matches!(err, HospitalError::Validation(_)));
    }

    #[test]
    fn test_otp_body_contains_code() {
        let body = otp_mail_body("Lê Minh", "042917", 15);
        assert!(body.contains("042917"));
        assert!(body.contains("15"));
    }
}
