//! 通用工具函数

use rand::Rng;
use regex::Regex;
use std::sync::OnceLock;

/// 空白字符串视为未填写
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// 验证电话号码格式（9-15位数字，可带+前缀）
pub fn is_valid_phone(phone: &str) -> bool {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE
        .get_or_init(|| Regex::new(r"^\+?[0-9]{9,15}$").expect("valid phone regex"))
        .is_match(phone)
}

/// 验证身份证号（12位数字）
pub fn is_valid_cccd(cccd: &str) -> bool {
    cccd.len() == 12 && cccd.chars().all(|c| c.is_ascii_digit())
}

/// 简单的邮箱格式校验
pub fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"))
        .is_match(email)
}

/// 生成6位数字验证码
pub fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    (0..6).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_optional() {
        assert_eq!(normalize_optional(Some("  ".to_string())), None);
        assert_eq!(normalize_optional(None), None);
        assert_eq!(normalize_optional(Some(" 0901 ".to_string())), Some("0901".to_string()));
    }

    #[test]
    fn test_is_valid_phone() {
        assert!(is_valid_phone("0901234567"));
        assert!(is_valid_phone("+84901234567"));
        assert!(!is_valid_phone("09-01"));
        assert!(!is_valid_phone(""));
    }

    #[test]
    fn test_is_valid_cccd() {
        assert!(is_valid_cccd("001203004567"));
        assert!(!is_valid_cccd("12345"));
        assert!(!is_valid_cccd("00120300456a"));
    }

    #[test]
    fn test_generate_otp() {
        let otp = generate_otp();
        assert_eq!(otp.len(), 6);
        assert!(otp.chars().all(|c| c.is_ascii_digit()));
    }
}
