//! 日志初始化
//!
//! 基于 tracing-subscriber 的 EnvFilter，格式支持 compact 与 full

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// 构造过滤器：命令行覆盖优先，其次 `RUST_LOG`，最后使用配置中的级别
pub fn build_filter(config: &LoggingConfig, level_override: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = level_override {
        return EnvFilter::try_new(level)
            .map_err(|e| anyhow::anyhow!("Invalid log level '{}': {}", level, e));
    }

    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| anyhow::anyhow!("Invalid log level '{}': {}", config.level, e)),
    }
}

/// 初始化全局日志订阅者，只能调用一次
pub fn init_logging(config: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    let filter = build_filter(config, level_override)?;

    let result = match config.format.as_str() {
        "full" => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        _ => tracing_subscriber::fmt()
            .compact()
            .with_target(false)
            .with_env_filter(filter)
            .try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_override_wins() {
        let config = LoggingConfig::default();
        let filter = build_filter(&config, Some("debug")).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let config = LoggingConfig::default();
        assert!(build_filter(&config, Some("hospital_web=loud")).is_err());
    }
}
