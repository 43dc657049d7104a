//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（lazylearn.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["lazylearn", "lazylearn.local"];

/// 环境变量前缀
const ENV_PREFIX: &str = "LAZYLEARN";

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `LAZYLEARN_`，层级分隔符 `__`）
/// 2. 配置文件（lazylearn.toml 或 lazylearn.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `LAZYLEARN_BACKEND__BASE_URL=http://backend:8000`
/// - `LAZYLEARN_PIPELINE__POLL_INTERVAL_MS=5000`
/// - `LAZYLEARN_LOG__LEVEL=debug`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    build_config(config_path, ENV_PREFIX)
}

fn build_config(config_path: Option<&Path>, env_prefix: &str) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("backend.base_url", "http://127.0.0.1:8000")?
        .set_default("backend.connect_timeout_secs", 10)?
        .set_default("pipeline.poll_interval_ms", 2000)?
        .set_default("log.level", "info")?;

    // 2. 配置文件
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: LAZYLEARN_BACKEND__BASE_URL=http://backend:8000
    builder = builder.add_source(
        Environment::with_prefix(env_prefix)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let base_url = config.backend.base_url.trim();
    if base_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "Backend base URL cannot be empty".to_string(),
        ));
    }

    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "Backend base URL must start with http:// or https://, got {}",
            base_url
        )));
    }

    if config.pipeline.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "Poll interval cannot be 0".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Backend URL: {}", config.backend.base_url);
    tracing::info!("Connect Timeout: {}s", config.backend.connect_timeout_secs);
    tracing::info!("Poll Interval: {}ms", config.pipeline.poll_interval_ms);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_passes_for_valid_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_empty_base_url() {
        let mut config = AppConfig::default();
        config.backend.base_url = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_non_http_base_url() {
        let mut config = AppConfig::default();
        config.backend.base_url = "ftp://backend".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_poll_interval() {
        let mut config = AppConfig::default();
        config.pipeline.poll_interval_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lazylearn.toml");
        std::fs::write(
            &path,
            "[backend]\nbase_url = \"https://learn.example.com\"\n\n[pipeline]\npoll_interval_ms = 750\n",
        )
        .unwrap();

        let config = build_config(Some(&path), "LAZYLEARN_TEST_FILE").unwrap();
        assert_eq!(config.backend.base_url, "https://learn.example.com");
        assert_eq!(config.backend.connect_timeout_secs, 10);
        assert_eq!(config.pipeline.poll_interval_ms, 750);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lazylearn.toml");
        std::fs::write(&path, "[log]\nlevel = \"warn\"\n").unwrap();

        std::env::set_var("LAZYLEARN_TEST_ENV_LOG__LEVEL", "debug");
        let config = build_config(Some(&path), "LAZYLEARN_TEST_ENV").unwrap();
        std::env::remove_var("LAZYLEARN_TEST_ENV_LOG__LEVEL");

        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_invalid_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lazylearn.toml");
        std::fs::write(&path, "[pipeline]\npoll_interval_ms = 0\n").unwrap();

        let err = build_config(Some(&path), "LAZYLEARN_TEST_INVALID").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = build_config(Some(&path), "LAZYLEARN_TEST_MISSING").unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)));
    }
}
