//! 应用运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 场景输入文件（节点/属性/元数据的 JSON 导出）。
    pub scene_file: String,
    /// 认证 profile 文件路径，可缺省。
    pub profiles_file: Option<String>,
    pub default_timeout_ms: u64,
    pub default_retry_count: u32,
    pub default_poll_interval_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub stream_buffer_capacity: usize,
    /// 连续失败到该阈值的流会话转入重连。
    pub failure_threshold: u32,
    /// 变量缺失时会话直接判失败；关闭则替换为空串并告警。
    pub strict_variables: bool,
    /// 全局变量（`SGBIND_VAR_<NAME>=value`）。
    pub global_vars: Vec<(String, String)>,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let scene_file = env::var("SGBIND_SCENE_FILE")
            .map_err(|_| ConfigError::Missing("SGBIND_SCENE_FILE".to_string()))?;
        let profiles_file = read_optional("SGBIND_PROFILES_FILE");
        let default_timeout_ms = read_u64_with_default("SGBIND_DEFAULT_TIMEOUT_MS", 10_000)?;
        let default_retry_count = read_u32_with_default("SGBIND_DEFAULT_RETRY_COUNT", 3)?;
        let default_poll_interval_ms =
            read_u64_with_default("SGBIND_DEFAULT_POLL_INTERVAL_MS", 5_000)?;
        let backoff_base_ms = read_u64_with_default("SGBIND_BACKOFF_BASE_MS", 500)?;
        let backoff_cap_ms = read_u64_with_default("SGBIND_BACKOFF_CAP_MS", 30_000)?;
        let stream_buffer_capacity =
            read_u64_with_default("SGBIND_STREAM_BUFFER_CAPACITY", 32)? as usize;
        let failure_threshold = read_u32_with_default("SGBIND_FAILURE_THRESHOLD", 5)?;
        let strict_variables = read_bool_with_default("SGBIND_STRICT_VARIABLES", true);
        let global_vars = read_global_vars();

        Ok(Self {
            scene_file,
            profiles_file,
            default_timeout_ms,
            default_retry_count,
            default_poll_interval_ms,
            backoff_base_ms,
            backoff_cap_ms,
            stream_buffer_capacity,
            failure_threshold,
            strict_variables,
            global_vars,
        })
    }
}

/// `SGBIND_VAR_<NAME>=value` 形式的全局变量，变量名取小写。
fn read_global_vars() -> Vec<(String, String)> {
    let mut vars: Vec<(String, String)> = env::vars()
        .filter_map(|(key, value)| {
            key.strip_prefix("SGBIND_VAR_")
                .filter(|name| !name.is_empty())
                .map(|name| (name.to_ascii_lowercase(), value))
        })
        .collect();
    vars.sort();
    vars
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u32_with_default(key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
