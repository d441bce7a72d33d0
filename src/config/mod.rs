use std::env;
use std::str::FromStr;

use thiserror::Error;

use crate::rate_limit::{EscalatingPolicy, PolicyError, PolicyTable};
use crate::rate_limit::policy::{
    DEFAULT_BLOCK_DURATION_MINUTES, DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW_MINUTES,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
    #[error("REDIS_URL must be set when STORE_BACKEND=redis")]
    MissingRedisUrl,
    #[error("invalid rate limit policy: {0}")]
    Policy(#[from] PolicyError),
}

/// 存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
    /// 未配置存储：表单接口返回内部错误，全局限流直接放行
    Disabled,
}

impl FromStr for StoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            "none" | "disabled" => Ok(Self::Disabled),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub redis_url: Option<String>,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    /// 反向代理写入真实客户端 IP 的请求头
    pub client_ip_header: String,
    /// 是否对所有路由按 IP 启用递增封禁
    pub global_rate_limit: bool,
    pub rate_limits: PolicyTable,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Memory,
            redis_url: None,
            server_host: "::".to_string(),
            server_port: 3000,
            api_base_uri: "/api".to_string(),
            client_ip_header: "cf-connecting-ip".to_string(),
            global_rate_limit: true,
            rate_limits: PolicyTable::default(),
        }
    }
}

// 空值视为未设置
fn var(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(lookup, name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 从任意键值来源读取配置，`from_env` 使用进程环境变量
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let redis_url = var(&lookup, "REDIS_URL");
        let store_backend = match var(&lookup, "STORE_BACKEND") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "STORE_BACKEND",
                    value,
                })?,
            None if redis_url.is_some() => StoreBackend::Redis,
            None => StoreBackend::Disabled,
        };
        if store_backend == StoreBackend::Redis && redis_url.is_none() {
            return Err(ConfigError::MissingRedisUrl);
        }

        let escalating = EscalatingPolicy::new(
            "rate_limit",
            parse_var(&lookup, "RATE_LIMIT_REQUESTS", DEFAULT_MAX_ATTEMPTS)?,
            parse_var(&lookup, "RATE_LIMIT_WINDOW", DEFAULT_WINDOW_MINUTES)?,
            parse_var(&lookup, "RATE_LIMIT_BLOCK_DURATION", DEFAULT_BLOCK_DURATION_MINUTES)?,
        )?;

        Ok(Config {
            store_backend,
            redis_url,
            server_host: var(&lookup, "SERVER_HOST").unwrap_or_else(|| "::".to_string()),
            server_port: parse_var(&lookup, "SERVER_PORT", 3000)?,
            api_base_uri: var(&lookup, "API_BASE_URI").unwrap_or_else(|| "/api".to_string()),
            client_ip_header: var(&lookup, "CLIENT_IP_HEADER")
                .unwrap_or_else(|| "cf-connecting-ip".to_string())
                .to_ascii_lowercase(),
            global_rate_limit: parse_var(&lookup, "RATE_LIMIT_GLOBAL", true)?,
            rate_limits: PolicyTable::default().with_escalating(escalating),
        })
    }
}
