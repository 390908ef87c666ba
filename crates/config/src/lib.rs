//! libris-config - 配置加载库
//!
//! 配置来源（后者覆盖前者）：
//! 0. `APP_ENV` 环境变量决定 `app_env`（缺省 `development`）
//! 1. `{config_dir}/default.toml`
//! 2. `{config_dir}/{APP_ENV}.toml`
//! 3. `LIBRIS_` 前缀的环境变量，`__` 作为层级分隔符，例如 `LIBRIS_CACHE__L1_TTL_SECS`

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::Secret;
use serde::Deserialize;
use thiserror::Error;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "LIBRIS_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Redis 配置
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Secret<String>,
    #[serde(default)]
    pub database: u8,
    /// 启动时写入 `notify-keyspace-events` 的值，为空则不修改服务端配置
    #[serde(default = "default_notify_keyspace_events")]
    pub notify_keyspace_events: String,
}

fn default_notify_keyspace_events() -> String {
    "Ex".to_string()
}

/// 多级缓存配置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// L1（进程内）默认 TTL（秒）
    pub l1_ttl_secs: u64,
    /// L2（Redis）默认 TTL（秒）
    pub l2_ttl_secs: u64,
    #[serde(default = "default_invalidation_channel")]
    pub invalidation_channel: String,
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,
    #[serde(default = "default_scan_count")]
    pub scan_count: usize,
    #[serde(default = "default_l1_max_capacity")]
    pub l1_max_capacity: u64,
}

fn default_invalidation_channel() -> String {
    "cache:invalidation".to_string()
}

fn default_remote_timeout_ms() -> u64 {
    500
}

fn default_scan_count() -> usize {
    100
}

fn default_l1_max_capacity() -> u64 {
    10_000
}

impl CacheSettings {
    pub fn l1_ttl(&self) -> Duration {
        Duration::from_secs(self.l1_ttl_secs)
    }

    pub fn l2_ttl(&self) -> Duration {
        Duration::from_secs(self.l2_ttl_secs)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_app_env")]
    pub app_env: String,
    pub redis: RedisConfig,
    pub cache: CacheSettings,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_app_name() -> String {
    "libris".to_string()
}

fn default_app_env() -> String {
    "development".to_string()
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| default_app_env());

        let figment = Self::base(&env)
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)));

        Self::extract(figment)
    }

    /// 只从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| default_app_env());
        Self::extract(Self::base(&env))
    }

    /// 选中的环境即 `app_env` 的初始值，文件和 `LIBRIS_APP_ENV` 仍可覆盖
    fn base(env: &str) -> Figment {
        Figment::from(Serialized::default("app_env", env))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// 校验取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.l1_ttl_secs == 0 {
            return Err(ConfigError::Invalid("cache.l1_ttl_secs must be > 0".into()));
        }
        if self.cache.l2_ttl_secs == 0 {
            return Err(ConfigError::Invalid("cache.l2_ttl_secs must be > 0".into()));
        }
        if self.cache.remote_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "cache.remote_timeout_ms must be > 0".into(),
            ));
        }
        if self.cache.scan_count == 0 {
            return Err(ConfigError::Invalid("cache.scan_count must be > 0".into()));
        }
        if self.cache.invalidation_channel.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "cache.invalidation_channel must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// 是否为开发环境
    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}

#[cfg(test)]
mod tests;
