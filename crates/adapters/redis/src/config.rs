//! Redis 连接配置

use std::time::Duration;

use libris_errors::{AppError, AppResult};
use redis::{ConnectionInfo, IntoConnectionInfo};

/// Redis 配置
#[derive(Clone)]
pub struct RedisConfig {
    /// Redis URL，可能包含密码
    pub url: String,
    /// 数据库索引，覆盖 URL 中的值
    pub database: u8,
    /// 建立连接的超时
    pub connection_timeout: Duration,
    /// `notify-keyspace-events` 标志，None 表示不修改服务器配置
    pub keyspace_events: Option<String>,
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("url", &"[REDACTED]")
            .field("database", &self.database)
            .field("connection_timeout", &self.connection_timeout)
            .field("keyspace_events", &self.keyspace_events)
            .finish()
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            database: 0,
            connection_timeout: Duration::from_secs(10),
            keyspace_events: Some("Ex".to_string()),
        }
    }
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// 设置数据库索引
    pub fn with_database(mut self, database: u8) -> Self {
        self.database = database;
        self
    }

    /// 设置连接超时
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// 设置键空间通知标志，空字符串表示不修改
    pub fn with_keyspace_events(mut self, flags: impl Into<String>) -> Self {
        let flags = flags.into();
        self.keyspace_events = (!flags.is_empty()).then_some(flags);
        self
    }

    /// 当前数据库的键过期事件频道
    pub fn expired_events_channel(&self) -> String {
        format!("__keyevent@{}__:expired", self.database)
    }

    /// 解析 URL 并应用数据库索引
    pub fn connection_info(&self) -> AppResult<ConnectionInfo> {
        let mut info = self
            .url
            .as_str()
            .into_connection_info()
            .map_err(|e| AppError::configuration(format!("Invalid Redis URL: {}", e)))?;
        info.redis.db = i64::from(self.database);
        Ok(info)
    }
}
