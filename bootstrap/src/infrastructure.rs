//! 基础设施资源管理
//!
//! 连接 Redis、构建多级缓存并启动跨实例同步

use std::sync::Arc;

use libris_adapter_redis::{RedisCache, RedisConfig, RedisSubscriber, create_connection_manager};
use libris_cache::{MultiLevelCache, MultiLevelCacheConfig};
use libris_config::AppConfig;
use libris_errors::AppResult;
use secrecy::ExposeSecret;
use tracing::{info, warn};

use crate::retry::{RetryConfig, with_retry};

/// 基础设施资源容器
pub struct Infrastructure {
    cache: Arc<MultiLevelCache>,
}

impl Infrastructure {
    /// 从配置创建基础设施资源
    ///
    /// Redis 连接带重试；订阅连接建立失败直接返回错误，服务不应在没有失效同步的情况下启动
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        let retry_config = RetryConfig::default();
        let redis_config = redis_settings(config);

        // 1. Redis 命令连接
        let redis_conn = with_retry(&retry_config, "Redis connection", || {
            let cfg = redis_config.clone();
            async move { create_connection_manager(&cfg).await }
        })
        .await?;
        info!(database = redis_config.database, "Redis connection created");

        let redis_cache = RedisCache::new(redis_conn);

        // 2. 键空间通知（托管 Redis 可能拒绝 CONFIG）
        match &redis_config.keyspace_events {
            Some(flags) => {
                if let Err(e) = redis_cache.enable_keyspace_notifications(flags).await {
                    warn!(
                        error = %e,
                        "Could not enable keyspace notifications, expiry sync relies on server config"
                    );
                }
            }
            None => info!("Keyspace notification config left unchanged"),
        }

        // 3. 多级缓存 + 专用订阅连接
        let cache = Arc::new(MultiLevelCache::new(
            Arc::new(redis_cache),
            cache_settings(config, &redis_config),
        ));
        let subscriber = Arc::new(RedisSubscriber::new(&redis_config)?);
        cache.start(subscriber).await?;

        Ok(Self { cache })
    }

    /// 多级缓存
    pub fn cache(&self) -> Arc<MultiLevelCache> {
        self.cache.clone()
    }

    /// 停止缓存监听
    pub fn shutdown(&self) {
        self.cache.shutdown();
    }
}

/// 应用配置转为 Redis 适配器配置
pub fn redis_settings(config: &AppConfig) -> RedisConfig {
    RedisConfig::new(config.redis.url.expose_secret().clone())
        .with_database(config.redis.database)
        .with_keyspace_events(config.redis.notify_keyspace_events.clone())
}

/// 应用配置转为多级缓存配置；过期事件只订阅当前数据库
pub fn cache_settings(config: &AppConfig, redis: &RedisConfig) -> MultiLevelCacheConfig {
    let cache = &config.cache;
    MultiLevelCacheConfig {
        l1_ttl: cache.l1_ttl(),
        l2_ttl: cache.l2_ttl(),
        l1_max_capacity: cache.l1_max_capacity,
        invalidation_channel: cache.invalidation_channel.clone(),
        expired_events_pattern: redis.expired_events_channel(),
        remote_timeout: cache.remote_timeout(),
        scan_count: cache.scan_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libris_config::{CacheSettings, RedisConfig as RedisSection, ServerConfig, TelemetryConfig};
    use secrecy::Secret;
    use std::time::Duration;

    fn app_config(database: u8, flags: &str) -> AppConfig {
        AppConfig {
            app_name: "catalog".to_string(),
            app_env: "test".to_string(),
            redis: RedisSection {
                url: Secret::new("redis://:pw@cache:6379".to_string()),
                database,
                notify_keyspace_events: flags.to_string(),
            },
            cache: CacheSettings {
                l1_ttl_secs: 30,
                l2_ttl_secs: 300,
                invalidation_channel: "libris:invalidation".to_string(),
                remote_timeout_ms: 250,
                scan_count: 50,
                l1_max_capacity: 500,
            },
            server: ServerConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }

    #[test]
    fn test_redis_settings() {
        let redis = redis_settings(&app_config(2, "Ex"));
        assert_eq!(redis.url, "redis://:pw@cache:6379");
        assert_eq!(redis.database, 2);
        assert_eq!(redis.keyspace_events.as_deref(), Some("Ex"));

        let unmanaged = redis_settings(&app_config(0, ""));
        assert!(unmanaged.keyspace_events.is_none());
    }

    #[test]
    fn test_cache_settings() {
        let config = app_config(2, "Ex");
        let settings = cache_settings(&config, &redis_settings(&config));

        assert_eq!(settings.l1_ttl, Duration::from_secs(30));
        assert_eq!(settings.l2_ttl, Duration::from_secs(300));
        assert_eq!(settings.l1_max_capacity, 500);
        assert_eq!(settings.invalidation_channel, "libris:invalidation");
        assert_eq!(settings.expired_events_pattern, "__keyevent@2__:expired");
        assert_eq!(settings.remote_timeout, Duration::from_millis(250));
        assert_eq!(settings.scan_count, 50);
    }
}
