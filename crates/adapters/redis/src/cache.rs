//! Redis Cache 实现

use async_trait::async_trait;
use libris_errors::{AppError, AppResult};
use libris_ports::{CachePort, ScanPage};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::{debug, info};

fn redis_error(op: &str, e: redis::RedisError) -> AppError {
    if e.is_timeout() {
        AppError::timeout(format!("Redis {} timed out: {}", op, e))
    } else {
        AppError::external_service(format!("Redis {} failed: {}", op, e))
    }
}

/// TTL 转为 PSETEX 的毫秒数，不足 1ms 按 1ms 计
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Redis Cache
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// 开启键空间通知（CONFIG SET notify-keyspace-events）
    ///
    /// 托管 Redis 往往禁用 CONFIG 命令，调用方应将失败视为警告
    pub async fn enable_keyspace_notifications(&self, flags: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("CONFIG")
            .arg("SET")
            .arg("notify-keyspace-events")
            .arg(flags)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| redis_error("config set", e))?;

        info!(flags = %flags, "Redis keyspace notifications enabled");
        Ok(())
    }
}

#[async_trait]
impl CachePort for RedisCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(|e| redis_error("get", e))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(duration) => conn
                .pset_ex(key, value, ttl_millis(duration))
                .await
                .map_err(|e| redis_error("set", e)),
            None => conn.set(key, value).await.map_err(|e| redis_error("set", e)),
        }
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| redis_error("delete", e))
    }

    async fn delete_many(&self, keys: &[String]) -> AppResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        conn.del(keys).await.map_err(|e| redis_error("delete", e))
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> AppResult<ScanPage> {
        let mut conn = self.conn.clone();
        let (cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("scan", e))?;

        debug!(pattern = %pattern, cursor, found = keys.len(), "Redis scan page");
        Ok(ScanPage { cursor, keys })
    }

    async fn publish(&self, channel: &str, payload: &str) -> AppResult<u64> {
        let mut conn = self.conn.clone();
        let receivers: u64 = conn
            .publish(channel, payload)
            .await
            .map_err(|e| redis_error("publish", e))?;

        debug!(channel = %channel, receivers, "Message published");
        Ok(receivers)
    }

    async fn ping(&self) -> AppResult<()> {
        let mut conn = self.conn.clone();
        crate::connection::check_connection(&mut conn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedisConfig;
    use crate::connection::create_connection_manager;

    #[test]
    fn test_ttl_millis() {
        assert_eq!(ttl_millis(Duration::from_secs(2)), 2000);
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::ZERO), 1);
    }

    async fn connect() -> RedisCache {
        let conn = create_connection_manager(&RedisConfig::default())
            .await
            .unwrap();
        RedisCache::new(conn)
    }

    #[tokio::test]
    #[ignore] // 需要 Redis 实例
    async fn test_set_get_delete() {
        let cache = connect().await;
        cache
            .set("libris:test:a", "1", Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(cache.get("libris:test:a").await.unwrap().as_deref(), Some("1"));

        cache.delete("libris:test:a").await.unwrap();
        assert_eq!(cache.get("libris:test:a").await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore] // 需要 Redis 实例
    async fn test_scan_and_delete_many() {
        let cache = connect().await;
        for i in 0..5 {
            cache
                .set(&format!("libris:scan:{}", i), "x", None)
                .await
                .unwrap();
        }

        let mut cursor = 0;
        let mut found = Vec::new();
        loop {
            let page = cache.scan(cursor, "libris:scan:*", 2).await.unwrap();
            found.extend(page.keys);
            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }
        found.sort();
        found.dedup();
        assert_eq!(found.len(), 5);

        assert_eq!(cache.delete_many(&found).await.unwrap(), 5);
    }

    #[tokio::test]
    #[ignore] // 需要 Redis 实例
    async fn test_publish_without_subscribers() {
        let cache = connect().await;
        let receivers = cache.publish("libris:test:channel", "hello").await.unwrap();
        assert_eq!(receivers, 0);
    }
}
