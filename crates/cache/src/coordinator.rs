//! 多级缓存协调器
//!
//! - L1: 进程内 Moka 缓存（快速，但不共享）
//! - L2: 共享缓存（Redis，跨实例共享，但较慢）
//!
//! 写入、删除、模式失效都会通过发布/订阅广播给其它实例，其它实例只做驱逐、不做更新，
//! 下一次读取时从 L2 重新加载。L2 的任何故障都不会返回给调用方：读取降级为未命中，
//! 写入降级为只写 L1，并通过 [`WriteOutcome`] 体现。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use libris_errors::{AppError, AppResult};
use libris_ports::{CachePort, CacheSubscriber, PubSubMessage};
use libris_telemetry::HealthStatus;
use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codec;
use crate::listener;
use crate::local::LocalStore;
use crate::message::{InstanceId, InvalidationMessage};
use crate::pattern::{self, KeyPattern};

/// 多级缓存配置
#[derive(Debug, Clone)]
pub struct MultiLevelCacheConfig {
    /// L1 默认 TTL
    pub l1_ttl: Duration,
    /// L2 TTL，通常比 L1 长
    pub l2_ttl: Duration,
    /// L1 最大条目数
    pub l1_max_capacity: u64,
    /// 失效广播频道
    pub invalidation_channel: String,
    /// 键过期事件的订阅模式
    pub expired_events_pattern: String,
    /// 单次 L2 调用超时
    pub remote_timeout: Duration,
    /// 每次 SCAN 的 COUNT 提示
    pub scan_count: usize,
}

impl Default for MultiLevelCacheConfig {
    fn default() -> Self {
        Self {
            l1_ttl: Duration::from_secs(60),
            l2_ttl: Duration::from_secs(600),
            l1_max_capacity: 10_000,
            invalidation_channel: "cache:invalidation".to_string(),
            expired_events_pattern: "__keyevent@*__:expired".to_string(),
            remote_timeout: Duration::from_millis(500),
            scan_count: 100,
        }
    }
}

/// 写操作结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// L1、L2 和广播都成功
    Durable,
    /// 只有 L1 生效，L2 或广播失败
    LocalOnly,
    /// 值无法序列化或模式无效，没有写入任何一层
    Rejected,
}

impl WriteOutcome {
    fn from_remote(remote_ok: bool) -> Self {
        if remote_ok {
            Self::Durable
        } else {
            Self::LocalOnly
        }
    }
}

/// 模式失效的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationReport {
    pub pattern: String,
    /// 本实例 L1 中删除的键数量
    pub local_evicted: usize,
    /// L2 中删除的键数量
    pub remote_deleted: u64,
    pub outcome: WriteOutcome,
}

/// 多级缓存
pub struct MultiLevelCache {
    local: LocalStore,
    remote: Arc<dyn CachePort>,
    instance_id: InstanceId,
    config: MultiLevelCacheConfig,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl MultiLevelCache {
    pub fn new(remote: Arc<dyn CachePort>, config: MultiLevelCacheConfig) -> Self {
        Self {
            local: LocalStore::new(config.l1_max_capacity),
            remote,
            instance_id: InstanceId::random(),
            config,
            listener: Mutex::new(None),
        }
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    // ============ 读写 ============

    /// 读取：L1 -> L2，L2 命中时回填 L1
    pub async fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.local.get(key) {
            counter!("cache_hits_total", "tier" => "l1").increment(1);
            debug!(key = %key, "Cache hit in L1");
            return Some(value);
        }

        let payload = match self.call_remote("get", key, self.remote.get(key)).await {
            Ok(Some(payload)) => payload,
            Ok(None) | Err(_) => {
                counter!("cache_misses_total").increment(1);
                debug!(key = %key, "Cache miss");
                return None;
            }
        };

        match codec::decode(&payload) {
            Ok(value) => {
                counter!("cache_hits_total", "tier" => "l2").increment(1);
                debug!(key = %key, "Cache hit in L2");
                self.local.insert(key, value.clone(), self.config.l1_ttl);
                Some(value)
            }
            Err(e) => {
                counter!("cache_remote_errors_total", "op" => "decode").increment(1);
                warn!(key = %key, error = %e, "Malformed L2 payload, treating as miss");
                None
            }
        }
    }

    /// 读取并反序列化，类型不匹配时视为未命中
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!(key = %key, error = %e, "Cached value does not match requested type");
                None
            }
        }
    }

    /// 写入：先同步写 L1，再尽力写 L2 并广播失效
    pub async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> WriteOutcome {
        let payload = codec::encode(&value);
        self.local
            .insert(key, value, ttl.unwrap_or(self.config.l1_ttl));

        let stored = match payload {
            Ok(payload) => self
                .call_remote(
                    "set",
                    key,
                    self.remote.set(key, &payload, Some(self.config.l2_ttl)),
                )
                .await
                .is_ok(),
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode value for L2");
                false
            }
        };
        let published = self.broadcast(key).await;

        WriteOutcome::from_remote(stored && published)
    }

    pub async fn set_as<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> WriteOutcome {
        match serde_json::to_value(value) {
            Ok(value) => self.set(key, value, ttl).await,
            Err(e) => {
                warn!(key = %key, error = %e, "Value is not serializable, skipping cache");
                WriteOutcome::Rejected
            }
        }
    }

    /// 删除单个键
    ///
    /// L2 删除完成后再清一次 L1：等待期间的并发读取可能已把旧值回填
    pub async fn delete(&self, key: &str) -> WriteOutcome {
        self.local.remove(key);

        let deleted = self
            .call_remote("delete", key, self.remote.delete(key))
            .await
            .is_ok();
        self.local.remove(key);
        let published = self.broadcast(key).await;

        WriteOutcome::from_remote(deleted && published)
    }

    /// 按模式失效：L1 全部匹配键、L2 游标遍历删除、再清一次 L1，最后广播模式本身
    pub async fn invalidate(&self, pattern: &str) -> InvalidationReport {
        let compiled = match KeyPattern::new(pattern) {
            Ok(compiled) => compiled,
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "Rejecting invalidation");
                return InvalidationReport {
                    pattern: pattern.to_string(),
                    local_evicted: 0,
                    remote_deleted: 0,
                    outcome: WriteOutcome::Rejected,
                };
            }
        };

        let mut local_evicted = self.local.remove_matching(&compiled);
        let swept = self.sweep_remote(&compiled).await;
        // 遍历 L2 期间的并发读取可能回填了旧值，自己的广播又会被忽略
        local_evicted += self.local.remove_matching(&compiled);
        counter!("cache_invalidations_total", "source" => "local").increment(local_evicted as u64);

        let published = self.broadcast(pattern).await;

        let remote_deleted = swept.as_ref().copied().unwrap_or(0);
        info!(
            pattern = %pattern,
            local_evicted,
            remote_deleted,
            "Cache invalidated"
        );

        InvalidationReport {
            pattern: pattern.to_string(),
            local_evicted,
            remote_deleted,
            outcome: WriteOutcome::from_remote(swept.is_ok() && published),
        }
    }

    async fn sweep_remote(&self, pattern: &KeyPattern) -> AppResult<u64> {
        let glob = pattern.to_redis_glob();
        let mut cursor = 0;
        let mut deleted = 0;

        loop {
            let page = self
                .call_remote(
                    "scan",
                    pattern.as_str(),
                    self.remote.scan(cursor, &glob, self.config.scan_count),
                )
                .await?;

            if !page.keys.is_empty() {
                deleted += self
                    .call_remote(
                        "delete",
                        pattern.as_str(),
                        self.remote.delete_many(&page.keys),
                    )
                    .await?;
            }

            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(deleted)
    }

    async fn broadcast(&self, key: &str) -> bool {
        let payload = match InvalidationMessage::new(key, self.instance_id).to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode invalidation message");
                return false;
            }
        };

        self.call_remote(
            "publish",
            key,
            self.remote
                .publish(&self.config.invalidation_channel, &payload),
        )
        .await
        .is_ok()
    }

    /// 所有 L2 调用的统一出口：超时、日志、计数
    async fn call_remote<T>(
        &self,
        op: &'static str,
        target: &str,
        call: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        let result = match tokio::time::timeout(self.config.remote_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AppError::timeout(format!(
                "L2 {} exceeded {}ms",
                op,
                self.config.remote_timeout.as_millis()
            ))),
        };

        if let Err(e) = &result {
            counter!("cache_remote_errors_total", "op" => op).increment(1);
            warn!(op, target = %target, error = %e, "L2 cache call failed, degrading");
        }
        result
    }

    // ============ 跨实例同步 ============

    /// 打开专用订阅连接并启动后台监听
    ///
    /// 订阅连接建立失败时返回错误，调用方应当中止启动
    pub async fn start(self: &Arc<Self>, subscriber: Arc<dyn CacheSubscriber>) -> AppResult<()> {
        let channels = vec![self.config.invalidation_channel.clone()];
        let patterns = vec![self.config.expired_events_pattern.clone()];

        let stream = subscriber
            .subscribe(&channels, &patterns)
            .await
            .map_err(|e| {
                AppError::configuration(format!("Failed to open cache subscription: {}", e))
            })?;

        let handle = tokio::spawn(listener::run(
            Arc::downgrade(self),
            subscriber,
            channels,
            patterns,
            stream,
        ));
        if let Some(previous) = self.listener.lock().replace(handle) {
            previous.abort();
        }

        info!(
            instance_id = %self.instance_id,
            channel = %self.config.invalidation_channel,
            expired_events = %self.config.expired_events_pattern,
            "Cache listeners started"
        );
        Ok(())
    }

    /// 停止后台监听
    pub fn shutdown(&self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
            info!(instance_id = %self.instance_id, "Cache listeners stopped");
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listener
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// 分发订阅连接推送的消息，返回从 L1 驱逐的键数量
    pub fn handle_message(&self, message: &PubSubMessage) -> usize {
        if message.channel == self.config.invalidation_channel {
            self.apply_invalidation(&message.payload)
        } else if message.pattern.is_some() {
            usize::from(self.apply_expiry(&message.payload))
        } else {
            debug!(channel = %message.channel, "Ignoring message on unexpected channel");
            0
        }
    }

    /// 处理其它实例的失效广播；自己发出的消息直接忽略
    pub fn apply_invalidation(&self, payload: &str) -> usize {
        let message = match InvalidationMessage::from_payload(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(payload = %payload, error = %e, "Malformed invalidation message");
                return 0;
            }
        };

        if message.origin == self.instance_id {
            debug!(key = %message.key, "Ignoring self-originated invalidation");
            return 0;
        }

        let evicted = if pattern::is_pattern(&message.key) {
            match KeyPattern::new(&message.key) {
                Ok(compiled) => self.local.remove_matching(&compiled),
                Err(e) => {
                    warn!(pattern = %message.key, error = %e, "Invalid pattern in invalidation message");
                    0
                }
            }
        } else {
            usize::from(self.local.remove(&message.key))
        };

        counter!("cache_invalidations_total", "source" => "remote").increment(evicted as u64);
        debug!(
            key = %message.key,
            origin = %message.origin,
            evicted,
            "Applied remote invalidation"
        );
        evicted
    }

    /// 处理 L2 键过期事件，返回 L1 中是否存在并被驱逐
    pub fn apply_expiry(&self, key: &str) -> bool {
        let evicted = self.local.remove(key);
        if evicted {
            counter!("cache_invalidations_total", "source" => "expired").increment(1);
            debug!(key = %key, "Evicted L1 entry after L2 expiry");
        }
        evicted
    }

    /// 订阅中断期间可能错过失效消息，重连后丢弃整个 L1
    pub(crate) fn reset_local(&self) {
        self.local.clear();
        warn!(instance_id = %self.instance_id, "L1 cache cleared after subscription gap");
    }

    // ============ 运维 ============

    /// L1 中所有有效的键
    pub fn keys(&self) -> Vec<String> {
        self.local.keys()
    }

    /// L1 中所有有效的键值对
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.local.entries()
    }

    pub async fn health(&self) -> HealthStatus {
        let mut status = HealthStatus::new();
        status.add_check(
            "cache.l1",
            true,
            Some(format!("{} entries", self.local.len())),
        );

        match self.call_remote("ping", "-", self.remote.ping()).await {
            Ok(()) => status.add_check("cache.l2", true, None),
            Err(e) => status.add_check("cache.l2", false, Some(e.to_string())),
        }

        status.add_check("cache.listener", self.is_listening(), None);
        status
    }
}

impl Drop for MultiLevelCache {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.get_mut().take() {
            handle.abort();
        }
    }
}
