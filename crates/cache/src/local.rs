//! L1 进程内缓存
//!
//! 基于 Moka，每个条目有自己的 TTL，过期条目由 Moka 的后台维护清理。
//! 所有操作都是同步的，不会挂起。

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::sync::Cache as MokaCache;
use serde_json::Value;

use crate::pattern::KeyPattern;

#[derive(Debug, Clone)]
struct LocalEntry {
    value: Value,
    ttl: Duration,
    expires_at: Instant,
}

impl LocalEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// 按条目自身的 TTL 过期；覆盖写入时重新计时
struct EntryTtl;

impl Expiry<String, LocalEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &LocalEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &LocalEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// L1 存储
#[derive(Clone)]
pub struct LocalStore {
    entries: MokaCache<String, LocalEntry>,
}

impl LocalStore {
    pub fn new(max_capacity: u64) -> Self {
        let entries = MokaCache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryTtl)
            .build();

        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.value)
    }

    pub fn insert(&self, key: &str, value: Value, ttl: Duration) {
        let entry = LocalEntry {
            value,
            ttl,
            expires_at: Instant::now() + ttl,
        };
        self.entries.insert(key.to_string(), entry);
    }

    /// 删除单个键，返回键之前是否存在
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// 删除所有匹配模式的键，返回删除数量
    pub fn remove_matching(&self, pattern: &KeyPattern) -> usize {
        let matched: Vec<Arc<String>> = self
            .entries
            .iter()
            .map(|(key, _)| key)
            .filter(|key| pattern.matches(key))
            .collect();

        matched
            .iter()
            .filter(|key| self.entries.remove(key.as_str()).is_some())
            .count()
    }

    /// 当前有效的键
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, _)| key.as_ref().clone())
            .collect();
        keys.sort();
        keys
    }

    /// 当前有效的键值对
    pub fn entries(&self) -> Vec<(String, Value)> {
        let now = Instant::now();
        let mut entries: Vec<(String, Value)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, entry)| (key.as_ref().clone(), entry.value))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}
