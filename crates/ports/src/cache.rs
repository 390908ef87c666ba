//! Cache trait 定义

use async_trait::async_trait;
use libris_errors::AppResult;
use std::time::Duration;

/// SCAN 的一页结果，`cursor == 0` 表示遍历结束
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    pub cursor: u64,
    pub keys: Vec<String>,
}

/// 共享缓存 trait（请求/响应命令）
#[async_trait]
pub trait CachePort: Send + Sync {
    /// 获取缓存值
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// 设置缓存值
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()>;

    /// 删除缓存
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// 批量删除，返回实际删除的数量
    async fn delete_many(&self, keys: &[String]) -> AppResult<u64>;

    /// 按模式增量遍历键，从 `cursor == 0` 开始
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> AppResult<ScanPage>;

    /// 发布消息，返回接收者数量
    async fn publish(&self, channel: &str, payload: &str) -> AppResult<u64>;

    /// 连通性检查
    async fn ping(&self) -> AppResult<()>;
}
