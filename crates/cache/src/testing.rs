//! 测试替身
//!
//! [`MemoryCachePort`] 在内存中模拟共享缓存，自带一个发布/订阅总线，
//! 多个 [`MultiLevelCache`](crate::MultiLevelCache) 共享同一个实例即可模拟多实例部署。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use futures::future::ready;
use libris_errors::{AppError, AppResult};
use libris_ports::{CachePort, CacheSubscriber, MessageStream, PubSubMessage, ScanPage};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::pattern::KeyPattern;

/// 过期事件所在的频道（database 0）
pub const EXPIRED_EVENTS_CHANNEL: &str = "__keyevent@0__:expired";

const BUS_CAPACITY: usize = 1024;

struct StoredValue {
    payload: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_live(&self) -> bool {
        self.expires_at.is_none_or(|at| at > Instant::now())
    }
}

/// 内存版共享缓存
pub struct MemoryCachePort {
    data: Mutex<HashMap<String, StoredValue>>,
    bus: Mutex<broadcast::Sender<PubSubMessage>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    published: Mutex<Vec<(String, String)>>,
    failing_scans: Mutex<Vec<String>>,
    scan_cursors: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
    failing: AtomicBool,
}

impl Default for MemoryCachePort {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCachePort {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            data: Mutex::new(HashMap::new()),
            bus: Mutex::new(sender),
            calls: Mutex::new(HashMap::new()),
            published: Mutex::new(Vec::new()),
            failing_scans: Mutex::new(Vec::new()),
            scan_cursors: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
            failing: AtomicBool::new(false),
        }
    }

    /// 所有命令都返回错误
    pub fn failing() -> Self {
        let port = Self::new();
        port.set_failing(true);
        port
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// 每个命令执行前等待，用于触发超时
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// 对包含指定片段的 SCAN 模式返回错误
    pub fn fail_scans_matching(&self, fragment: impl Into<String>) {
        self.failing_scans.lock().push(fragment.into());
    }

    /// 某个命令被调用的次数
    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().get(op).copied().unwrap_or(0)
    }

    /// 所有有效的键，已排序
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .data
            .lock()
            .iter()
            .filter(|(_, v)| v.is_live())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.data
            .lock()
            .get(key)
            .filter(|v| v.is_live())
            .map(|v| v.payload.clone())
    }

    /// 绕过协调器直接写入
    pub fn insert_raw(&self, key: &str, payload: &str) {
        self.data.lock().insert(
            key.to_string(),
            StoredValue {
                payload: payload.to_string(),
                expires_at: None,
            },
        );
    }

    /// 已发布的 (频道, 消息)
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().clone()
    }

    /// 模拟键过期：删除键并推送过期事件
    pub fn expire(&self, key: &str) {
        self.data.lock().remove(key);
        let _ = self
            .bus
            .lock()
            .send(PubSubMessage::new(EXPIRED_EVENTS_CHANNEL, key));
    }

    /// 断开所有订阅连接
    pub fn disconnect_subscribers(&self) {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        *self.bus.lock() = sender;
    }

    fn receiver(&self) -> broadcast::Receiver<PubSubMessage> {
        self.bus.lock().subscribe()
    }

    async fn enter(&self, op: &'static str) -> AppResult<()> {
        *self.calls.lock().entry(op).or_insert(0) += 1;

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::external_service(format!("memory cache {} failed", op)));
        }
        Ok(())
    }
}

/// Redis glob 转回 `*` 通配模式
fn unescape_glob(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len());
    let mut chars = glob.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[async_trait]
impl CachePort for MemoryCachePort {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.enter("get").await?;
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        self.enter("set").await?;
        self.data.lock().insert(
            key.to_string(),
            StoredValue {
                payload: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.enter("delete").await?;
        self.data.lock().remove(key);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> AppResult<u64> {
        self.enter("delete_many").await?;
        let mut data = self.data.lock();
        Ok(keys.iter().filter(|k| data.remove(*k).is_some()).count() as u64)
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> AppResult<ScanPage> {
        self.enter("scan").await?;

        if self
            .failing_scans
            .lock()
            .iter()
            .any(|fragment| pattern.contains(fragment.as_str()))
        {
            return Err(AppError::external_service(format!("scan {} failed", pattern)));
        }

        // 游标指向上一页最后一个键，遍历期间删除键不会跳过剩余的键
        let resume = match cursor {
            0 => None,
            n => self.scan_cursors.lock().get(n as usize - 1).cloned(),
        };

        let matcher = KeyPattern::new(&unescape_glob(pattern))?;
        let mut remaining = self
            .keys()
            .into_iter()
            .filter(|k| matcher.matches(k))
            .filter(|k| resume.as_ref().is_none_or(|last| k > last))
            .peekable();

        let keys: Vec<String> = remaining.by_ref().take(count.max(1)).collect();
        let next = match (remaining.peek(), keys.last()) {
            (Some(_), Some(last)) => {
                let mut cursors = self.scan_cursors.lock();
                cursors.push(last.clone());
                cursors.len() as u64
            }
            _ => 0,
        };

        Ok(ScanPage { cursor: next, keys })
    }

    async fn publish(&self, channel: &str, payload: &str) -> AppResult<u64> {
        self.enter("publish").await?;
        self.published
            .lock()
            .push((channel.to_string(), payload.to_string()));
        let receivers = self
            .bus
            .lock()
            .send(PubSubMessage::new(channel, payload))
            .unwrap_or(0);
        Ok(receivers as u64)
    }

    async fn ping(&self) -> AppResult<()> {
        self.enter("ping").await
    }
}

/// 基于 [`MemoryCachePort`] 总线的订阅连接
pub struct MemorySubscriber {
    port: Arc<MemoryCachePort>,
    refuse: AtomicBool,
    subscriptions: Mutex<usize>,
}

impl MemorySubscriber {
    pub fn new(port: Arc<MemoryCachePort>) -> Self {
        Self {
            port,
            refuse: AtomicBool::new(false),
            subscriptions: Mutex::new(0),
        }
    }

    /// 拒绝建立连接
    pub fn refusing(port: Arc<MemoryCachePort>) -> Self {
        let subscriber = Self::new(port);
        subscriber.set_refusing(true);
        subscriber
    }

    pub fn set_refusing(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// 成功建立的连接数
    pub fn subscriptions(&self) -> usize {
        *self.subscriptions.lock()
    }
}

#[async_trait]
impl CacheSubscriber for MemorySubscriber {
    async fn subscribe(&self, channels: &[String], patterns: &[String]) -> AppResult<MessageStream> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(AppError::external_service("subscription refused"));
        }

        let channels = channels.to_vec();
        let patterns = patterns
            .iter()
            .map(|p| KeyPattern::new(p))
            .collect::<AppResult<Vec<_>>>()?;

        let receiver = self.port.receiver();
        *self.subscriptions.lock() += 1;

        let stream = futures::stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => return Some((message, receiver)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .filter_map(move |message| {
            let routed = if channels.contains(&message.channel) {
                Some(message)
            } else {
                patterns
                    .iter()
                    .find(|p| p.matches(&message.channel))
                    .map(|p| message.clone().with_pattern(p.as_str()))
            };
            ready(routed)
        });

        Ok(stream.boxed())
    }
}
