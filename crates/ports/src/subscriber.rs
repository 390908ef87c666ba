//! 订阅 trait 定义

use async_trait::async_trait;
use futures::stream::BoxStream;
use libris_errors::AppResult;
use serde::{Deserialize, Serialize};

/// 订阅连接推送的消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubSubMessage {
    /// 频道
    pub channel: String,
    /// 命中的订阅模式（仅 PSUBSCRIBE 消息）
    pub pattern: Option<String>,
    /// 消息内容
    pub payload: String,
}

impl PubSubMessage {
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            pattern: None,
            payload: payload.into(),
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }
}

/// 推送消息流，连接断开时结束
pub type MessageStream = BoxStream<'static, PubSubMessage>;

/// 订阅 trait
///
/// 每次调用都建立一条专用连接，这条连接只接收推送，不执行命令
#[async_trait]
pub trait CacheSubscriber: Send + Sync {
    async fn subscribe(&self, channels: &[String], patterns: &[String])
    -> AppResult<MessageStream>;
}
