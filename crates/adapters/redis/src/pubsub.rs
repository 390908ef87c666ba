//! Redis 发布/订阅模块
//!
//! 订阅必须使用独立连接：进入订阅模式的连接不能再执行普通命令

use async_trait::async_trait;
use futures::StreamExt;
use futures::future::ready;
use libris_errors::{AppError, AppResult};
use libris_ports::{CacheSubscriber, MessageStream, PubSubMessage};
use redis::{Client, Msg};
use tracing::{error, info};

use crate::config::RedisConfig;
use crate::connection::create_client;

/// Redis 订阅者
pub struct RedisSubscriber {
    client: Client,
}

impl RedisSubscriber {
    pub fn new(config: &RedisConfig) -> AppResult<Self> {
        Ok(Self {
            client: create_client(config)?,
        })
    }
}

fn to_message(msg: Msg) -> Option<PubSubMessage> {
    let payload: String = match msg.get_payload() {
        Ok(p) => p,
        Err(e) => {
            error!(channel = %msg.get_channel_name(), error = %e, "Failed to get message payload");
            return None;
        }
    };

    let message = PubSubMessage::new(msg.get_channel_name(), payload);
    if msg.from_pattern() {
        match msg.get_pattern::<String>() {
            Ok(pattern) => return Some(message.with_pattern(pattern)),
            Err(e) => {
                error!(error = %e, "Failed to get message pattern");
                return None;
            }
        }
    }
    Some(message)
}

#[async_trait]
impl CacheSubscriber for RedisSubscriber {
    async fn subscribe(&self, channels: &[String], patterns: &[String]) -> AppResult<MessageStream> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(|e| {
            AppError::external_service(format!("Failed to get pubsub connection: {}", e))
        })?;

        for channel in channels {
            pubsub.subscribe(channel).await.map_err(|e| {
                AppError::external_service(format!("Failed to subscribe to {}: {}", channel, e))
            })?;
        }

        for pattern in patterns {
            pubsub.psubscribe(pattern).await.map_err(|e| {
                AppError::external_service(format!("Failed to psubscribe to {}: {}", pattern, e))
            })?;
        }

        info!(channels = ?channels, patterns = ?patterns, "Subscribed to channels");

        Ok(pubsub
            .into_on_message()
            .filter_map(|msg| ready(to_message(msg)))
            .boxed())
    }
}
