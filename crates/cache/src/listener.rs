//! 订阅监听循环
//!
//! 消费专用订阅连接推送的消息；连接断开后按指数退避重连。
//! 只持有协调器的弱引用，协调器释放后循环自动退出。

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::StreamExt;
use libris_ports::{CacheSubscriber, MessageStream};
use tracing::{error, info};

use crate::coordinator::MultiLevelCache;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

pub(crate) async fn run(
    cache: Weak<MultiLevelCache>,
    subscriber: Arc<dyn CacheSubscriber>,
    channels: Vec<String>,
    patterns: Vec<String>,
    mut stream: MessageStream,
) {
    loop {
        while let Some(message) = stream.next().await {
            let Some(cache) = cache.upgrade() else {
                return;
            };
            cache.handle_message(&message);
        }

        error!(channels = ?channels, "Cache subscription closed, reconnecting");

        let mut backoff = INITIAL_BACKOFF;
        stream = loop {
            if cache.strong_count() == 0 {
                return;
            }
            tokio::time::sleep(backoff).await;

            match subscriber.subscribe(&channels, &patterns).await {
                Ok(stream) => break stream,
                Err(e) => {
                    error!(
                        error = %e,
                        backoff_secs = backoff.as_secs(),
                        "Failed to re-establish cache subscription"
                    );
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        };

        let Some(cache) = cache.upgrade() else {
            return;
        };
        cache.reset_local();
        info!(channels = ?channels, patterns = ?patterns, "Cache subscription re-established");
    }
}
