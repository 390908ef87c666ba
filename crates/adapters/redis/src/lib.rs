//! libris-adapter-redis - Redis 适配器
//!
//! - RedisCache: 请求/响应命令（`CachePort`）
//! - RedisSubscriber: 专用订阅连接（`CacheSubscriber`）

mod cache;
mod config;
mod connection;
mod pubsub;

pub use cache::*;
pub use config::*;
pub use connection::*;
pub use pubsub::*;
