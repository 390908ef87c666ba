//! libris-cache - 多级缓存
//!
//! 提供两级缓存和跨实例一致性：
//! - MultiLevelCache: L1 进程内缓存 + L2 共享缓存
//! - 失效广播 + 键过期事件: 多实例之间的 L1 同步
//! - Cacheable / InvalidateCache: 读穿透与写后失效
//! - codec: JSON 编码与时间戳还原

pub mod codec;
pub mod pattern;

mod coordinator;
mod intercept;
mod listener;
mod local;
mod message;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use coordinator::{InvalidationReport, MultiLevelCache, MultiLevelCacheConfig, WriteOutcome};
pub use intercept::{Cacheable, Cached, InvalidateCache, Invalidating, KeyGenerator, cache_key};
pub use message::{InstanceId, InvalidationMessage};
pub use pattern::KeyPattern;
