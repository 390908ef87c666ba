//! libris-bootstrap - 统一服务启动骨架
//!
//! 配置 -> 日志 -> Redis（重试）-> 多级缓存 -> HTTP 服务 -> 优雅关闭

mod health;
mod infrastructure;
mod retry;
mod runtime;
mod starter;

pub use health::*;
pub use infrastructure::*;
pub use retry::*;
pub use runtime::*;
pub use starter::*;
