//! ports - 抽象 trait 层
//!
//! 定义共享缓存（L2）的抽象接口：命令连接与订阅连接分离

mod cache;
mod subscriber;

pub use cache::*;
pub use subscriber::*;
