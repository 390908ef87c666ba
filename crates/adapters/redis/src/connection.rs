//! Redis 连接管理

use libris_errors::{AppError, AppResult};
use redis::Client;
use redis::aio::ConnectionManager;

use crate::config::RedisConfig;

/// 创建 Redis 客户端
pub fn create_client(config: &RedisConfig) -> AppResult<Client> {
    Client::open(config.connection_info()?)
        .map_err(|e| AppError::configuration(format!("Failed to create Redis client: {}", e)))
}

/// 创建 Redis 连接管理器（断线自动重连）
pub async fn create_connection_manager(config: &RedisConfig) -> AppResult<ConnectionManager> {
    let client = create_client(config)?;

    match tokio::time::timeout(config.connection_timeout, ConnectionManager::new(client)).await {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(e)) => Err(AppError::external_service(format!(
            "Failed to create Redis connection manager: {}",
            e
        ))),
        Err(_) => Err(AppError::timeout(format!(
            "Redis connection not established within {}s",
            config.connection_timeout.as_secs()
        ))),
    }
}

/// 检查 Redis 连接
pub async fn check_connection(conn: &mut ConnectionManager) -> AppResult<()> {
    redis::cmd("PING")
        .query_async::<String>(conn)
        .await
        .map_err(|e| AppError::external_service(format!("Redis health check failed: {}", e)))?;
    Ok(())
}
