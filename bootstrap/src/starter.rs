//! 服务启动器
//!
//! 提供统一的服务启动模式

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use libris_config::AppConfig;
use libris_telemetry::init_metrics;
use tracing::{info, warn};

use crate::health::health_router;
use crate::infrastructure::Infrastructure;
use crate::runtime::{init_runtime, shutdown_signal};

/// 运行 HTTP 服务
///
/// 1. 加载配置
/// 2. 初始化日志和 metrics
/// 3. 连接 Redis，启动多级缓存和失效监听
/// 4. 调用 `router_builder` 构建业务路由，合并健康检查路由
/// 5. 监听地址直到收到关闭信号，然后停止缓存监听
///
/// ```ignore
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     libris_bootstrap::run("config", |infra| async move {
///         routes::router(AuthorCatalog::new(repo, infra.cache()))
///     })
///     .await
/// }
/// ```
pub async fn run<F, Fut>(config_dir: &str, router_builder: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(Arc<Infrastructure>) -> Fut,
    Fut: Future<Output = Router>,
{
    // 1. 加载配置
    let config = AppConfig::load(config_dir)?;

    // 2. 初始化运行时
    init_runtime(&config);
    info!("Starting {} service", config.app_name);

    let metrics = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Prometheus recorder not installed, /metrics disabled");
            None
        }
    };

    // 3. 基础设施
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let infra = Arc::new(Infrastructure::from_config(&config).await?);

    // 4. 路由
    let app = router_builder(infra.clone())
        .await
        .merge(health_router(infra.cache(), metrics));

    // 5. 启动服务器
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    infra.shutdown();
    info!("Service stopped");

    Ok(())
}
