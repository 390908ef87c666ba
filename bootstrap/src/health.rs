//! 健康检查模块
//!
//! 提供 /health、/ready 和 /metrics 端点

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use libris_cache::MultiLevelCache;
use libris_telemetry::HealthStatus;
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
struct HealthState {
    cache: Arc<MultiLevelCache>,
    metrics: Option<PrometheusHandle>,
}

/// 健康检查路由，可与服务路由合并
pub fn health_router(cache: Arc<MultiLevelCache>, metrics: Option<PrometheusHandle>) -> Router {
    Router::new()
        .route("/health", get(liveness))
        .route("/ready", get(readiness))
        .route("/metrics", get(render_metrics))
        .with_state(HealthState { cache, metrics })
}

/// 存活检查：只说明进程在运行
async fn liveness() -> Json<HealthStatus> {
    Json(HealthStatus::new())
}

/// 就绪检查：L2 可达且订阅连接在线
async fn readiness(State(state): State<HealthState>) -> Response {
    let status = state.cache.health().await;
    let code = if status.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status)).into_response()
}

async fn render_metrics(State(state): State<HealthState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use libris_cache::MultiLevelCacheConfig;
    use libris_cache::testing::{MemoryCachePort, MemorySubscriber};
    use tower::ServiceExt;

    fn cache(remote: &Arc<MemoryCachePort>) -> Arc<MultiLevelCache> {
        Arc::new(MultiLevelCache::new(
            remote.clone(),
            MultiLevelCacheConfig::default(),
        ))
    }

    async fn get_status(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or_default())
    }

    #[tokio::test]
    async fn test_liveness_always_ok() {
        let remote = Arc::new(MemoryCachePort::failing());
        let (status, body) = get_status(health_router(cache(&remote), None), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["healthy"], true);
    }

    #[tokio::test]
    async fn test_ready_when_listening() {
        let remote = Arc::new(MemoryCachePort::new());
        let cache = cache(&remote);
        cache
            .start(Arc::new(MemorySubscriber::new(remote.clone())))
            .await
            .unwrap();

        let (status, body) = get_status(health_router(cache, None), "/ready").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn test_not_ready_when_l2_down() {
        let remote = Arc::new(MemoryCachePort::failing());
        let (status, body) = get_status(health_router(cache(&remote), None), "/ready").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["healthy"], false);
    }

    #[tokio::test]
    async fn test_metrics_without_recorder() {
        let remote = Arc::new(MemoryCachePort::new());
        let (status, _) = get_status(health_router(cache(&remote), None), "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
