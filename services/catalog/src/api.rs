//! HTTP 接口

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use libris_errors::AppError;
use serde_json::Value;
use tracing::error;

use crate::application::AuthorCatalog;
use crate::domain::{Author, AuthorInput};

/// 以 Problem Details 返回的错误
pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        (
            status,
            [(header::CONTENT_TYPE, "application/problem+json")],
            Json(self.0.to_problem_details()),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn router(catalog: Arc<AuthorCatalog>) -> Router {
    Router::new()
        .route("/authors", get(list_authors).post(create_author))
        .route(
            "/authors/{id}",
            get(get_author).put(update_author).delete(delete_author),
        )
        .route("/debug/cache/keys", get(cache_keys))
        .route("/debug/cache/entries", get(cache_entries))
        .with_state(catalog)
}

async fn list_authors(State(catalog): State<Arc<AuthorCatalog>>) -> ApiResult<Json<Vec<Author>>> {
    Ok(Json(catalog.list().await?))
}

async fn get_author(
    State(catalog): State<Arc<AuthorCatalog>>,
    Path(id): Path<u64>,
) -> ApiResult<Json<Author>> {
    Ok(Json(catalog.get(id).await?))
}

async fn create_author(
    State(catalog): State<Arc<AuthorCatalog>>,
    Json(input): Json<AuthorInput>,
) -> ApiResult<(StatusCode, Json<Author>)> {
    Ok((StatusCode::CREATED, Json(catalog.create(input).await?)))
}

async fn update_author(
    State(catalog): State<Arc<AuthorCatalog>>,
    Path(id): Path<u64>,
    Json(input): Json<AuthorInput>,
) -> ApiResult<Json<Author>> {
    Ok(Json(catalog.update(id, input).await?))
}

async fn delete_author(
    State(catalog): State<Arc<AuthorCatalog>>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    catalog.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn cache_keys(State(catalog): State<Arc<AuthorCatalog>>) -> Json<Vec<String>> {
    Json(catalog.cache_keys())
}

async fn cache_entries(State(catalog): State<Arc<AuthorCatalog>>) -> Json<BTreeMap<String, Value>> {
    Json(catalog.cache_entries().into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::InMemoryAuthorRepository;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use libris_cache::testing::MemoryCachePort;
    use libris_cache::{MultiLevelCache, MultiLevelCacheConfig};
    use serde_json::json;
    use tower::ServiceExt;

    fn app() -> Router {
        let cache = Arc::new(MultiLevelCache::new(
            Arc::new(MemoryCachePort::new()),
            MultiLevelCacheConfig::default(),
        ));
        let repo = Arc::new(InMemoryAuthorRepository::new());
        router(Arc::new(AuthorCatalog::new(repo, cache)))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_author_lifecycle() {
        let app = app();

        let (status, created) = send(
            &app,
            "POST",
            "/authors",
            Some(json!({"firstname": "Ann", "lastname": "Leckie", "born": "1966-03-02T00:00:00.000Z"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["id"], 1);

        let (status, fetched) = send(&app, "GET", "/authors/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["born"], "1966-03-02T00:00:00.000Z");

        let (_, keys) = send(&app, "GET", "/debug/cache/keys", None).await;
        assert_eq!(keys, json!(["author-by-id:[1]"]));

        let (status, updated) = send(
            &app,
            "PUT",
            "/authors/1",
            Some(json!({"firstname": "Anne", "lastname": "Leckie"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["firstname"], "Anne");

        let (_, keys) = send(&app, "GET", "/debug/cache/keys", None).await;
        assert_eq!(keys, json!([]));

        let (status, _) = send(&app, "DELETE", "/authors/1", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, list) = send(&app, "GET", "/authors", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list, json!([]));
    }

    #[tokio::test]
    async fn test_not_found_is_problem_details() {
        let app = app();
        let (status, body) = send(&app, "GET", "/authors/9", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 404);
        assert_eq!(body["title"], "Resource Not Found");
    }

    #[tokio::test]
    async fn test_validation_error() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/authors",
            Some(json!({"firstname": "", "lastname": "X"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);
    }

    #[tokio::test]
    async fn test_cache_entries() {
        let app = app();
        send(
            &app,
            "POST",
            "/authors",
            Some(json!({"firstname": "Ann", "lastname": "Leckie"})),
        )
        .await;
        send(&app, "GET", "/authors", None).await;

        let (status, entries) = send(&app, "GET", "/debug/cache/entries", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(entries["authors:null"][0]["firstname"], "Ann");
    }
}
