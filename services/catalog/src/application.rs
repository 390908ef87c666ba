//! 作者目录服务
//!
//! 读操作走 `Cacheable`，写操作成功后通过 `InvalidateCache` 清空列表和详情缓存

use std::sync::Arc;

use libris_cache::{Cacheable, InvalidateCache, MultiLevelCache};
use libris_errors::{AppError, AppResult};
use serde_json::Value;
use tracing::info;

use crate::domain::{Author, AuthorInput, AuthorRepository};

pub const AUTHOR_BY_ID: &str = "author-by-id";
pub const AUTHORS: &str = "authors";

pub struct AuthorCatalog {
    repo: Arc<dyn AuthorRepository>,
    cache: Arc<MultiLevelCache>,
    by_id: Cacheable,
    all: Cacheable,
    writes: InvalidateCache,
}

impl AuthorCatalog {
    pub fn new(repo: Arc<dyn AuthorRepository>, cache: Arc<MultiLevelCache>) -> Self {
        Self {
            repo,
            by_id: Cacheable::new(cache.clone(), AUTHOR_BY_ID),
            all: Cacheable::new(cache.clone(), AUTHORS),
            writes: InvalidateCache::new(cache.clone(), [AUTHORS, AUTHOR_BY_ID]),
            cache,
        }
    }

    pub async fn list(&self) -> AppResult<Vec<Author>> {
        self.all.call(&(), || self.repo.find_all()).await
    }

    pub async fn get(&self, id: u64) -> AppResult<Author> {
        self.by_id
            .call(&(id,), || self.repo.find_by_id(id))
            .await?
            .ok_or_else(|| AppError::not_found(format!("Author {} not found", id)))
    }

    pub async fn create(&self, input: AuthorInput) -> AppResult<Author> {
        input.validate()?;
        let author = self
            .writes
            .call(&(&input,), || self.repo.create(&input))
            .await?;
        info!(author_id = author.id, "Author created");
        Ok(author)
    }

    pub async fn update(&self, id: u64, input: AuthorInput) -> AppResult<Author> {
        input.validate()?;
        self.writes
            .call(&(id, &input), || self.repo.update(id, &input))
            .await?
            .ok_or_else(|| AppError::not_found(format!("Author {} not found", id)))
    }

    pub async fn delete(&self, id: u64) -> AppResult<()> {
        let deleted = self
            .writes
            .call(&(id,), || self.repo.delete(id))
            .await?;
        if !deleted {
            return Err(AppError::not_found(format!("Author {} not found", id)));
        }
        info!(author_id = id, "Author deleted");
        Ok(())
    }

    /// L1 中的缓存键
    pub fn cache_keys(&self) -> Vec<String> {
        self.cache.keys()
    }

    /// L1 中的缓存条目
    pub fn cache_entries(&self) -> Vec<(String, Value)> {
        self.cache.entries()
    }
}
