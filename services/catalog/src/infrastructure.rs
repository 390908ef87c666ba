//! 内存仓储

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use libris_errors::AppResult;
use parking_lot::RwLock;

use crate::domain::{Author, AuthorInput, AuthorRepository};

/// 内存版作者仓储，按 id 排序
pub struct InMemoryAuthorRepository {
    authors: RwLock<BTreeMap<u64, Author>>,
    next_id: AtomicU64,
}

impl Default for InMemoryAuthorRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuthorRepository {
    pub fn new() -> Self {
        Self {
            authors: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 预置数据，后续 id 从最大 id + 1 开始
    pub fn with_authors(authors: impl IntoIterator<Item = Author>) -> Self {
        let authors: BTreeMap<u64, Author> = authors.into_iter().map(|a| (a.id, a)).collect();
        let next_id = authors.keys().next_back().map_or(1, |id| id + 1);
        Self {
            authors: RwLock::new(authors),
            next_id: AtomicU64::new(next_id),
        }
    }
}

#[async_trait]
impl AuthorRepository for InMemoryAuthorRepository {
    async fn find_all(&self) -> AppResult<Vec<Author>> {
        Ok(self.authors.read().values().cloned().collect())
    }

    async fn find_by_id(&self, id: u64) -> AppResult<Option<Author>> {
        Ok(self.authors.read().get(&id).cloned())
    }

    async fn create(&self, input: &AuthorInput) -> AppResult<Author> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let author = input.clone().into_author(id);
        self.authors.write().insert(id, author.clone());
        Ok(author)
    }

    async fn update(&self, id: u64, input: &AuthorInput) -> AppResult<Option<Author>> {
        let mut authors = self.authors.write();
        Ok(authors.get_mut(&id).map(|author| {
            *author = input.clone().into_author(id);
            author.clone()
        }))
    }

    async fn delete(&self, id: u64) -> AppResult<bool> {
        Ok(self.authors.write().remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(firstname: &str) -> AuthorInput {
        AuthorInput {
            firstname: firstname.to_string(),
            lastname: "Tolstoy".to_string(),
            born: None,
        }
    }

    #[tokio::test]
    async fn test_crud() {
        let repo = InMemoryAuthorRepository::new();

        let created = repo.create(&input("Leo")).await.unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(repo.find_by_id(1).await.unwrap(), Some(created));

        let updated = repo.update(1, &input("Lev")).await.unwrap().unwrap();
        assert_eq!(updated.firstname, "Lev");
        assert!(repo.update(99, &input("x")).await.unwrap().is_none());

        assert!(repo.delete(1).await.unwrap());
        assert!(!repo.delete(1).await.unwrap());
        assert!(repo.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_seeded_ids_continue() {
        let repo = InMemoryAuthorRepository::with_authors([input("Leo").into_author(10)]);
        let created = repo.create(&input("Sofia")).await.unwrap();
        assert_eq!(created.id, 11);
        assert_eq!(repo.find_all().await.unwrap().len(), 2);
    }
}
