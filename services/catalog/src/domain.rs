//! 领域模型

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libris_cache::codec::option_timestamp;
use libris_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// 作者
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: u64,
    pub firstname: String,
    pub lastname: String,
    #[serde(default, with = "option_timestamp")]
    pub born: Option<DateTime<Utc>>,
}

/// 创建或更新作者的输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorInput {
    pub firstname: String,
    pub lastname: String,
    #[serde(default, with = "option_timestamp")]
    pub born: Option<DateTime<Utc>>,
}

impl AuthorInput {
    pub fn validate(&self) -> AppResult<()> {
        if self.firstname.trim().is_empty() {
            return Err(AppError::validation("firstname must not be empty"));
        }
        if self.lastname.trim().is_empty() {
            return Err(AppError::validation("lastname must not be empty"));
        }
        Ok(())
    }

    pub fn into_author(self, id: u64) -> Author {
        Author {
            id,
            firstname: self.firstname,
            lastname: self.lastname,
            born: self.born,
        }
    }
}

/// 作者仓储
#[async_trait]
pub trait AuthorRepository: Send + Sync {
    async fn find_all(&self) -> AppResult<Vec<Author>>;

    async fn find_by_id(&self, id: u64) -> AppResult<Option<Author>>;

    async fn create(&self, input: &AuthorInput) -> AppResult<Author>;

    /// 作者不存在时返回 None
    async fn update(&self, id: u64, input: &AuthorInput) -> AppResult<Option<Author>>;

    /// 返回是否删除了记录
    async fn delete(&self, id: u64) -> AppResult<bool>;
}
