//! 方法拦截层
//!
//! 用组合代替注解：
//! - [`Cacheable`]: 读穿透。键为 `namespace:JSON(args)`，命中时不执行被包装的操作
//! - [`InvalidateCache`]: 写后失效。操作成功后对每个命名空间并行执行 `namespace:*` 失效
//!
//! 两者都不会引入新的失败：缓存内部问题只记录日志，被包装操作的错误原样返回。
//!
//! ```ignore
//! let author_by_id = Cacheable::new(cache.clone(), "author-by-id");
//! let author = author_by_id
//!     .call(&(id,), || repo.find_by_id(id))
//!     .await?;
//!
//! let writes = InvalidateCache::new(cache, ["authors", "author-by-id"]);
//! writes.call(&(id, &input), || repo.update(id, &input)).await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use libris_errors::AppResult;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::coordinator::{InvalidationReport, MultiLevelCache};

/// 递归排序对象字段，保证字段顺序不同的参数得到相同的键
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(String, Value)> = map.into_iter().collect();
            fields.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// 参数的规范化 JSON
fn canonical_args<A: Serialize + ?Sized>(args: &A) -> AppResult<Value> {
    Ok(canonicalize(serde_json::to_value(args)?))
}

/// 生成缓存键：`namespace:JSON(args)`
pub fn cache_key<A: Serialize + ?Sized>(namespace: &str, args: &A) -> AppResult<String> {
    let args = canonical_args(args)?;
    Ok(format!("{}:{}", namespace, serde_json::to_string(&args)?))
}

// ============ 读穿透 ============

/// 读穿透缓存
#[derive(Clone)]
pub struct Cacheable {
    cache: Arc<MultiLevelCache>,
    namespace: String,
    ttl: Option<Duration>,
}

impl Cacheable {
    pub fn new(cache: Arc<MultiLevelCache>, namespace: impl Into<String>) -> Self {
        Self {
            cache,
            namespace: namespace.into(),
            ttl: None,
        }
    }

    /// 覆盖 L1 TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// 参数无法序列化时返回 None，本次调用绕过缓存
    pub fn key_for<A: Serialize + ?Sized>(&self, args: &A) -> Option<String> {
        match cache_key(&self.namespace, args) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "Cannot derive cache key, bypassing cache");
                None
            }
        }
    }

    pub async fn call<A, T, E, F, Fut>(&self, args: &A, operation: F) -> Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.key_for(args);
        self.resolve(key, operation).await
    }

    async fn resolve<T, E, F, Fut>(&self, key: Option<String>, operation: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(key) = key else {
            return operation().await;
        };

        if let Some(cached) = self.cache.get_as::<T>(&key).await {
            debug!(key = %key, "Serving cached result");
            return Ok(cached);
        }

        let result = operation().await?;
        self.cache.set_as(&key, &result, self.ttl).await;
        Ok(result)
    }

    /// 包装一个操作，返回带缓存的版本
    pub fn wrap<F>(self, operation: F) -> Cached<F> {
        Cached {
            layer: self,
            operation,
        }
    }
}

/// 被 [`Cacheable::wrap`] 包装的操作
pub struct Cached<F> {
    layer: Cacheable,
    operation: F,
}

impl<F> Cached<F> {
    pub async fn call<A, T, E, Fut>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        A: Serialize,
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.layer.key_for(&args);
        self.layer.resolve(key, || (self.operation)(args)).await
    }
}

// ============ 写后失效 ============

/// 根据命名空间和规范化参数生成要失效的键或模式
pub type KeyGenerator = Arc<dyn Fn(&str, &Value) -> String + Send + Sync>;

/// 写后失效
#[derive(Clone)]
pub struct InvalidateCache {
    cache: Arc<MultiLevelCache>,
    namespaces: Vec<String>,
    key_generator: Option<KeyGenerator>,
}

impl InvalidateCache {
    pub fn new<I, S>(cache: Arc<MultiLevelCache>, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cache,
            namespaces: namespaces.into_iter().map(Into::into).collect(),
            key_generator: None,
        }
    }

    /// 用自定义键生成器缩小失效范围
    pub fn with_key_generator<G>(mut self, generator: G) -> Self
    where
        G: Fn(&str, &Value) -> String + Send + Sync + 'static,
    {
        self.key_generator = Some(Arc::new(generator));
        self
    }

    /// 计算本次调用要失效的模式，默认是整个命名空间
    pub fn patterns_for<A: Serialize + ?Sized>(&self, args: &A) -> Vec<String> {
        let wildcard = |ns: &String| format!("{}:*", ns);

        let Some(generator) = &self.key_generator else {
            return self.namespaces.iter().map(wildcard).collect();
        };

        match canonical_args(args) {
            Ok(args) => self
                .namespaces
                .iter()
                .map(|ns| generator(ns, &args))
                .collect(),
            Err(e) => {
                warn!(error = %e, "Cannot serialize arguments for key generator, invalidating namespaces");
                self.namespaces.iter().map(wildcard).collect()
            }
        }
    }

    pub async fn call<A, T, E, F, Fut>(&self, args: &A, operation: F) -> Result<T, E>
    where
        A: Serialize + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let patterns = self.patterns_for(args);
        let result = operation().await?;
        self.sweep(&patterns).await;
        Ok(result)
    }

    /// 并行失效，各模式互不影响
    async fn sweep(&self, patterns: &[String]) -> Vec<InvalidationReport> {
        join_all(patterns.iter().map(|pattern| self.cache.invalidate(pattern))).await
    }

    pub fn wrap<F>(self, operation: F) -> Invalidating<F> {
        Invalidating {
            layer: self,
            operation,
        }
    }
}

/// 被 [`InvalidateCache::wrap`] 包装的操作
pub struct Invalidating<F> {
    layer: InvalidateCache,
    operation: F,
}

impl<F> Invalidating<F> {
    pub async fn call<A, T, E, Fut>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        A: Serialize,
        Fut: Future<Output = Result<T, E>>,
    {
        let patterns = self.layer.patterns_for(&args);
        let result = (self.operation)(args).await?;
        self.layer.sweep(&patterns).await;
        Ok(result)
    }
}
