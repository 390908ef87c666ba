//! Catalog Service - 作者目录服务入口
//!
//! 演示多级缓存：读穿透、写后失效、跨实例同步

mod api;
mod application;
mod domain;
mod infrastructure;

use std::sync::Arc;

use libris_bootstrap::run;
use tracing::info;

use application::AuthorCatalog;
use infrastructure::InMemoryAuthorRepository;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    run("config", |infra| async move {
        let repo = Arc::new(InMemoryAuthorRepository::new());
        let catalog = Arc::new(AuthorCatalog::new(repo, infra.cache()));
        info!(instance_id = %infra.cache().instance_id(), "Author catalog initialized");

        api::router(catalog)
    })
    .await
}

#[cfg(test)]
mod tests {
    use figment::Jail;
    use libris_config::{AppConfig, ConfigError};

    const CONFIG_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/config");

    #[test]
    fn test_shipped_config_requires_deployment_settings() {
        Jail::expect_with(|jail| {
            let result = AppConfig::load(CONFIG_DIR);
            assert!(matches!(result, Err(ConfigError::Load(_))));

            jail.set_env("LIBRIS_REDIS__URL", "redis://127.0.0.1:6379");
            jail.set_env("LIBRIS_CACHE__L1_TTL_SECS", "60");
            jail.set_env("LIBRIS_CACHE__L2_TTL_SECS", "600");

            let config = AppConfig::load(CONFIG_DIR).map_err(|e| e.to_string())?;
            assert_eq!(config.app_name, "catalog");
            assert_eq!(config.cache.l1_ttl_secs, 60);
            Ok(())
        });
    }
}
