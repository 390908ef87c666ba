use crate::{AppConfig, ConfigError, RedisConfig};
use figment::Jail;
use secrecy::{ExposeSecret, Secret};

const MINIMAL: &str = r#"
[redis]
url = "redis://cache.internal:6379"

[cache]
l1_ttl_secs = 60
l2_ttl_secs = 600
"#;

#[test]
fn test_secret_redaction() {
    let config = RedisConfig {
        url: Secret::new("redis://:hunter2@localhost:6379".to_string()),
        database: 0,
        notify_keyspace_events: String::new(),
    };
    let debug_output = format!("{:?}", config);
    assert!(!debug_output.contains("hunter2"));
    assert!(debug_output.contains("Secret([REDACTED"));
}

#[test]
fn test_load_from_file_with_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file("default.toml", MINIMAL)?;

        let config = AppConfig::load(".").map_err(|e| e.to_string())?;
        assert_eq!(config.app_name, "libris");
        assert!(config.is_development());
        assert_eq!(config.redis.url.expose_secret(), "redis://cache.internal:6379");
        assert_eq!(config.redis.notify_keyspace_events, "Ex");
        assert_eq!(config.cache.l1_ttl().as_secs(), 60);
        assert_eq!(config.cache.l2_ttl().as_secs(), 600);
        assert_eq!(config.cache.invalidation_channel, "cache:invalidation");
        assert_eq!(config.cache.remote_timeout().as_millis(), 500);
        assert_eq!(config.cache.scan_count, 100);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.telemetry.log_level, "info");
        Ok(())
    });
}

#[test]
fn test_env_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file("default.toml", MINIMAL)?;
        jail.set_env("LIBRIS_CACHE__L1_TTL_SECS", "5");
        jail.set_env("LIBRIS_CACHE__INVALIDATION_CHANNEL", "libris:invalidate");

        let config = AppConfig::load(".").map_err(|e| e.to_string())?;
        assert_eq!(config.cache.l1_ttl_secs, 5);
        assert_eq!(config.cache.invalidation_channel, "libris:invalidate");
        Ok(())
    });
}

#[test]
fn test_app_env_selects_overlay_and_environment() {
    Jail::expect_with(|jail| {
        jail.create_file("default.toml", MINIMAL)?;
        jail.create_file("production.toml", "[telemetry]\nlog_level = \"warn\"\n")?;
        jail.set_env("APP_ENV", "production");

        let config = AppConfig::load(".").map_err(|e| e.to_string())?;
        assert_eq!(config.app_env, "production");
        assert!(config.is_production());
        assert_eq!(config.telemetry.log_level, "warn");
        Ok(())
    });
}

#[test]
fn test_app_env_without_overlay_file() {
    Jail::expect_with(|jail| {
        jail.create_file("default.toml", MINIMAL)?;
        jail.set_env("APP_ENV", "staging");

        let config = AppConfig::load(".").map_err(|e| e.to_string())?;
        assert_eq!(config.app_env, "staging");
        assert!(!config.is_production());
        assert!(!config.is_development());
        Ok(())
    });
}

#[test]
fn test_from_env_only() {
    Jail::expect_with(|jail| {
        jail.set_env("LIBRIS_REDIS__URL", "redis://127.0.0.1:6379");
        jail.set_env("LIBRIS_CACHE__L1_TTL_SECS", "30");
        jail.set_env("LIBRIS_CACHE__L2_TTL_SECS", "300");

        let config = AppConfig::from_env().map_err(|e| e.to_string())?;
        assert_eq!(config.cache.l2_ttl_secs, 300);
        Ok(())
    });
}

#[test]
fn test_missing_required_setting_is_fatal() {
    Jail::expect_with(|jail| {
        jail.set_env("LIBRIS_REDIS__URL", "redis://127.0.0.1:6379");
        jail.set_env("LIBRIS_CACHE__L1_TTL_SECS", "30");

        let result = AppConfig::from_env();
        assert!(matches!(result, Err(ConfigError::Load(_))));
        Ok(())
    });
}

#[test]
fn test_zero_ttl_is_rejected() {
    Jail::expect_with(|jail| {
        jail.set_env("LIBRIS_REDIS__URL", "redis://127.0.0.1:6379");
        jail.set_env("LIBRIS_CACHE__L1_TTL_SECS", "0");
        jail.set_env("LIBRIS_CACHE__L2_TTL_SECS", "300");

        let result = AppConfig::from_env();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        Ok(())
    });
}
