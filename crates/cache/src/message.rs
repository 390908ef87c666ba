//! 跨实例失效广播消息

use std::fmt;

use libris_errors::AppResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 进程实例标识
///
/// 启动时随机生成，不持久化，只用于忽略自己发出的失效广播
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(Uuid);

impl InstanceId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::random()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// 失效消息
///
/// `key` 可以是精确的键，也可以是带 `*` 的模式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationMessage {
    pub key: String,
    pub origin: InstanceId,
}

impl InvalidationMessage {
    pub fn new(key: impl Into<String>, origin: InstanceId) -> Self {
        Self {
            key: key.into(),
            origin,
        }
    }

    pub fn to_payload(&self) -> AppResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_payload(payload: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let origin = InstanceId::random();
        let payload = InvalidationMessage::new("book:*", origin)
            .to_payload()
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["key"], "book:*");
        assert_eq!(value["origin"], origin.to_string());
    }

    #[test]
    fn test_instance_ids_are_unique() {
        assert_ne!(InstanceId::random(), InstanceId::random());
    }

    #[test]
    fn test_rejects_foreign_payload() {
        assert!(InvalidationMessage::from_payload("book:1").is_err());
        assert!(InvalidationMessage::from_payload(r#"{"key":"book:1"}"#).is_err());
    }
}
