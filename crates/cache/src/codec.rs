//! L2 线上格式
//!
//! 值以 JSON 文本写入 Redis。时间统一使用毫秒精度的 UTC 格式
//! `YYYY-MM-DDTHH:mm:ss.sssZ`，只有完全符合该格式的字符串才会被还原为时间，
//! 其它格式的日期字符串在经过 L2 之后仍然是普通字符串。

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use libris_errors::AppResult;
use regex::Regex;
use serde_json::Value;

/// chrono 格式串
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z$").unwrap());

/// 序列化为写入 L2 的 JSON 文本
pub fn encode(value: &Value) -> AppResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// 解析 L2 中读出的 JSON 文本
pub fn decode(payload: &str) -> AppResult<Value> {
    Ok(serde_json::from_str(payload)?)
}

/// 字符串是否为可还原的时间格式
pub fn is_timestamp(s: &str) -> bool {
    TIMESTAMP_RE.is_match(s)
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// 严格解析：格式不符（包括秒级或微秒级精度、时区偏移）一律返回 None
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if !is_timestamp(s) {
        return None;
    }
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// serde 适配器：`#[serde(with = "libris_cache::codec::timestamp")]`
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| D::Error::custom(format!("not a millisecond UTC timestamp: {raw}")))
    }
}

/// `Option<DateTime<Utc>>` 版本的 serde 适配器
pub mod option_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(
        ts: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => super::timestamp::serialize(ts, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => super::parse_timestamp(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("not a millisecond UTC timestamp: {raw}"))),
            None => Ok(None),
        }
    }
}
