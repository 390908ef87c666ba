//! 键模式匹配
//!
//! 只支持 `*` 一种通配符（匹配任意长度，包括空串），其它字符一律按字面匹配。
//! 同一个模式既用于本地 L1 的正则匹配，也转换为 Redis `SCAN MATCH` 的 glob。

use libris_errors::{AppError, AppResult};
use regex::Regex;

/// 通配符
pub const WILDCARD: char = '*';

/// 字符串是否包含通配符
pub fn is_pattern(s: &str) -> bool {
    s.contains(WILDCARD)
}

/// 编译后的键模式
#[derive(Debug, Clone)]
pub struct KeyPattern {
    raw: String,
    regex: Regex,
}

impl KeyPattern {
    pub fn new(pattern: &str) -> AppResult<Self> {
        let body = pattern
            .split(WILDCARD)
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");

        let regex = Regex::new(&format!("^{}$", body))
            .map_err(|e| AppError::validation(format!("Invalid key pattern {}: {}", pattern, e)))?;

        Ok(Self {
            raw: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    /// 转换为 Redis glob，转义 `?`、`[`、`]`、`\`
    pub fn to_redis_glob(&self) -> String {
        let mut glob = String::with_capacity(self.raw.len());
        for c in self.raw.chars() {
            if matches!(c, '?' | '[' | ']' | '\\') {
                glob.push('\\');
            }
            glob.push(c);
        }
        glob
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_wildcard() {
        let pattern = KeyPattern::new("book:*").unwrap();
        assert!(pattern.matches("book:1"));
        assert!(pattern.matches("book:"));
        assert!(pattern.matches(r#"book:[{"limit":10}]"#));
        assert!(!pattern.matches("author:1"));
        assert!(!pattern.matches("ebook:1"));
    }

    #[test]
    fn test_every_wildcard_is_expanded() {
        let pattern = KeyPattern::new("*:by-id:*").unwrap();
        assert!(pattern.matches("author:by-id:[5]"));
        assert!(!pattern.matches("author:by-name:[5]"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let pattern = KeyPattern::new("a.b:[1]").unwrap();
        assert!(pattern.matches("a.b:[1]"));
        assert!(!pattern.matches("axb:[1]"));
        assert!(!pattern.matches("a.b:1"));
    }

    #[test]
    fn test_exact_key_without_wildcard() {
        let pattern = KeyPattern::new("author:5").unwrap();
        assert!(!is_pattern(pattern.as_str()));
        assert!(pattern.matches("author:5"));
        assert!(!pattern.matches("author:50"));
    }

    #[test]
    fn test_redis_glob_escaping() {
        let pattern = KeyPattern::new(r#"authors:[{"q":"a?"}]*"#).unwrap();
        assert_eq!(pattern.to_redis_glob(), r#"authors:\[{"q":"a\?"}\]*"#);
    }
}
