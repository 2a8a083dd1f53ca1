//! Cache key derivation and invalidation patterns.

use serde::Serialize;
use serde_json::{Map, Value};

/// Resource tag for order list pages.
pub const ORDER_LIST: &str = "orderList";

/// Resource tag for single orders.
pub const ORDER_DETAIL: &str = "orderDetail";

/// Resource tag for an order's change history.
pub const ORDER_AUDIT: &str = "orderAudit";

/// Cache key: `<resource>:<canonical JSON of params>`.
///
/// Object keys are sorted recursively, so logically equal parameter sets
/// always produce the same key regardless of field order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive a key from a resource tag and its parameters.
    ///
    /// Parameters that fail to serialize are treated as empty.
    pub fn new<P: Serialize + ?Sized>(resource: &str, params: &P) -> Self {
        let value = serde_json::to_value(params).unwrap_or(Value::Null);
        let canonical = match canonicalize(value) {
            Value::Null => "{}".to_string(),
            other => other.to_string(),
        };
        Self(format!("{resource}:{canonical}"))
    }

    /// Key for a resource with no parameters.
    #[must_use]
    pub fn bare(resource: &str) -> Self {
        Self(format!("{resource}:{{}}"))
    }

    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Rebuild a JSON value with object keys in sorted order and nulls dropped.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            // Sorted before insert so the order also holds under `preserve_order`
            Value::Object(entries.into_iter().collect::<Map<String, Value>>())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Selects keys for bulk invalidation.
#[derive(Debug, Clone)]
pub enum KeyPattern {
    /// A single key.
    Exact(String),
    /// Every key starting with the prefix.
    Prefix(String),
    /// Every key the regex matches anywhere.
    Regex(regex::Regex),
}

impl KeyPattern {
    /// All keys for one resource type.
    #[must_use]
    pub fn resource(resource: &str) -> Self {
        Self::Prefix(format!("{resource}:"))
    }

    /// Whether the key is selected by this pattern.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::Exact(k) => k == key,
            Self::Prefix(p) => key.starts_with(p.as_str()),
            Self::Regex(re) => re.is_match(key),
        }
    }
}

impl From<&CacheKey> for KeyPattern {
    fn from(key: &CacheKey) -> Self {
        Self::Exact(key.as_str().to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_empty_params_key() {
        assert_eq!(CacheKey::new(ORDER_LIST, &json!({})).as_str(), "orderList:{}");
        assert_eq!(CacheKey::new(ORDER_LIST, &()).as_str(), "orderList:{}");
        assert_eq!(CacheKey::bare(ORDER_LIST).as_str(), "orderList:{}");
    }

    #[test]
    fn test_key_is_order_independent() {
        let a = CacheKey::new(ORDER_LIST, &json!({"page": 0, "size": 20, "filter": {"b": 1, "a": 2}}));
        let b = CacheKey::new(ORDER_LIST, &json!({"filter": {"a": 2, "b": 1}, "size": 20, "page": 0}));
        assert_eq!(a, b);
        assert_eq!(
            a.as_str(),
            r#"orderList:{"filter":{"a":2,"b":1},"page":0,"size":20}"#
        );
    }

    #[test]
    fn test_null_params_are_omitted() {
        let key = CacheKey::new(ORDER_LIST, &json!({"page": 1, "status": null}));
        assert_eq!(key.as_str(), r#"orderList:{"page":1}"#);
    }

    #[test]
    fn test_detail_key() {
        let key = CacheKey::new(ORDER_DETAIL, &json!({"id": 42}));
        assert_eq!(key.as_str(), r#"orderDetail:{"id":42}"#);
    }

    #[test]
    fn test_patterns() {
        let exact = KeyPattern::Exact("orderList:{}".to_string());
        assert!(exact.matches("orderList:{}"));
        assert!(!exact.matches("orderList:{\"page\":1}"));

        let prefix = KeyPattern::resource(ORDER_LIST);
        assert!(prefix.matches("orderList:{\"page\":1}"));
        assert!(!prefix.matches("orderDetail:{\"id\":1}"));

        let regex = KeyPattern::Regex(regex::Regex::new(r#""id":(1|2)\}$"#).unwrap());
        assert!(regex.matches("orderDetail:{\"id\":2}"));
        assert!(!regex.matches("orderDetail:{\"id\":3}"));
    }
}
