//! Cache key definitions.
//!
//! Keys are a namespace tag plus a logical identifier. Equality is byte-exact
//! on both parts, which is equivalent to comparing the rendered `namespace:id`
//! form as long as namespaces never contain `:`.

use std::fmt;

/// Composite key addressing one cached value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: &'static str,
    id: String,
}

impl CacheKey {
    pub fn new(namespace: &'static str, id: impl Into<String>) -> Self {
        Self {
            namespace,
            id: id.into(),
        }
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_namespace_and_id() {
        let key = CacheKey::new("apod", "2024-01-01");
        assert_eq!(key.to_string(), "apod:2024-01-01");
        assert_eq!(key.namespace(), "apod");
        assert_eq!(key.id(), "2024-01-01");
    }

    #[test]
    fn equality_is_exact() {
        let today = CacheKey::new("apod", "today");
        assert_eq!(today, CacheKey::new("apod", "today"));
        assert_ne!(today, CacheKey::new("apod", "Today"));
        assert_ne!(today, CacheKey::new("other", "today"));
    }
}
