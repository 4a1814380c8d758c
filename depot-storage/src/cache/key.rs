//! Namespaced cache keys.
//!
//! Every entry the adapter caches lives under a namespace so that other
//! consumers of the same cache cannot collide with object keys.

use std::fmt;

/// Namespace for object contents fetched from the store.
pub const S3_FILE_NAMESPACE: &str = "s3-file";

/// A cache key: a fixed namespace plus an object path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    namespace: &'static str,
    path: String,
}

impl CacheKey {
    pub fn new(namespace: &'static str, path: impl Into<String>) -> Self {
        Self {
            namespace,
            path: path.into(),
        }
    }

    /// Key for the contents of the object at `path`.
    pub fn s3_file(path: impl Into<String>) -> Self {
        Self::new(S3_FILE_NAMESPACE, path)
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_s3_file_key() {
        let key = CacheKey::s3_file("components/foo/1.0.0/package.json");
        assert_eq!(key.namespace(), S3_FILE_NAMESPACE);
        assert_eq!(key.path(), "components/foo/1.0.0/package.json");
        assert_eq!(key.to_string(), "s3-file:components/foo/1.0.0/package.json");
    }

    #[test]
    fn test_namespaces_do_not_collide() {
        let mut keys = HashSet::new();
        keys.insert(CacheKey::s3_file("a"));
        keys.insert(CacheKey::new("other", "a"));
        keys.insert(CacheKey::s3_file("a"));
        assert_eq!(keys.len(), 2);
    }
}
