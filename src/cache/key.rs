use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Canonical cache key
// ---------------------------------------------------------------------------

/// Cache key derived from an endpoint and its parameters.
///
/// Renders as `endpoint?k1=v1&k2=v2` with parameters sorted by name and
/// percent-encoded, so the order parameters were added in never changes the
/// key. An endpoint without parameters renders as itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    endpoint: String,
    params: BTreeMap<String, String>,
}

impl CacheKey {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter. A repeated name keeps the last value.
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Rendered key.
    pub fn render(&self) -> String {
        if self.params.is_empty() {
            return self.endpoint.clone();
        }
        let query = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.endpoint, query)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&CacheKey> for String {
    fn from(key: &CacheKey) -> Self {
        key.render()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bare_endpoint() {
        assert_eq!(CacheKey::new("posts/trending-tags").render(), "posts/trending-tags");
    }

    #[test]
    fn test_params_sorted() {
        let key = CacheKey::new("posts").param("page", 2).param("author", "sam");
        assert_eq!(key.render(), "posts?author=sam&page=2");
    }

    #[test]
    fn test_params_encoded() {
        let key = CacheKey::new("search").param("q", "a&b=c d");
        assert_eq!(key.render(), "search?q=a%26b%3Dc%20d");
    }

    proptest! {
        #[test]
        fn prop_param_order_never_changes_key(
            params in proptest::collection::btree_map("[a-z]{1,6}", "[ -~]{0,8}", 0..6)
        ) {
            let forward = params
                .iter()
                .fold(CacheKey::new("e"), |k, (n, v)| k.param(n.clone(), v));
            let backward = params
                .iter()
                .rev()
                .fold(CacheKey::new("e"), |k, (n, v)| k.param(n.clone(), v));
            prop_assert_eq!(forward.render(), backward.render());
        }

        #[test]
        fn prop_distinct_values_give_distinct_keys(a in "[ -~]{0,8}", b in "[ -~]{0,8}") {
            prop_assume!(a != b);
            let ka = CacheKey::new("e").param("x", &a).render();
            let kb = CacheKey::new("e").param("x", &b).render();
            prop_assert_ne!(ka, kb);
        }
    }
}
