//! Deterministic cache-key derivation
//!
//! The key string is what the external cache platform deduplicates stored
//! variants by. Determinism is load-bearing: identical
//! `(host, path, query, use_query_in_cache_key)` inputs must always produce
//! an identical key, or the platform silently stores duplicate entries and
//! the hit rate collapses.

use crate::models::RequestDescriptor;

/// Build the cache key for a request
///
/// When `use_query` is set the key is `host + path + "?" + query` (the query
/// part is omitted entirely when the query string is empty); otherwise the
/// key is `host + path`.
pub fn build_cache_key(request: &RequestDescriptor, use_query: bool) -> String {
    if use_query && !request.query.is_empty() {
        format!("{}{}?{}", request.host, request.path, request.query)
    } else {
        format!("{}{}", request.host, request.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(host: &str, path: &str, query: &str) -> RequestDescriptor {
        RequestDescriptor::new("https", host, path, query)
    }

    #[test]
    fn test_key_without_query() {
        let req = request("host", "/Videos/show.mp4", "");
        assert_eq!(build_cache_key(&req, false), "host/Videos/show.mp4");
        assert_eq!(build_cache_key(&req, true), "host/Videos/show.mp4");
    }

    #[test]
    fn test_key_with_query() {
        let req = request("example.com", "/a/b", "v=1&x=2");
        assert_eq!(build_cache_key(&req, true), "example.com/a/b?v=1&x=2");
        assert_eq!(build_cache_key(&req, false), "example.com/a/b");
    }

    #[test]
    fn test_key_is_deterministic() {
        let req = request("example.com", "/a/b", "v=1");
        let first = build_cache_key(&req, true);
        for _ in 0..10 {
            assert_eq!(build_cache_key(&req, true), first);
        }
    }
}
