//! Request classification against the active rule-set snapshot

use crate::models::{RequestDescriptor, TransformFlags, TtlByStatusClass};
use crate::rules::{RuleSetHandle, DEFAULT_CATEGORY};
use std::sync::Arc;
use tracing::debug;

/// Outcome of classifying a request
///
/// A plain-data view of the matched rule (or the fixed default category),
/// owned by the request's processing path. Cloning out of the snapshot here
/// keeps the per-request state independent of later snapshot replacements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Matched category name, or [`DEFAULT_CATEGORY`]
    pub category: String,
    /// Whether this is the fixed default ("uncached") category
    pub is_default: bool,
    /// Whether the query string participates in the cache key
    pub use_query_in_cache_key: bool,
    /// TTL in seconds per status class
    pub ttl_by_status_class: TtlByStatusClass,
    /// Content-transform toggles
    pub transform: TransformFlags,
    /// Replaces the category name in generated `type:` cache tags
    pub cache_tag_override: Option<String>,
}

impl Classification {
    /// The fixed default category: query in key, all TTLs zero, no transforms
    pub fn uncached() -> Self {
        Classification {
            category: DEFAULT_CATEGORY.to_string(),
            is_default: true,
            use_query_in_cache_key: true,
            ttl_by_status_class: TtlByStatusClass::uncached(),
            transform: TransformFlags::default(),
            cache_tag_override: None,
        }
    }
}

/// Classifies requests by walking the active rule-set snapshot in order
///
/// Classification is a pure function of the request and the snapshot: it
/// performs no I/O and cannot fail. Malformed patterns are rejected when the
/// rule set is compiled, never here.
#[derive(Clone)]
pub struct Classifier {
    rules: Arc<RuleSetHandle>,
}

impl Classifier {
    /// Create a classifier reading from the given rule-set handle
    pub fn new(rules: Arc<RuleSetHandle>) -> Self {
        Classifier { rules }
    }

    /// Classify a request into the first matching category
    ///
    /// The matcher is applied to the request path only. When no rule matches
    /// (including when no rule set has ever been installed), the fixed
    /// default category is returned: query included in the cache key and all
    /// TTLs zero, meaning "do not cache".
    pub fn classify(&self, request: &RequestDescriptor) -> Classification {
        let snapshot = self.rules.snapshot();

        match snapshot.first_match(&request.path) {
            Some(rule) => {
                debug!(
                    path = %request.path,
                    category = %rule.name,
                    "request classified"
                );
                Classification {
                    category: rule.name.clone(),
                    is_default: false,
                    use_query_in_cache_key: rule.use_query_in_cache_key,
                    ttl_by_status_class: rule.ttl_by_status_class,
                    transform: rule.transform,
                    cache_tag_override: rule.cache_tag_override.clone(),
                }
            }
            None => {
                debug!(path = %request.path, "no rule matched; using default category");
                Classification::uncached()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;
    use crate::rules::RuleSet;

    fn classifier_with_defaults() -> Classifier {
        let config = PolicyConfig::default();
        let rules = RuleSet::compile(&config.rules).unwrap();
        Classifier::new(Arc::new(RuleSetHandle::with_rules(rules)))
    }

    fn request(path: &str) -> RequestDescriptor {
        RequestDescriptor::new("https", "example.com", path, "")
    }

    #[test]
    fn test_classify_video() {
        let classifier = classifier_with_defaults();
        let classification = classifier.classify(&request("/Videos/show.mp4"));
        assert_eq!(classification.category, "video");
        assert!(!classification.is_default);
        assert!(!classification.use_query_in_cache_key);
        assert_eq!(classification.ttl_by_status_class.ok, 31_556_952);
    }

    #[test]
    fn test_classify_unknown_falls_back_to_default() {
        let classifier = classifier_with_defaults();
        let classification = classifier.classify(&request("/unknown/file.xyz"));
        assert_eq!(classification.category, DEFAULT_CATEGORY);
        assert!(classification.is_default);
        assert!(classification.use_query_in_cache_key);
        assert_eq!(classification.ttl_by_status_class, TtlByStatusClass::uncached());
    }

    #[test]
    fn test_classify_without_installed_snapshot() {
        let classifier = Classifier::new(Arc::new(RuleSetHandle::new()));
        let classification = classifier.classify(&request("/Videos/show.mp4"));
        assert!(classification.is_default);
    }

    #[test]
    fn test_classify_sees_installed_snapshot() {
        let handle = Arc::new(RuleSetHandle::new());
        let classifier = Classifier::new(Arc::clone(&handle));
        assert!(classifier.classify(&request("/a.mp4")).is_default);

        let config = PolicyConfig::default();
        handle.install(RuleSet::compile(&config.rules).unwrap());
        assert_eq!(classifier.classify(&request("/a.mp4")).category, "video");
    }
}
