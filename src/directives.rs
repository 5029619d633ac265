//! Directive assembly and response Cache-Control derivation
//!
//! [`FetchDirectives`] is the opaque options bag handed to the outbound
//! fetch transport. Its serialized field names (`cacheKey`, `polish`,
//! `minify`, `mirage`, `cacheEverything`, `cacheTtlByStatus`, `cacheTags`)
//! are a compatibility contract with the external edge-caching platform and
//! must be preserved byte-for-byte.

use crate::classifier::Classification;
use crate::models::TtlByStatusClass;
use serde::{Deserialize, Serialize};

/// Per-subtype minification toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MinifyDirectives {
    pub javascript: bool,
    pub css: bool,
    pub html: bool,
}

/// Platform-facing cache/transform options passed to the outbound fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchDirectives {
    #[serde(rename = "cacheKey")]
    pub cache_key: String,

    /// Image optimization mode: `"lossy"` or `"off"`
    pub polish: String,

    pub minify: MinifyDirectives,

    pub mirage: bool,

    #[serde(rename = "cacheEverything")]
    pub cache_everything: bool,

    #[serde(rename = "cacheTtlByStatus")]
    pub cache_ttl_by_status: TtlByStatusClass,

    #[serde(rename = "cacheTags")]
    pub cache_tags: Vec<String>,
}

/// The fully resolved per-request caching policy
///
/// Created fresh for each request, owned by its processing path, and
/// discarded once the response has been returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPolicy {
    /// Matched category name
    pub category: String,
    /// Deterministic cache key
    pub cache_key: String,
    /// Ordered, deduplicated cache tags
    pub tags: Vec<String>,
    /// TTL in seconds per status class
    pub ttl_by_status_class: TtlByStatusClass,
    /// Directives handed to the fetch transport
    pub directives: FetchDirectives,
}

/// Assemble the resolved policy from classifier output, key, and tags
///
/// Pure composition: transform flags map onto platform toggles, unknown or
/// absent flags stay off, and `cacheEverything` is set for every matched
/// (non-default) category so the platform caches responses the rule claims.
pub fn assemble(
    classification: &Classification,
    cache_key: String,
    tags: Vec<String>,
) -> ResolvedPolicy {
    let directives = FetchDirectives {
        cache_key: cache_key.clone(),
        polish: if classification.transform.polish_lossy {
            "lossy".to_string()
        } else {
            "off".to_string()
        },
        minify: MinifyDirectives {
            javascript: classification.transform.minify_js,
            css: classification.transform.minify_css,
            html: classification.transform.minify_html,
        },
        mirage: classification.transform.mirage,
        cache_everything: !classification.is_default,
        cache_ttl_by_status: classification.ttl_by_status_class,
        cache_tags: tags.clone(),
    };

    ResolvedPolicy {
        category: classification.category.clone(),
        cache_key,
        tags,
        ttl_by_status_class: classification.ttl_by_status_class,
        directives,
    }
}

/// Derive the `Cache-Control` header value for a response status
///
/// Selects the TTL for the status class of `status`. A TTL greater than zero
/// yields `public, max-age=<ttl>`; a zero TTL or a status outside 100-599
/// yields `None`. Callers must omit the header on `None` — an explicit
/// `max-age=0` is observably different to downstream caches from no header
/// at all.
pub fn derive_cache_control(status: u16, ttls: &TtlByStatusClass) -> Option<String> {
    let ttl = ttls.for_status(status)?;
    if ttl > 0 {
        Some(format!("public, max-age={}", ttl))
    } else {
        None
    }
}
