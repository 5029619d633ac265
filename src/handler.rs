//! Request handling orchestration
//!
//! Drives one request through classify → assemble directives → origin fetch
//! → response header application → telemetry, and converts any failure along
//! the way into a fixed `500` response carrying `Cache-Control: no-store`.
//! The origin fetch is the only suspension point; everything else is
//! synchronous and CPU-bound.

use crate::analytics::CacheAnalytics;
use crate::cache_key::build_cache_key;
use crate::classifier::{Classification, Classifier};
use crate::directives::{assemble, derive_cache_control, ResolvedPolicy};
use crate::error::Result;
use crate::models::{CacheStatus, RequestDescriptor};
use crate::origin::OriginFetcher;
use crate::tags::TagGenerator;
use crate::telemetry::TelemetryAggregator;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CACHE_CONTROL, CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::Response;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Strategy label recorded with every operation this handler serves
const FETCH_STRATEGY: &str = "edge-fetch";

/// Diagnostic header emitted when the request carries `debug: true`
pub const DEBUG_HEADER: &str = "x-cache-debug";

/// Response header carrying the comma-joined cache tags
pub const CACHE_TAG_HEADER: &str = "cache-tag";

/// Orchestrates request serving against the policy engine
///
/// Holds the classifier, tag generator, origin transport, and the explicit
/// aggregator instances. Cheap to clone; one instance is shared across all
/// concurrent requests.
#[derive(Clone)]
pub struct RequestHandler {
    classifier: Classifier,
    tags: TagGenerator,
    origin: Arc<dyn OriginFetcher>,
    telemetry: Arc<TelemetryAggregator>,
    analytics: Arc<CacheAnalytics>,
}

impl RequestHandler {
    /// Create a handler from its collaborators
    pub fn new(
        classifier: Classifier,
        tags: TagGenerator,
        origin: Arc<dyn OriginFetcher>,
        telemetry: Arc<TelemetryAggregator>,
        analytics: Arc<CacheAnalytics>,
    ) -> Self {
        RequestHandler {
            classifier,
            tags,
            origin,
            telemetry,
            analytics,
        }
    }

    /// Get a reference to the telemetry aggregator
    pub fn telemetry(&self) -> &TelemetryAggregator {
        &self.telemetry
    }

    /// Get a reference to the cache analytics aggregator
    pub fn analytics(&self) -> &CacheAnalytics {
        &self.analytics
    }

    /// Serve one request
    ///
    /// Always returns a response: failures are logged with the request URL
    /// and answered with the fixed `500` + `Cache-Control: no-store`, never
    /// rethrown and never retried from this layer.
    pub async fn handle(&self, request: &RequestDescriptor) -> Response<Bytes> {
        let started = Instant::now();
        let classification = self.classifier.classify(request);
        let content_type = request
            .extension()
            .unwrap_or_else(|| "unknown".to_string());
        let operation = self
            .telemetry
            .begin(FETCH_STRATEGY, &content_type, &classification.category);

        match self.process(request, &classification).await {
            Ok((response, signal)) => {
                let hit = CacheStatus::from_signal(signal.as_deref()) == CacheStatus::Hit;
                self.telemetry
                    .end(operation, response.status().as_u16(), hit, false);
                self.analytics
                    .record(&classification.category, signal.as_deref(), started.elapsed());
                response
            }
            Err(e) => {
                error!(url = %request.url(), error = %e, "request failed; returning generic error");
                self.telemetry.end(operation, 500, false, true);
                self.analytics.record(
                    &classification.category,
                    Some(CacheStatus::Error.as_str()),
                    started.elapsed(),
                );
                error_response()
            }
        }
    }

    /// Resolve the caching policy for a request without fetching anything
    ///
    /// Exposed for operational inspection; the request path goes through
    /// [`handle`](Self::handle).
    pub fn resolve_policy(&self, request: &RequestDescriptor) -> ResolvedPolicy {
        let classification = self.classifier.classify(request);
        self.assemble_policy(request, &classification)
    }

    fn assemble_policy(
        &self,
        request: &RequestDescriptor,
        classification: &Classification,
    ) -> ResolvedPolicy {
        let key = build_cache_key(request, classification.use_query_in_cache_key);
        let tags = self.tags.generate(request, classification);
        assemble(classification, key, tags)
    }

    async fn process(
        &self,
        request: &RequestDescriptor,
        classification: &Classification,
    ) -> Result<(Response<Bytes>, Option<String>)> {
        let policy = self.assemble_policy(request, classification);
        debug!(
            url = %request.url(),
            category = %policy.category,
            cache_key = %policy.cache_key,
            "directives assembled"
        );

        let origin_response = self.origin.fetch(request, &policy.directives).await?;
        let signal = origin_response.cache_status_signal();

        let mut builder = Response::builder().status(origin_response.status);
        if let Some(headers) = builder.headers_mut() {
            for (name, value) in origin_response.headers.iter() {
                if should_copy_header(name) {
                    headers.append(name.clone(), value.clone());
                }
            }
            if let Some(cache_control) =
                derive_cache_control(origin_response.status, &policy.ttl_by_status_class)
            {
                headers.insert(CACHE_CONTROL, HeaderValue::from_str(&cache_control)?);
            }
            if !policy.tags.is_empty() {
                headers.insert(
                    HeaderName::from_static(CACHE_TAG_HEADER),
                    HeaderValue::from_str(&policy.tags.join(","))?,
                );
            }
            if request.debug {
                headers.insert(
                    HeaderName::from_static(DEBUG_HEADER),
                    HeaderValue::from_str(&debug_payload(&policy))?,
                );
            }
        }

        let response = builder.body(origin_response.body)?;
        Ok((response, signal))
    }
}

/// Headers the handler never copies from the origin response
///
/// Cache-Control and Cache-Tag are owned by the policy engine; the framing
/// headers are recomputed by the server for the re-assembled body.
fn should_copy_header(name: &HeaderName) -> bool {
    name != CACHE_CONTROL
        && name != CONNECTION
        && name != CONTENT_LENGTH
        && name != TRANSFER_ENCODING
        && name.as_str() != CACHE_TAG_HEADER
}

/// Serialized diagnostic structure for the `x-cache-debug` header
fn debug_payload(policy: &ResolvedPolicy) -> String {
    serde_json::json!({
        "category": policy.category,
        "cacheKey": policy.cache_key,
        "ttlByStatusClass": policy.ttl_by_status_class,
        "tags": policy.tags,
    })
    .to_string()
}

/// The fixed failure response: generic `500`, never cached downstream
fn error_response() -> Response<Bytes> {
    Response::builder()
        .status(500)
        .header(CACHE_CONTROL, "no-store")
        .body(Bytes::from_static(b"Internal Server Error"))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_shape() {
        let response = error_response();
        assert_eq!(response.status(), 500);
        assert_eq!(
            response.headers().get(CACHE_CONTROL).unwrap(),
            "no-store"
        );
    }

    #[test]
    fn test_header_copy_filter() {
        assert!(!should_copy_header(&CACHE_CONTROL));
        assert!(!should_copy_header(&CONTENT_LENGTH));
        assert!(!should_copy_header(&HeaderName::from_static("cache-tag")));
        assert!(should_copy_header(&HeaderName::from_static("content-type")));
        assert!(should_copy_header(&HeaderName::from_static("etag")));
    }
}
