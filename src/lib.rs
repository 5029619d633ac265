//! Edge Cache Policy Engine
//!
//! Classifies inbound HTTP requests into asset categories, derives a caching
//! policy for each category (cache key, TTL-by-status table, cache tags,
//! content-transform directives), applies response headers, and aggregates
//! per-category telemetry about how requests were served.
//!
//! The actual cache storage and eviction are owned by an external
//! edge-caching platform: this engine only decides *how* each request should
//! be cached and hands those decisions to the fetch transport as an opaque
//! directive bag.
//!
//! # Architecture
//!
//! - [`RuleSetHandle`]: the active rule-set snapshot, replaced wholesale and
//!   never mutated in place
//! - [`Classifier`]: first-match-wins classification of a request against
//!   the snapshot, falling back to a fixed "do not cache" category
//! - [`build_cache_key`]: deterministic cache-key derivation
//! - [`TagGenerator`]: namespaced, deduplicated cache tags for bulk
//!   invalidation by host, category, path prefix, or extension
//! - [`FetchDirectives`] / [`assemble`]: the platform-facing options bag and
//!   the per-request [`ResolvedPolicy`]
//! - [`RequestHandler`]: orchestration — classify, assemble, fetch, apply
//!   headers, record telemetry; failures become a fixed `500` + `no-store`
//! - [`TelemetryAggregator`] / [`CacheAnalytics`]: explicit, lifetime-scoped
//!   aggregate state with point-in-time reports and reset
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use edge_cache_policy::{
//!     CacheAnalytics, Classifier, HttpOriginFetcher, PolicyConfig, RequestHandler,
//!     RuleSet, RuleSetHandle, TagGenerator, TelemetryAggregator,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PolicyConfig::default();
//! let rules = Arc::new(RuleSetHandle::with_rules(RuleSet::compile(&config.rules)?));
//!
//! let handler = RequestHandler::new(
//!     Classifier::new(rules),
//!     TagGenerator::new(&config.tag_namespace),
//!     Arc::new(HttpOriginFetcher::new(config.origin_base_url.clone())?),
//!     Arc::new(TelemetryAggregator::new()),
//!     Arc::new(CacheAnalytics::new()),
//! );
//!
//! let report = handler.telemetry().report(false);
//! println!("operations so far: {}", report.total_operations);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded from a YAML file; rules are evaluated in order
//! and the first match wins:
//!
//! ```yaml
//! listen_address: "0.0.0.0:8080"
//! tag_namespace: cf
//! rules:
//!   - name: video
//!     pattern: '(?i)\.(mp4|webm)$'
//!     use_query_in_cache_key: false
//!     ttl_by_status_class:
//!       ok: 31556952
//! ```
//!
//! Invalid patterns are rejected when the rule set is compiled; a request is
//! never failed by a malformed rule. See [`PolicyConfig`] for the full set
//! of options.

pub mod analytics;
pub mod cache_key;
pub mod classifier;
pub mod config;
pub mod directives;
pub mod error;
pub mod handler;
pub mod models;
pub mod origin;
pub mod report_endpoint;
pub mod rules;
pub mod tags;
pub mod telemetry;

// Re-export commonly used types
pub use analytics::{AnalyticsReport, CacheAnalytics, CategoryCacheStats};
pub use cache_key::build_cache_key;
pub use classifier::{Classification, Classifier};
pub use config::{PolicyConfig, ReportEndpointConfig, RuleDefinition, ONE_YEAR_SECS};
pub use directives::{
    assemble, derive_cache_control, FetchDirectives, MinifyDirectives, ResolvedPolicy,
};
pub use error::{PolicyError, Result};
pub use handler::{RequestHandler, CACHE_TAG_HEADER, DEBUG_HEADER};
pub use models::{
    CacheStatus, RequestDescriptor, StatusClass, TransformFlags, TtlByStatusClass,
};
pub use origin::{HttpOriginFetcher, OriginFetcher, OriginResponse, DIRECTIVES_HEADER};
pub use report_endpoint::{PrometheusExporter, ReportEndpoint};
pub use rules::{AssetCategoryRule, RuleSet, RuleSetHandle, DEFAULT_CATEGORY};
pub use tags::TagGenerator;
pub use telemetry::{
    BreakdownStats, Measured, MetricsReport, OperationId, TelemetryAggregator,
};
