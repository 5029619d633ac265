//! Telemetry report HTTP endpoint
//!
//! Serves the aggregated telemetry as JSON at `/report` (add `?summary=true`
//! to drop the per-category breakdowns), the cache analytics at
//! `/analytics`, and a Prometheus rendering at `/metrics`. External
//! schedulers scrape these; nothing here mutates aggregator state.

use crate::analytics::CacheAnalytics;
use crate::telemetry::{MetricsReport, TelemetryAggregator};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, Gauge, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Registry-backed Prometheus view of the telemetry report
///
/// Gauges are set from a fresh report at each scrape, so the exposition
/// always reflects the aggregator's current counters.
pub struct PrometheusExporter {
    registry: Registry,
    operations_total: IntGauge,
    hits_total: IntGauge,
    misses_total: IntGauge,
    errors_total: IntGauge,
    pending_operations: IntGauge,
    hit_rate: Gauge,
    avg_duration_us: Gauge,
    category_operations: IntGaugeVec,
    category_hits: IntGaugeVec,
}

impl PrometheusExporter {
    /// Create an exporter with its own registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let operations_total = IntGauge::new(
            "edge_cache_policy_operations_total",
            "Total number of operations started",
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let hits_total = IntGauge::new(
            "edge_cache_policy_hits_total",
            "Number of operations ended as cache hits",
        )?;
        registry.register(Box::new(hits_total.clone()))?;

        let misses_total = IntGauge::new(
            "edge_cache_policy_misses_total",
            "Number of operations ended as cache misses",
        )?;
        registry.register(Box::new(misses_total.clone()))?;

        let errors_total = IntGauge::new(
            "edge_cache_policy_errors_total",
            "Number of operations ended with an error",
        )?;
        registry.register(Box::new(errors_total.clone()))?;

        let pending_operations = IntGauge::new(
            "edge_cache_policy_pending_operations",
            "Operations started but not yet ended",
        )?;
        registry.register(Box::new(pending_operations.clone()))?;

        let hit_rate = Gauge::new(
            "edge_cache_policy_hit_rate",
            "Cache hits divided by total operations",
        )?;
        registry.register(Box::new(hit_rate.clone()))?;

        let avg_duration_us = Gauge::new(
            "edge_cache_policy_avg_duration_us",
            "Mean operation duration in microseconds",
        )?;
        registry.register(Box::new(avg_duration_us.clone()))?;

        let category_operations = IntGaugeVec::new(
            Opts::new(
                "edge_cache_policy_category_operations",
                "Operations ended, by asset category",
            ),
            &["category"],
        )?;
        registry.register(Box::new(category_operations.clone()))?;

        let category_hits = IntGaugeVec::new(
            Opts::new(
                "edge_cache_policy_category_hits",
                "Cache hits, by asset category",
            ),
            &["category"],
        )?;
        registry.register(Box::new(category_hits.clone()))?;

        Ok(Self {
            registry,
            operations_total,
            hits_total,
            misses_total,
            errors_total,
            pending_operations,
            hit_rate,
            avg_duration_us,
            category_operations,
            category_hits,
        })
    }

    /// Render a report in Prometheus exposition format
    pub fn render(&self, report: &MetricsReport) -> String {
        self.operations_total.set(report.total_operations as i64);
        self.hits_total.set(report.hits as i64);
        self.misses_total.set(report.misses as i64);
        self.errors_total.set(report.errors as i64);
        self.pending_operations.set(report.pending_operations as i64);
        self.hit_rate.set(report.hit_rate);
        self.avg_duration_us.set(report.avg_duration_us);

        if let Some(by_category) = &report.by_category {
            for (category, stats) in by_category {
                self.category_operations
                    .with_label_values(&[category])
                    .set(stats.operations as i64);
                self.category_hits
                    .with_label_values(&[category])
                    .set(stats.hits as i64);
            }
        }

        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            error!(error = %e, "failed to encode prometheus metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Report endpoint server
pub struct ReportEndpoint {
    telemetry: Arc<TelemetryAggregator>,
    analytics: Arc<CacheAnalytics>,
    addr: SocketAddr,
}

impl ReportEndpoint {
    /// Create a new report endpoint
    pub fn new(
        telemetry: Arc<TelemetryAggregator>,
        analytics: Arc<CacheAnalytics>,
        addr: SocketAddr,
    ) -> Self {
        Self {
            telemetry,
            analytics,
            addr,
        }
    }

    /// Start the endpoint server
    ///
    /// Listens on the configured address and serves until the process exits.
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("Report endpoint listening on http://{}", self.addr);

        let exporter = Arc::new(
            PrometheusExporter::new()
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?,
        );

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let telemetry = Arc::clone(&self.telemetry);
            let analytics = Arc::clone(&self.analytics);
            let exporter = Arc::clone(&exporter);

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let telemetry = Arc::clone(&telemetry);
                    let analytics = Arc::clone(&analytics);
                    let exporter = Arc::clone(&exporter);
                    async move { handle_request(req, telemetry, analytics, exporter).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving report connection: {:?}", err);
                }
            });
        }
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    telemetry: Arc<TelemetryAggregator>,
    analytics: Arc<CacheAnalytics>,
    exporter: Arc<PrometheusExporter>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    match req.uri().path() {
        "/report" => {
            let summary = req
                .uri()
                .query()
                .map(|q| q.contains("summary=true"))
                .unwrap_or(false);
            Ok(json_response(&telemetry.report(!summary)))
        }
        "/analytics" => Ok(json_response(&analytics.report())),
        "/metrics" => {
            let body = exporter.render(&telemetry.report(true));
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        "/healthz" => Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/plain")
            .body(Full::new(Bytes::from_static(b"OK\n")))
            .unwrap()),
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from_static(b"Not Found\n")))
            .unwrap()),
    }
}

fn json_response<T: serde::Serialize>(value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec_pretty(value) {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(body)))
            .unwrap(),
        Err(e) => {
            error!(error = %e, "failed to serialize report");
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::from_static(b"serialization error\n")))
                .unwrap()
        }
    }
}
