//! Edge Cache Policy Engine server
//!
//! Main entry point: loads configuration, sets up logging, wires the policy
//! engine together, and runs the inbound HTTP listener plus the optional
//! report endpoint and periodic report logging task.

use edge_cache_policy::{
    CacheAnalytics, Classifier, HttpOriginFetcher, PolicyConfig, ReportEndpoint,
    RequestDescriptor, RequestHandler, RuleSet, RuleSetHandle, TagGenerator,
    TelemetryAggregator,
};
use anyhow::Context;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting Edge Cache Policy Engine");

    // Optional config file path from the command line; defaults otherwise
    let config = match env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            match PolicyConfig::from_file(&path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    error!("Failed to load configuration: {}", e);
                    std::process::exit(1);
                }
            }
        }
        None => {
            info!("No config file given; using built-in defaults");
            PolicyConfig::default()
        }
    };

    info!("  - Listen address: {}", config.listen_address);
    info!("  - Tag namespace: {}", config.tag_namespace);
    info!("  - Rules: {}", config.rules.len());
    for rule in &config.rules {
        info!("      {} -> {}", rule.name, rule.pattern);
    }

    let rules = RuleSet::compile(&config.rules)
        .context("rule set rejected at load time")?;
    let rule_handle = Arc::new(RuleSetHandle::with_rules(rules));

    let telemetry = Arc::new(TelemetryAggregator::new());
    let analytics = Arc::new(CacheAnalytics::new());
    let origin = Arc::new(
        HttpOriginFetcher::new(config.origin_base_url.clone())
            .context("failed to build origin fetcher")?,
    );

    let handler = Arc::new(RequestHandler::new(
        Classifier::new(rule_handle),
        TagGenerator::new(&config.tag_namespace),
        origin,
        Arc::clone(&telemetry),
        Arc::clone(&analytics),
    ));

    // Report endpoint, if enabled
    if let Some(endpoint) = &config.report_endpoint {
        if endpoint.enabled {
            let addr = endpoint
                .address
                .parse()
                .context("invalid report endpoint address")?;
            let report = ReportEndpoint::new(Arc::clone(&telemetry), Arc::clone(&analytics), addr);
            tokio::spawn(async move {
                if let Err(e) = report.start().await {
                    error!("Report endpoint failed: {}", e);
                }
            });
        }
    }

    // Periodic summary logging for external telemetry collection
    if config.report_interval_secs > 0 {
        let telemetry = Arc::clone(&telemetry);
        let interval = Duration::from_secs(config.report_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                let report = telemetry.report(false);
                info!(
                    total = report.total_operations,
                    hits = report.hits,
                    misses = report.misses,
                    errors = report.errors,
                    hit_rate = report.hit_rate,
                    "telemetry summary"
                );
            }
        });
    }

    let listener = TcpListener::bind(&config.listen_address)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_address))?;
    info!("Listening on http://{}", config.listen_address);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let handler = Arc::clone(&handler);

        tokio::task::spawn(async move {
            let service = service_fn(move |req| {
                let handler = Arc::clone(&handler);
                async move { serve_request(req, handler).await }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                error!("Error serving connection: {:?}", err);
            }
        });
    }
}

/// Convert an inbound hyper request into a descriptor and serve it
async fn serve_request(
    req: Request<hyper::body::Incoming>,
    handler: Arc<RequestHandler>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let descriptor = descriptor_from_request(&req);
    let response = handler.handle(&descriptor).await;

    let (parts, body) = response.into_parts();
    Ok(Response::from_parts(parts, Full::new(body)))
}

/// Build a [`RequestDescriptor`] from an inbound request
fn descriptor_from_request(req: &Request<hyper::body::Incoming>) -> RequestDescriptor {
    let host = req
        .headers()
        .get(hyper::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|h| h.split(':').next().unwrap_or(h).to_string())
        .or_else(|| req.uri().host().map(|h| h.to_string()))
        .unwrap_or_else(|| "localhost".to_string());

    let debug = req
        .headers()
        .get("debug")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    RequestDescriptor::new(
        req.uri().scheme_str().unwrap_or("http"),
        host,
        req.uri().path(),
        req.uri().query().unwrap_or(""),
    )
    .with_debug(debug)
}
