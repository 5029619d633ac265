//! Origin fetch boundary
//!
//! The request handler hands the assembled [`FetchDirectives`] to this
//! boundary and awaits the origin response; it is the only suspension point
//! in the request path. Retry, if any, belongs to the transport behind this
//! trait, never to the policy engine.

use crate::directives::FetchDirectives;
use crate::error::{PolicyError, Result};
use crate::models::RequestDescriptor;
use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use std::time::Duration;
use tracing::debug;

/// Response returned by the origin transport
#[derive(Debug, Clone)]
pub struct OriginResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OriginResponse {
    /// The platform-reported cache-status signal, if the transport set one
    pub fn cache_status_signal(&self) -> Option<String> {
        self.headers
            .get("cf-cache-status")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }
}

/// Transport boundary for outbound origin fetches
#[async_trait]
pub trait OriginFetcher: Send + Sync {
    /// Fetch the request from the origin, honoring the cache directives
    async fn fetch(
        &self,
        request: &RequestDescriptor,
        directives: &FetchDirectives,
    ) -> Result<OriginResponse>;
}

/// Header the HTTP transport serializes the directive bag into
pub const DIRECTIVES_HEADER: &str = "x-cache-directives";

/// HTTP origin fetcher backed by a shared reqwest client
///
/// When `base_url` is set, requests are re-issued against it (path and query
/// preserved); otherwise they are fetched from their own scheme and host.
/// The directive bag rides along as a serialized `x-cache-directives`
/// header so the downstream edge transport can apply it.
pub struct HttpOriginFetcher {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpOriginFetcher {
    /// Create a fetcher with a default client (30s timeout)
    pub fn new(base_url: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PolicyError::OriginFetchError(e.to_string()))?;
        Ok(HttpOriginFetcher { client, base_url })
    }

    /// Create a fetcher around an existing client
    pub fn with_client(client: reqwest::Client, base_url: Option<String>) -> Self {
        HttpOriginFetcher { client, base_url }
    }

    fn target_url(&self, request: &RequestDescriptor) -> String {
        match &self.base_url {
            Some(base) => {
                let mut url = format!("{}{}", base.trim_end_matches('/'), request.path);
                if !request.query.is_empty() {
                    url.push('?');
                    url.push_str(&request.query);
                }
                url
            }
            None => request.url(),
        }
    }
}

#[async_trait]
impl OriginFetcher for HttpOriginFetcher {
    async fn fetch(
        &self,
        request: &RequestDescriptor,
        directives: &FetchDirectives,
    ) -> Result<OriginResponse> {
        let url = self.target_url(request);
        let directives_json = serde_json::to_string(directives)
            .map_err(|e| PolicyError::InternalError(e.to_string()))?;

        debug!(url = %url, cache_key = %directives.cache_key, "fetching from origin");

        let response = self
            .client
            .get(&url)
            .header(DIRECTIVES_HEADER, directives_json)
            .header("host", &request.host)
            .send()
            .await
            .map_err(|e| PolicyError::OriginFetchError(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| PolicyError::OriginFetchError(e.to_string()))?;

        Ok(OriginResponse {
            status,
            headers,
            body,
        })
    }
}
