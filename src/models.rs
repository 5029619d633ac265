//! Core data models for the cache policy engine

use serde::{Deserialize, Serialize};

/// One of the five HTTP status-code buckets used to select a TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusClass {
    /// 1xx informational responses
    Info,
    /// 2xx successful responses
    Ok,
    /// 3xx redirects
    Redirects,
    /// 4xx client errors
    ClientError,
    /// 5xx server errors
    ServerError,
}

impl StatusClass {
    /// Map an HTTP status code to its status class
    ///
    /// Returns `None` for codes outside 100-599, which never select a TTL.
    pub fn from_status(status: u16) -> Option<StatusClass> {
        match status {
            100..=199 => Some(StatusClass::Info),
            200..=299 => Some(StatusClass::Ok),
            300..=399 => Some(StatusClass::Redirects),
            400..=499 => Some(StatusClass::ClientError),
            500..=599 => Some(StatusClass::ServerError),
            _ => None,
        }
    }
}

/// TTL in seconds for each status class
///
/// A TTL of 0 means "do not cache responses in this class". The serialized
/// field names (`info`, `ok`, `redirects`, `clientError`, `serverError`) are
/// a compatibility contract with the edge-caching transport and must not
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtlByStatusClass {
    #[serde(default)]
    pub info: u64,
    #[serde(default)]
    pub ok: u64,
    #[serde(default)]
    pub redirects: u64,
    #[serde(default)]
    pub client_error: u64,
    #[serde(default)]
    pub server_error: u64,
}

impl TtlByStatusClass {
    /// TTL table that caches nothing
    pub fn uncached() -> Self {
        Self::default()
    }

    /// Get the TTL for a status class
    pub fn get(&self, class: StatusClass) -> u64 {
        match class {
            StatusClass::Info => self.info,
            StatusClass::Ok => self.ok,
            StatusClass::Redirects => self.redirects,
            StatusClass::ClientError => self.client_error,
            StatusClass::ServerError => self.server_error,
        }
    }

    /// Get the TTL selected by an HTTP status code, if the code maps to a class
    pub fn for_status(&self, status: u16) -> Option<u64> {
        StatusClass::from_status(status).map(|class| self.get(class))
    }
}

/// Content-transform toggles carried by an asset category rule
///
/// Absent flags default to off; the directive assembler never enables a
/// transform the rule did not ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransformFlags {
    /// Lossy image optimization
    #[serde(default)]
    pub polish_lossy: bool,
    /// Script minification
    #[serde(default)]
    pub minify_js: bool,
    /// Stylesheet minification
    #[serde(default)]
    pub minify_css: bool,
    /// Markup minification
    #[serde(default)]
    pub minify_html: bool,
    /// Low-bandwidth image loading
    #[serde(default)]
    pub mirage: bool,
}

/// Cache-status signal reported by the edge platform for a completed response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    Hit,
    Miss,
    Expired,
    Bypass,
    Error,
}

impl CacheStatus {
    /// Parse the externally reported signal (e.g. a `cf-cache-status` header)
    ///
    /// Absent or unrecognized signals default to `Miss`.
    pub fn from_signal(signal: Option<&str>) -> CacheStatus {
        match signal.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
            Some("HIT") => CacheStatus::Hit,
            Some("EXPIRED") => CacheStatus::Expired,
            Some("BYPASS") => CacheStatus::Bypass,
            Some("ERROR") => CacheStatus::Error,
            _ => CacheStatus::Miss,
        }
    }

    /// Stable label used as a breakdown key
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Expired => "EXPIRED",
            CacheStatus::Bypass => "BYPASS",
            CacheStatus::Error => "ERROR",
        }
    }
}

/// Descriptor of an inbound request, exposing the surfaces the policy
/// engine matches on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// URL scheme (`http` or `https`)
    pub scheme: String,
    /// Host name, without port
    pub host: String,
    /// Path, always starting with `/`
    pub path: String,
    /// Raw query string without the leading `?`; empty when absent
    pub query: String,
    /// Whether the client asked for diagnostic response headers
    /// (a `debug: true` request header)
    pub debug: bool,
}

impl RequestDescriptor {
    /// Create a descriptor from URL components
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        path: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        RequestDescriptor {
            scheme: scheme.into(),
            host: host.into(),
            path,
            query: query.into(),
            debug: false,
        }
    }

    /// Mark the request as carrying the diagnostic `debug` header
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Full request URL
    pub fn url(&self) -> String {
        if self.query.is_empty() {
            format!("{}://{}{}", self.scheme, self.host, self.path)
        } else {
            format!("{}://{}{}?{}", self.scheme, self.host, self.path, self.query)
        }
    }

    /// Non-empty path segments, in order
    pub fn path_segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Lowercased file extension of the final path segment, if any
    pub fn extension(&self) -> Option<String> {
        let last = self.path.rsplit('/').next()?;
        let (stem, ext) = last.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}
