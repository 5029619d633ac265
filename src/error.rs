//! Error types for the cache policy engine

use thiserror::Error;

/// Result type alias for policy engine operations
pub type Result<T> = std::result::Result<T, PolicyError>;

/// Error types that can occur in the cache policy engine
#[derive(Error, Debug, Clone)]
pub enum PolicyError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A rule definition failed to compile. Raised only while a rule set
    /// is being built, never on the per-request classification path.
    #[error("Invalid rule '{name}': {reason}")]
    RuleError { name: String, reason: String },

    #[error("Origin fetch error: {0}")]
    OriginFetchError(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<std::io::Error> for PolicyError {
    fn from(err: std::io::Error) -> Self {
        PolicyError::IoError(err.to_string())
    }
}

impl From<http::Error> for PolicyError {
    fn from(err: http::Error) -> Self {
        PolicyError::HttpError(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for PolicyError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        PolicyError::HttpError(err.to_string())
    }
}

impl PolicyError {
    /// Create a RuleError from a rule name and a reason
    pub fn rule(name: impl Into<String>, reason: impl Into<String>) -> Self {
        PolicyError::RuleError {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is a load-time configuration problem, as opposed
    /// to a per-request failure.
    ///
    /// Load-time errors reject the configuration before it becomes active;
    /// request-path errors are converted into the generic `500` response by
    /// the request handler.
    pub fn is_load_time(&self) -> bool {
        matches!(
            self,
            PolicyError::ConfigError(_) | PolicyError::RuleError { .. }
        )
    }
}
