//! Configuration management for the cache policy engine

use crate::error::{PolicyError, Result};
use crate::models::{TransformFlags, TtlByStatusClass};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One second short of a Julian year; the conventional "cache forever" TTL
/// for immutable media assets.
pub const ONE_YEAR_SECS: u64 = 31_556_952;

/// Declarative definition of an asset category rule, as loaded from the
/// external configuration store
///
/// Definitions are compiled into [`crate::rules::AssetCategoryRule`] before
/// a rule set becomes active; an invalid pattern rejects the whole set at
/// load time and never surfaces mid-request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// Unique category name (e.g. `video`, `image`)
    pub name: String,

    /// Regex matched against the request path
    pub pattern: String,

    /// Whether the query string participates in the cache key (default: true)
    #[serde(default = "default_true")]
    pub use_query_in_cache_key: bool,

    /// TTL in seconds per status class (default: all zero, do not cache)
    #[serde(default)]
    pub ttl_by_status_class: TtlByStatusClass,

    /// Content-transform toggles (default: all off)
    #[serde(default)]
    pub transform: TransformFlags,

    /// Replaces the category name in generated `type:` cache tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_tag_override: Option<String>,
}

impl RuleDefinition {
    /// Validate this definition without compiling it into a rule set
    ///
    /// # Validation Rules
    /// - name must not be empty
    /// - pattern must be a valid regex
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PolicyError::ConfigError(
                "rule name must not be empty".to_string(),
            ));
        }
        Regex::new(&self.pattern)
            .map_err(|e| PolicyError::rule(&self.name, e.to_string()))?;
        Ok(())
    }
}

/// Configuration for the cache policy engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Address the inbound HTTP listener binds to (default: "0.0.0.0:8080")
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Base URL requests are re-issued against. When unset, requests are
    /// fetched from their own scheme/host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_base_url: Option<String>,

    /// Namespace prefix applied to every generated cache tag (default: "cf")
    #[serde(default = "default_tag_namespace")]
    pub tag_namespace: String,

    /// Interval in seconds between periodic telemetry report log lines;
    /// 0 disables the periodic task (default: 300)
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,

    /// Telemetry report HTTP endpoint configuration (optional)
    #[serde(default)]
    pub report_endpoint: Option<ReportEndpointConfig>,

    /// Ordered asset category rules; evaluation order is significant,
    /// first match wins (default: built-in video/image/manifest/static set)
    #[serde(default = "default_rules")]
    pub rules: Vec<RuleDefinition>,
}

/// Configuration for the telemetry report HTTP endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportEndpointConfig {
    /// Whether to enable the report endpoint (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Address to bind the report endpoint to (default: "127.0.0.1:9090")
    #[serde(default = "default_report_address")]
    pub address: String,
}

impl Default for ReportEndpointConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: default_report_address(),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_tag_namespace() -> String {
    "cf".to_string()
}

fn default_report_interval() -> u64 {
    300
}

fn default_report_address() -> String {
    "127.0.0.1:9090".to_string()
}

/// Built-in rule set used when the configuration omits `rules`
///
/// Patterns are anchored at the end of the path so an extension only
/// matches the final segment; unanchored variants would also match
/// lookalike directory names.
fn default_rules() -> Vec<RuleDefinition> {
    vec![
        RuleDefinition {
            name: "video".to_string(),
            pattern: r"(?i)\.(mp4|m4v|mov|webm|ogv)$".to_string(),
            use_query_in_cache_key: false,
            ttl_by_status_class: TtlByStatusClass {
                ok: ONE_YEAR_SECS,
                redirects: 3600,
                ..Default::default()
            },
            transform: TransformFlags::default(),
            cache_tag_override: None,
        },
        RuleDefinition {
            name: "image".to_string(),
            pattern: r"(?i)\.(jpe?g|png|gif|webp|avif|svg|ico)$".to_string(),
            use_query_in_cache_key: true,
            ttl_by_status_class: TtlByStatusClass {
                ok: 2_592_000,
                redirects: 3600,
                client_error: 60,
                ..Default::default()
            },
            transform: TransformFlags {
                polish_lossy: true,
                mirage: true,
                ..Default::default()
            },
            cache_tag_override: None,
        },
        RuleDefinition {
            name: "manifest".to_string(),
            pattern: r"(?i)\.(m3u8|mpd)$".to_string(),
            use_query_in_cache_key: true,
            ttl_by_status_class: TtlByStatusClass {
                ok: 10,
                ..Default::default()
            },
            transform: TransformFlags::default(),
            cache_tag_override: None,
        },
        RuleDefinition {
            name: "static".to_string(),
            pattern: r"(?i)\.(css|js|mjs|woff2?|ttf|otf)$".to_string(),
            use_query_in_cache_key: true,
            ttl_by_status_class: TtlByStatusClass {
                ok: 604_800,
                redirects: 3600,
                ..Default::default()
            },
            transform: TransformFlags {
                minify_js: true,
                minify_css: true,
                ..Default::default()
            },
            cache_tag_override: None,
        },
    ]
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            listen_address: default_listen_address(),
            origin_base_url: None,
            tag_namespace: default_tag_namespace(),
            report_interval_secs: default_report_interval(),
            report_endpoint: None,
            rules: default_rules(),
        }
    }
}

impl PolicyConfig {
    /// Load configuration from a YAML file
    ///
    /// # Arguments
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Returns
    /// * `Ok(PolicyConfig)` if loading and validation succeed
    /// * `Err(PolicyError)` if the file cannot be read or the config is invalid
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            PolicyError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        let config: PolicyConfig = serde_yaml::from_str(&content).map_err(|e| {
            PolicyError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Validation Rules
    /// - tag_namespace must not be empty or contain `:`
    /// - listen_address must not be empty
    /// - every rule must validate and rule names must be unique
    pub fn validate(&self) -> Result<()> {
        if self.listen_address.is_empty() {
            return Err(PolicyError::ConfigError(
                "listen_address must not be empty".to_string(),
            ));
        }

        if self.tag_namespace.is_empty() || self.tag_namespace.contains(':') {
            return Err(PolicyError::ConfigError(format!(
                "tag_namespace must be non-empty and must not contain ':', got '{}'",
                self.tag_namespace
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for rule in &self.rules {
            rule.validate()?;
            if !seen.insert(rule.name.as_str()) {
                return Err(PolicyError::ConfigError(format!(
                    "duplicate rule name '{}'",
                    rule.name
                )));
            }
        }

        Ok(())
    }
}
