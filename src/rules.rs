//! Compiled asset category rules and the active rule-set snapshot

use crate::config::RuleDefinition;
use crate::error::{PolicyError, Result};
use crate::models::{TransformFlags, TtlByStatusClass};
use regex::Regex;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Category name returned when no rule matches (or no rule set has been
/// installed). Requests in this category are never cached.
pub const DEFAULT_CATEGORY: &str = "uncached";

/// A compiled asset category rule
///
/// Compiled once when the rule set is built; immutable afterwards. The
/// matcher is applied to the request path only.
#[derive(Debug, Clone)]
pub struct AssetCategoryRule {
    /// Unique category name
    pub name: String,
    /// Compiled path matcher
    matcher: Regex,
    /// Whether the query string participates in the cache key
    pub use_query_in_cache_key: bool,
    /// TTL in seconds per status class
    pub ttl_by_status_class: TtlByStatusClass,
    /// Content-transform toggles
    pub transform: TransformFlags,
    /// Replaces the category name in generated `type:` cache tags
    pub cache_tag_override: Option<String>,
}

impl AssetCategoryRule {
    /// Compile a rule definition
    ///
    /// # Returns
    /// * `Ok(AssetCategoryRule)` if the pattern compiles
    /// * `Err(PolicyError::RuleError)` otherwise
    pub fn compile(def: &RuleDefinition) -> Result<Self> {
        if def.name.trim().is_empty() {
            return Err(PolicyError::ConfigError(
                "rule name must not be empty".to_string(),
            ));
        }
        let matcher = Regex::new(&def.pattern)
            .map_err(|e| PolicyError::rule(&def.name, e.to_string()))?;
        Ok(AssetCategoryRule {
            name: def.name.clone(),
            matcher,
            use_query_in_cache_key: def.use_query_in_cache_key,
            ttl_by_status_class: def.ttl_by_status_class,
            transform: def.transform,
            cache_tag_override: def.cache_tag_override.clone(),
        })
    }

    /// Whether this rule matches the given request path
    pub fn matches(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }
}

/// An ordered, immutable set of compiled rules
///
/// Evaluation order is significant: `first_match` walks the rules in the
/// order they were defined and stops at the first hit.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<AssetCategoryRule>,
}

impl RuleSet {
    /// An empty rule set; every request falls through to the default category
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile an ordered list of rule definitions into a rule set
    ///
    /// Any invalid definition rejects the whole set, so a partially valid
    /// configuration never becomes active.
    pub fn compile(defs: &[RuleDefinition]) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        let mut rules = Vec::with_capacity(defs.len());
        for def in defs {
            let rule = AssetCategoryRule::compile(def)?;
            if !seen.insert(rule.name.clone()) {
                return Err(PolicyError::ConfigError(format!(
                    "duplicate rule name '{}'",
                    rule.name
                )));
            }
            rules.push(rule);
        }
        Ok(RuleSet { rules })
    }

    /// Number of rules in the set
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set contains no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate over the rules in evaluation order
    pub fn iter(&self) -> impl Iterator<Item = &AssetCategoryRule> {
        self.rules.iter()
    }

    /// First rule whose matcher accepts the path, in definition order
    pub fn first_match(&self, path: &str) -> Option<&AssetCategoryRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }
}

/// Handle to the active rule-set snapshot
///
/// Readers clone the current `Arc` and keep classifying against a stable
/// snapshot; writers install a complete new set wholesale. A rule set is
/// never mutated in place, so concurrent readers cannot observe a partial
/// update.
#[derive(Debug)]
pub struct RuleSetHandle {
    active: RwLock<Arc<RuleSet>>,
}

impl Default for RuleSetHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleSetHandle {
    /// Create a handle with no rules installed
    ///
    /// Until a snapshot is installed, every request classifies into the
    /// default "do not cache" category rather than failing.
    pub fn new() -> Self {
        RuleSetHandle {
            active: RwLock::new(Arc::new(RuleSet::empty())),
        }
    }

    /// Create a handle with an initial rule set
    pub fn with_rules(rules: RuleSet) -> Self {
        RuleSetHandle {
            active: RwLock::new(Arc::new(rules)),
        }
    }

    /// Get the current snapshot
    pub fn snapshot(&self) -> Arc<RuleSet> {
        // Lock poisoning only happens if a writer panicked mid-swap; the
        // stored Arc is still a complete snapshot, so keep serving it.
        match self.active.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the active snapshot wholesale
    pub fn install(&self, rules: RuleSet) {
        let count = rules.len();
        let next = Arc::new(rules);
        match self.active.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        info!(rule_count = count, "installed new rule-set snapshot");
    }
}
