//! Cache analytics keyed by the platform-reported cache-status signal
//!
//! Complements the operation-level telemetry: each completed response is
//! classified by the edge platform's `cf-cache-status` signal
//! (`HIT|MISS|EXPIRED|BYPASS|ERROR`, defaulting to `MISS` when absent or
//! unrecognized) and counted overall and per asset category.

use crate::models::CacheStatus;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Counters for one asset category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCacheStats {
    pub total: u64,
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub bypass: u64,
    pub errors: u64,
}

#[derive(Debug, Default)]
struct AnalyticsState {
    overall: CategoryCacheStats,
    hit_duration_us: u64,
    miss_duration_us: u64,
    by_category: HashMap<String, CategoryCacheStats>,
}

/// Point-in-time cache analytics report
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub total: u64,
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub bypass: u64,
    pub errors: u64,
    /// `hits / total`, 0 when total is 0
    pub hit_rate: f64,
    /// Mean duration of hit responses in microseconds
    pub avg_hit_duration_us: f64,
    /// Mean duration of non-hit responses in microseconds
    pub avg_miss_duration_us: f64,
    pub by_category: HashMap<String, CategoryCacheStats>,
}

/// Aggregates cache-status outcomes per response
///
/// Constructed once per process (or per test) and passed explicitly, like
/// [`crate::telemetry::TelemetryAggregator`].
#[derive(Debug, Default)]
pub struct CacheAnalytics {
    state: Mutex<AnalyticsState>,
}

impl CacheAnalytics {
    /// Create a new analytics aggregator with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed response
    ///
    /// # Arguments
    /// * `category` - asset category the request classified into
    /// * `signal` - raw cache-status signal from the platform, if any
    /// * `duration` - time from request receipt to response completion
    pub fn record(&self, category: &str, signal: Option<&str>, duration: Duration) {
        let status = CacheStatus::from_signal(signal);
        let duration_us = duration.as_micros() as u64;

        let mut state = self.lock();
        count(&mut state.overall, status);
        if status == CacheStatus::Hit {
            state.hit_duration_us += duration_us;
        } else {
            state.miss_duration_us += duration_us;
        }
        let entry = state.by_category.entry(category.to_string()).or_default();
        count(entry, status);
    }

    /// Produce a point-in-time report without mutating state
    pub fn report(&self) -> AnalyticsReport {
        let state = self.lock();
        let overall = &state.overall;
        let hit_rate = if overall.total == 0 {
            0.0
        } else {
            overall.hits as f64 / overall.total as f64
        };
        let avg_hit_duration_us = if overall.hits == 0 {
            0.0
        } else {
            state.hit_duration_us as f64 / overall.hits as f64
        };
        let non_hits = overall.total - overall.hits;
        let avg_miss_duration_us = if non_hits == 0 {
            0.0
        } else {
            state.miss_duration_us as f64 / non_hits as f64
        };

        AnalyticsReport {
            total: overall.total,
            hits: overall.hits,
            misses: overall.misses,
            expired: overall.expired,
            bypass: overall.bypass,
            errors: overall.errors,
            hit_rate,
            avg_hit_duration_us,
            avg_miss_duration_us,
            by_category: state.by_category.clone(),
        }
    }

    /// Reset all counters and per-category breakdowns
    pub fn reset(&self) {
        let mut state = self.lock();
        *state = AnalyticsState::default();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AnalyticsState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn count(stats: &mut CategoryCacheStats, status: CacheStatus) {
    stats.total += 1;
    match status {
        CacheStatus::Hit => stats.hits += 1,
        CacheStatus::Miss => stats.misses += 1,
        CacheStatus::Expired => stats.expired += 1,
        CacheStatus::Bypass => stats.bypass += 1,
        CacheStatus::Error => stats.errors += 1,
    }
}
