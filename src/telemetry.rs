//! Telemetry aggregation for request-serving operations
//!
//! One [`TelemetryAggregator`] instance is constructed per process (or per
//! test) and passed explicitly to whatever records into it — there are no
//! ambient globals, so tests get isolated instances.
//!
//! Each operation moves through `start` (pending record registered, total
//! incremented) and `end` (duration computed, counters updated, record
//! removed). Ending an operation that was never started, or ending it twice,
//! is a logged warning and a counter no-op.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

/// Identifier of one in-flight operation
pub type OperationId = u64;

#[derive(Debug)]
struct PendingOperation {
    started_at: Instant,
    strategy: String,
    content_type: String,
    category: String,
}

/// Counters for one breakdown key (a strategy, content type, or category)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BreakdownStats {
    pub operations: u64,
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub total_duration_us: u64,
}

impl BreakdownStats {
    fn record(&mut self, duration: Duration, cache_hit: bool, errored: bool) {
        self.operations += 1;
        if cache_hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        if errored {
            self.errors += 1;
        }
        self.total_duration_us += duration.as_micros() as u64;
    }
}

#[derive(Debug, Default)]
struct TelemetryState {
    total_operations: u64,
    completed_operations: u64,
    hits: u64,
    misses: u64,
    errors: u64,
    total_duration_us: u64,
    min_duration_us: Option<u64>,
    max_duration_us: Option<u64>,
    pending: HashMap<OperationId, PendingOperation>,
    by_strategy: HashMap<String, BreakdownStats>,
    by_content_type: HashMap<String, BreakdownStats>,
    by_category: HashMap<String, BreakdownStats>,
    status_codes: HashMap<u16, u64>,
}

/// Point-in-time report of aggregate metrics
///
/// Every rate is `count / total_operations`, defined as 0 when the total is
/// 0. Breakdowns are present only when the caller asked for them.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub total_operations: u64,
    pub completed_operations: u64,
    pub pending_operations: u64,
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub error_rate: f64,
    pub avg_duration_us: f64,
    pub min_duration_us: Option<u64>,
    pub max_duration_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_strategy: Option<HashMap<String, BreakdownStats>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_content_type: Option<HashMap<String, BreakdownStats>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_category: Option<HashMap<String, BreakdownStats>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_codes: Option<HashMap<u16, u64>>,
}

/// Outcome of a measured unit of work, consumed by [`TelemetryAggregator::measure`]
#[derive(Debug)]
pub struct Measured<T> {
    pub value: T,
    pub status: u16,
    pub cache_hit: bool,
    pub errored: bool,
}

/// Aggregates per-operation telemetry into process-wide counters
///
/// Counter updates are serialized through a single mutex; operation ids come
/// from a lock-free allocator. Under concurrent `end` calls no update is
/// lost, and `total_operations` always equals starts observed so far.
#[derive(Debug, Default)]
pub struct TelemetryAggregator {
    next_id: AtomicU64,
    state: Mutex<TelemetryState>,
}

impl TelemetryAggregator {
    /// Create a new aggregator with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh operation id
    pub fn next_operation_id(&self) -> OperationId {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Allocate an id and start an operation in one call
    pub fn begin(&self, strategy: &str, content_type: &str, category: &str) -> OperationId {
        let id = self.next_operation_id();
        self.start(id, strategy, content_type, category);
        id
    }

    /// Register the start of an operation
    ///
    /// Increments the operation total unconditionally and records the start
    /// time under `id`. An abandoned operation (started but never ended)
    /// keeps its pending record until [`reset`](Self::reset).
    pub fn start(&self, id: OperationId, strategy: &str, content_type: &str, category: &str) {
        let mut state = self.lock();
        state.total_operations += 1;
        state.pending.insert(
            id,
            PendingOperation {
                started_at: Instant::now(),
                strategy: strategy.to_string(),
                content_type: content_type.to_string(),
                category: category.to_string(),
            },
        );
    }

    /// Register the end of an operation
    ///
    /// Looks up the pending record for `id`; when it is absent (double-end
    /// or mismatched id) a warning is logged and no counter changes. Exactly
    /// one of hit/miss is counted per ended operation, chosen by `cache_hit`.
    pub fn end(&self, id: OperationId, status: u16, cache_hit: bool, errored: bool) {
        let mut state = self.lock();
        let Some(op) = state.pending.remove(&id) else {
            warn!(operation_id = id, "end for unknown or already-ended operation; ignoring");
            return;
        };
        let duration = op.started_at.elapsed();
        let duration_us = duration.as_micros() as u64;

        state.completed_operations += 1;
        if cache_hit {
            state.hits += 1;
        } else {
            state.misses += 1;
        }
        if errored {
            state.errors += 1;
        }
        state.total_duration_us += duration_us;
        state.min_duration_us = Some(match state.min_duration_us {
            Some(min) => min.min(duration_us),
            None => duration_us,
        });
        state.max_duration_us = Some(match state.max_duration_us {
            Some(max) => max.max(duration_us),
            None => duration_us,
        });

        state
            .by_strategy
            .entry(op.strategy)
            .or_default()
            .record(duration, cache_hit, errored);
        state
            .by_content_type
            .entry(op.content_type)
            .or_default()
            .record(duration, cache_hit, errored);
        state
            .by_category
            .entry(op.category)
            .or_default()
            .record(duration, cache_hit, errored);
        *state.status_codes.entry(status).or_insert(0) += 1;
    }

    /// Wrap a synchronous unit of work with start/end recording
    ///
    /// Explicit replacement for decorator-style measurement: call sites name
    /// the operation and the closure reports its outcome.
    pub fn measure<T, F>(
        &self,
        strategy: &str,
        content_type: &str,
        category: &str,
        work: F,
    ) -> T
    where
        F: FnOnce() -> Measured<T>,
    {
        let id = self.begin(strategy, content_type, category);
        let outcome = work();
        self.end(id, outcome.status, outcome.cache_hit, outcome.errored);
        outcome.value
    }

    /// Produce a point-in-time report without mutating state
    ///
    /// # Arguments
    /// * `include_breakdowns` - whether to attach the per-strategy,
    ///   per-content-type, and per-category breakdowns and the status-code
    ///   histogram, or return the summary view only
    pub fn report(&self, include_breakdowns: bool) -> MetricsReport {
        let state = self.lock();
        let total = state.total_operations;
        let rate = |count: u64| {
            if total == 0 {
                0.0
            } else {
                count as f64 / total as f64
            }
        };
        let avg_duration_us = if state.completed_operations == 0 {
            0.0
        } else {
            state.total_duration_us as f64 / state.completed_operations as f64
        };

        MetricsReport {
            total_operations: total,
            completed_operations: state.completed_operations,
            pending_operations: state.pending.len() as u64,
            hits: state.hits,
            misses: state.misses,
            errors: state.errors,
            hit_rate: rate(state.hits),
            miss_rate: rate(state.misses),
            error_rate: rate(state.errors),
            avg_duration_us,
            min_duration_us: state.min_duration_us,
            max_duration_us: state.max_duration_us,
            by_strategy: include_breakdowns.then(|| state.by_strategy.clone()),
            by_content_type: include_breakdowns.then(|| state.by_content_type.clone()),
            by_category: include_breakdowns.then(|| state.by_category.clone()),
            status_codes: include_breakdowns.then(|| state.status_codes.clone()),
        }
    }

    /// Reset all counters, breakdowns, and still-pending operation records
    ///
    /// Atomic from the caller's point of view: a concurrent `report` sees
    /// either the old state or the zeroed one, never a mixture.
    pub fn reset(&self) {
        let mut state = self.lock();
        *state = TelemetryState::default();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TelemetryState> {
        // A poisoned mutex means a panic while holding the lock; counters
        // are plain integers, so the state is still usable.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_end_hit() {
        let telemetry = TelemetryAggregator::new();
        let id = telemetry.begin("edge-fetch", "mp4", "video");
        telemetry.end(id, 200, true, false);

        let report = telemetry.report(true);
        assert_eq!(report.total_operations, 1);
        assert_eq!(report.hits, 1);
        assert_eq!(report.misses, 0);
        assert_eq!(report.hit_rate, 1.0);
        assert_eq!(report.pending_operations, 0);
        assert_eq!(report.by_category.unwrap()["video"].hits, 1);
        assert_eq!(report.status_codes.unwrap()[&200], 1);
    }

    #[test]
    fn test_double_end_is_noop() {
        let telemetry = TelemetryAggregator::new();
        let id = telemetry.begin("edge-fetch", "mp4", "video");
        telemetry.end(id, 200, true, false);
        let before = telemetry.report(true);
        telemetry.end(id, 200, true, false);
        let after = telemetry.report(true);
        assert_eq!(before.total_operations, after.total_operations);
        assert_eq!(before.hits, after.hits);
        assert_eq!(before.status_codes.unwrap()[&200], 1);
    }

    #[test]
    fn test_end_unknown_id_is_noop() {
        let telemetry = TelemetryAggregator::new();
        telemetry.end(42, 200, true, false);
        let report = telemetry.report(false);
        assert_eq!(report.total_operations, 0);
        assert_eq!(report.hits, 0);
    }

    #[test]
    fn test_rates_zero_when_empty() {
        let report = TelemetryAggregator::new().report(false);
        assert_eq!(report.hit_rate, 0.0);
        assert_eq!(report.miss_rate, 0.0);
        assert_eq!(report.error_rate, 0.0);
        assert_eq!(report.avg_duration_us, 0.0);
        assert_eq!(report.min_duration_us, None);
    }

    #[test]
    fn test_exactly_one_of_hit_miss_per_end() {
        let telemetry = TelemetryAggregator::new();
        for hit in [true, false, false] {
            let id = telemetry.begin("edge-fetch", "png", "image");
            telemetry.end(id, 200, hit, false);
        }
        let report = telemetry.report(false);
        assert_eq!(report.hits + report.misses, report.completed_operations);
        assert_eq!(report.hits, 1);
        assert_eq!(report.misses, 2);
    }

    #[test]
    fn test_error_counting() {
        let telemetry = TelemetryAggregator::new();
        let id = telemetry.begin("edge-fetch", "unknown", "uncached");
        telemetry.end(id, 500, false, true);
        let report = telemetry.report(true);
        assert_eq!(report.errors, 1);
        assert_eq!(report.error_rate, 1.0);
        assert_eq!(report.by_category.unwrap()["uncached"].errors, 1);
    }

    #[test]
    fn test_summary_report_has_no_breakdowns() {
        let telemetry = TelemetryAggregator::new();
        let id = telemetry.begin("edge-fetch", "mp4", "video");
        telemetry.end(id, 200, true, false);
        let report = telemetry.report(false);
        assert!(report.by_strategy.is_none());
        assert!(report.by_content_type.is_none());
        assert!(report.by_category.is_none());
        assert!(report.status_codes.is_none());
    }

    #[test]
    fn test_measure_records_outcome() {
        let telemetry = TelemetryAggregator::new();
        let value = telemetry.measure("inline", "html", "page", || Measured {
            value: 7,
            status: 200,
            cache_hit: false,
            errored: false,
        });
        assert_eq!(value, 7);
        let report = telemetry.report(false);
        assert_eq!(report.total_operations, 1);
        assert_eq!(report.misses, 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let telemetry = TelemetryAggregator::new();
        let id = telemetry.begin("edge-fetch", "mp4", "video");
        telemetry.end(id, 200, true, false);
        // Leave one pending record behind as well
        telemetry.begin("edge-fetch", "png", "image");

        telemetry.reset();

        let report = telemetry.report(true);
        assert_eq!(report.total_operations, 0);
        assert_eq!(report.pending_operations, 0);
        assert_eq!(report.hits, 0);
        assert!(report.by_category.unwrap().is_empty());
        assert!(report.status_codes.unwrap().is_empty());
    }

    #[test]
    fn test_min_max_duration_tracking() {
        let telemetry = TelemetryAggregator::new();
        let id = telemetry.begin("edge-fetch", "mp4", "video");
        telemetry.end(id, 200, true, false);
        let report = telemetry.report(false);
        let min = report.min_duration_us.unwrap();
        let max = report.max_duration_us.unwrap();
        assert!(min <= max);
    }
}
