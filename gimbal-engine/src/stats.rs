//! Aggregate counters and the operational stats snapshot.
//!
//! Counters are plain atomics so recording never contends with searches.

use gimbal_core::{
    CircuitSnapshot, HealthStatus, HealthVerdict, SearchStrategy, Timestamp,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lock-free counters recorded by the orchestrator.
#[derive(Debug, Default)]
pub struct SearchMetrics {
    searches: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    store_queries: AtomicU64,
    fallbacks: AtomicU64,
    circuit_rejections: AtomicU64,
    write_through_failures: AtomicU64,
    failed_searches: AtomicU64,
}

impl SearchMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_search(&self) {
        self.searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_query(&self) {
        self.store_queries.fetch_add(1, Ordering::Relaxed);
    }

    /// A primary backend failed and the plan's fallback was taken.
    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// A call was rejected by a breaker without a network attempt.
    pub fn record_circuit_rejection(&self) {
        self.circuit_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// A best-effort write-through failed and was swallowed.
    pub fn record_write_through_failure(&self) {
        self.write_through_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A search returned an error to the caller.
    pub fn record_failed_search(&self) {
        self.failed_searches.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        MetricsSnapshot {
            searches: self.searches.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            store_queries: self.store_queries.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            circuit_rejections: self.circuit_rejections.load(Ordering::Relaxed),
            write_through_failures: self.write_through_failures.load(Ordering::Relaxed),
            failed_searches: self.failed_searches.load(Ordering::Relaxed),
        }
    }
}

/// Serializable copy of the counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub searches: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub store_queries: u64,
    pub fallbacks: u64,
    pub circuit_rejections: u64,
    pub write_through_failures: u64,
    pub failed_searches: u64,
}

impl MetricsSnapshot {
    /// Cache hit rate in [0.0, 1.0]; 0.0 when no cache reads happened.
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// Operational view of one backend: last health reading plus circuit state.
#[derive(Debug, Clone, Serialize)]
pub struct BackendStats {
    /// Last cached health status, if any probe has completed.
    pub health: Option<HealthStatus>,
    /// Verdict derived from the status and its age.
    pub verdict: HealthVerdict,
    /// Mean of recent probe latencies.
    pub average_probe_latency: Option<Duration>,
    /// Recent probe errors, newest last.
    pub recent_errors: Vec<String>,
    /// Current circuit breaker snapshot.
    pub circuit: CircuitSnapshot,
}

/// Everything an operational dashboard needs, assembled from cached state
/// only — producing one never triggers a probe.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub store: BackendStats,
    pub cache: BackendStats,
    /// Strategy the engine would pick for a no-preference caller right now.
    pub recommended_strategy: SearchStrategy,
    pub metrics: MetricsSnapshot,
    pub captured_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let metrics = SearchMetrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.searches, 0);
        assert_eq!(snapshot.cache_hits, 0);
        assert_eq!(snapshot.hit_rate(), 0.0);
    }

    #[test]
    fn test_recording_increments() {
        let metrics = SearchMetrics::new();
        metrics.record_search();
        metrics.record_search();
        metrics.record_cache_hit();
        metrics.record_cache_miss();
        metrics.record_store_query();
        metrics.record_fallback();
        metrics.record_circuit_rejection();
        metrics.record_write_through_failure();
        metrics.record_failed_search();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.searches, 2);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.store_queries, 1);
        assert_eq!(snapshot.fallbacks, 1);
        assert_eq!(snapshot.circuit_rejections, 1);
        assert_eq!(snapshot.write_through_failures, 1);
        assert_eq!(snapshot.failed_searches, 1);
    }

    #[test]
    fn test_hit_rate() {
        let metrics = SearchMetrics::new();
        for _ in 0..8 {
            metrics.record_cache_hit();
        }
        for _ in 0..2 {
            metrics.record_cache_miss();
        }
        assert!((metrics.snapshot().hit_rate() - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = SearchMetrics::new();
        metrics.record_search();
        let json = serde_json::to_string(&metrics.snapshot()).expect("serialize");
        assert!(json.contains("\"searches\":1"));
    }
}
