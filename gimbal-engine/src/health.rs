//! Health monitoring for the backend pair.
//!
//! The monitor keeps the most recent HealthStatus per backend in an
//! atomically-replaced cell. Probes are the only I/O; cached reads never
//! block a search. A probe that fails (or times out, or reports the backend
//! disconnected) feeds that backend's circuit breaker one failure signal —
//! probe failures count toward the threshold the same as live-call failures.
//! Probe successes deliberately do NOT feed the breaker: closing a HalfOpen
//! circuit belongs to the admitted trial call, not to the monitor.

use crate::breaker::CircuitBreaker;
use gimbal_core::{BackendKind, HealthStatus, HealthVerdict, SearchStore};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// How many probe latency / error samples are retained per backend.
const SAMPLE_WINDOW: usize = 32;

struct BackendCell {
    breaker: Arc<CircuitBreaker>,
    status: RwLock<Option<HealthStatus>>,
    latencies: Mutex<VecDeque<Duration>>,
    recent_errors: Mutex<VecDeque<String>>,
}

impl BackendCell {
    fn new(breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            breaker,
            status: RwLock::new(None),
            latencies: Mutex::new(VecDeque::with_capacity(SAMPLE_WINDOW)),
            recent_errors: Mutex::new(VecDeque::with_capacity(SAMPLE_WINDOW)),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Maintains the latest health reading per backend.
pub struct HealthMonitor {
    health_ttl: Duration,
    probe_timeout: Duration,
    store: BackendCell,
    cache: BackendCell,
}

impl HealthMonitor {
    /// Create a monitor wired to the two backends' breakers.
    pub fn new(
        health_ttl: Duration,
        probe_timeout: Duration,
        store_breaker: Arc<CircuitBreaker>,
        cache_breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            health_ttl,
            probe_timeout,
            store: BackendCell::new(store_breaker),
            cache: BackendCell::new(cache_breaker),
        }
    }

    fn cell(&self, backend: BackendKind) -> &BackendCell {
        match backend {
            BackendKind::Store => &self.store,
            BackendKind::Cache => &self.cache,
        }
    }

    /// The TTL applied to cached statuses.
    pub fn health_ttl(&self) -> Duration {
        self.health_ttl
    }

    /// The last cached status for a backend, if any. Never performs I/O.
    pub fn cached(&self, backend: BackendKind) -> Option<HealthStatus> {
        self.cell(backend)
            .status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The routing verdict for a backend, derived from the cached status
    /// and its age. A status older than the TTL reads as Unknown.
    pub fn verdict(&self, backend: BackendKind) -> HealthVerdict {
        HealthVerdict::from_cached(self.cached(backend).as_ref(), self.health_ttl)
    }

    /// Mean of the retained probe latency samples for a backend.
    pub fn average_latency(&self, backend: BackendKind) -> Option<Duration> {
        let samples = lock(&self.cell(backend).latencies);
        if samples.is_empty() {
            return None;
        }
        let total: Duration = samples.iter().sum();
        Some(total / samples.len() as u32)
    }

    /// Recent probe error messages for a backend, newest last.
    pub fn recent_errors(&self, backend: BackendKind) -> Vec<String> {
        lock(&self.cell(backend).recent_errors)
            .iter()
            .cloned()
            .collect()
    }

    /// Probe one backend now, replace its cached status, and return the new
    /// reading. Latency is the wall-clock duration of the probe call itself,
    /// bounded by the probe timeout.
    pub async fn probe<B>(&self, backend: BackendKind, target: &B) -> HealthStatus
    where
        B: SearchStore + ?Sized,
    {
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.probe_timeout, target.check_health()).await;
        let elapsed = started.elapsed();

        let status = match outcome {
            Ok(Ok(mut status)) => {
                status.latency = elapsed;
                status.checked_at = chrono::Utc::now();
                status
            }
            Ok(Err(e)) => {
                tracing::warn!(backend = %backend, error = %e, "health probe failed");
                HealthStatus::unhealthy(elapsed, e.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    backend = %backend,
                    timeout_ms = self.probe_timeout.as_millis() as u64,
                    "health probe timed out"
                );
                HealthStatus::unhealthy(
                    elapsed,
                    format!("probe timed out after {:?}", self.probe_timeout),
                )
            }
        };

        let cell = self.cell(backend);
        if !status.connected {
            cell.breaker.record_failure();
            let mut errors = lock(&cell.recent_errors);
            for error in &status.errors {
                if errors.len() == SAMPLE_WINDOW {
                    errors.pop_front();
                }
                errors.push_back(error.clone());
            }
        }

        {
            let mut latencies = lock(&cell.latencies);
            if latencies.len() == SAMPLE_WINDOW {
                latencies.pop_front();
            }
            latencies.push_back(status.latency);
        }

        let mut slot = cell.status.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(status.clone());
        drop(slot);

        status
    }

    /// Return the cached status if still within TTL, probing only when it
    /// is missing or expired.
    pub async fn current_or_probe<B>(&self, backend: BackendKind, target: &B) -> HealthStatus
    where
        B: SearchStore + ?Sized,
    {
        if let Some(status) = self.cached(backend) {
            if !status.is_stale(self.health_ttl) {
                return status;
            }
        }
        self.probe(backend, target).await
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("health_ttl", &self.health_ttl)
            .field("probe_timeout", &self.probe_timeout)
            .field("store_verdict", &self.verdict(BackendKind::Store))
            .field("cache_verdict", &self.verdict(BackendKind::Cache))
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gimbal_core::{BackendError, CircuitState, ResultItem, SearchQuery};

    struct ScriptedBackend {
        healthy: bool,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl SearchStore for ScriptedBackend {
        async fn search(&self, _query: &SearchQuery) -> Result<Vec<ResultItem>, BackendError> {
            Ok(Vec::new())
        }

        async fn check_health(&self) -> Result<HealthStatus, BackendError> {
            tokio::time::sleep(self.delay).await;
            if self.healthy {
                Ok(HealthStatus::healthy(Duration::ZERO))
            } else {
                Err(BackendError::Transport {
                    backend: BackendKind::Cache,
                    reason: "connection refused".to_string(),
                })
            }
        }
    }

    fn monitor(ttl: Duration) -> (HealthMonitor, Arc<CircuitBreaker>, Arc<CircuitBreaker>) {
        let store_breaker = Arc::new(CircuitBreaker::new(
            BackendKind::Store,
            5,
            Duration::from_secs(30),
        ));
        let cache_breaker = Arc::new(CircuitBreaker::new(
            BackendKind::Cache,
            5,
            Duration::from_secs(30),
        ));
        let monitor = HealthMonitor::new(
            ttl,
            Duration::from_millis(200),
            Arc::clone(&store_breaker),
            Arc::clone(&cache_breaker),
        );
        (monitor, store_breaker, cache_breaker)
    }

    #[tokio::test]
    async fn test_cached_is_empty_before_first_probe() {
        let (monitor, _, _) = monitor(Duration::from_secs(10));
        assert!(monitor.cached(BackendKind::Cache).is_none());
        assert_eq!(monitor.verdict(BackendKind::Cache), HealthVerdict::Unknown);
    }

    #[tokio::test]
    async fn test_probe_success_caches_status_and_measures_latency() {
        let (monitor, _, _) = monitor(Duration::from_secs(10));
        let backend = ScriptedBackend {
            healthy: true,
            delay: Duration::from_millis(10),
        };

        let status = monitor.probe(BackendKind::Cache, &backend).await;
        assert!(status.is_healthy());
        assert!(status.latency >= Duration::from_millis(10));

        assert_eq!(monitor.verdict(BackendKind::Cache), HealthVerdict::Healthy);
        assert!(monitor.average_latency(BackendKind::Cache).is_some());
    }

    #[tokio::test]
    async fn test_probe_failure_feeds_breaker_and_records_error() {
        let (monitor, _, cache_breaker) = monitor(Duration::from_secs(10));
        let backend = ScriptedBackend {
            healthy: false,
            delay: Duration::ZERO,
        };

        let status = monitor.probe(BackendKind::Cache, &backend).await;
        assert!(!status.connected);
        assert_eq!(cache_breaker.snapshot().failure_count, 1);
        assert_eq!(monitor.verdict(BackendKind::Cache), HealthVerdict::Degraded);

        let errors = monitor.recent_errors(BackendKind::Cache);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("connection refused"));
    }

    #[tokio::test]
    async fn test_probe_timeout_reads_as_disconnected() {
        let (monitor, _, cache_breaker) = monitor(Duration::from_secs(10));
        let backend = ScriptedBackend {
            healthy: true,
            delay: Duration::from_secs(5),
        };

        let status = monitor.probe(BackendKind::Cache, &backend).await;
        assert!(!status.connected);
        assert!(status.errors[0].contains("timed out"));
        assert_eq!(cache_breaker.snapshot().failure_count, 1);
    }

    #[tokio::test]
    async fn test_repeated_probe_failures_open_breaker() {
        let (monitor, _, cache_breaker) = monitor(Duration::from_secs(10));
        let backend = ScriptedBackend {
            healthy: false,
            delay: Duration::ZERO,
        };

        for _ in 0..5 {
            monitor.probe(BackendKind::Cache, &backend).await;
        }
        assert_eq!(cache_breaker.snapshot().state, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_stale_status_reads_unknown() {
        let (monitor, _, _) = monitor(Duration::from_millis(10));
        let backend = ScriptedBackend {
            healthy: true,
            delay: Duration::ZERO,
        };

        monitor.probe(BackendKind::Store, &backend).await;
        assert_eq!(monitor.verdict(BackendKind::Store), HealthVerdict::Healthy);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(monitor.verdict(BackendKind::Store), HealthVerdict::Unknown);
    }

    #[tokio::test]
    async fn test_current_or_probe_skips_io_when_fresh() {
        let (monitor, _, _) = monitor(Duration::from_secs(10));
        let backend = ScriptedBackend {
            healthy: true,
            delay: Duration::ZERO,
        };

        let first = monitor.probe(BackendKind::Store, &backend).await;
        let second = monitor.current_or_probe(BackendKind::Store, &backend).await;
        // Same cached reading, not a fresh probe.
        assert_eq!(first.checked_at, second.checked_at);
    }

    #[tokio::test]
    async fn test_current_or_probe_refreshes_when_expired() {
        let (monitor, _, _) = monitor(Duration::from_millis(5));
        let backend = ScriptedBackend {
            healthy: true,
            delay: Duration::ZERO,
        };

        let first = monitor.probe(BackendKind::Store, &backend).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = monitor.current_or_probe(BackendKind::Store, &backend).await;
        assert!(second.checked_at > first.checked_at);
    }
}
