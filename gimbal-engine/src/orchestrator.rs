//! The search orchestrator facade.
//!
//! One entry point per inbound operation: `search`, `stats`,
//! `reset_circuit_breaker`, `clear_cache`. The orchestrator owns the breaker
//! pair, the health monitor, and the metrics; backends arrive as `Arc`s at
//! construction and are never assumed available.

use crate::breaker::{Admission, CircuitBreaker};
use crate::cache_key::fingerprint;
use crate::health::HealthMonitor;
use crate::stats::{BackendStats, SearchMetrics, StatsSnapshot};
use crate::strategy::{select, QueryClassifier, SearchPlan};
use gimbal_core::{
    BackendError, BackendKind, CacheKey, CachedPayload, GimbalConfig, GimbalResult,
    GovernanceFilter, HealthStatus, HealthVerdict, Performance, ResultItem, RouteReason,
    SearchCache, SearchError, SearchQuery, SearchResult, SearchStore, SearchStrategy,
    SecurityContext, StrategyTrace, Timestamp,
};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Bound a backend call by a deadline; an elapsed deadline reads as a
/// backend timeout and feeds the breaker like any other failure.
async fn with_deadline<T, F>(
    backend: BackendKind,
    timeout: Duration,
    call: F,
) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout { backend, timeout }),
    }
}

/// Orchestrates one search across the store/cache pair.
///
/// Cheap to share: wrap it in an `Arc` and call from as many tasks as
/// needed. No global lock serializes searches; the only cross-call state is
/// the breaker pair and the cached health readings.
pub struct SearchOrchestrator<S, C> {
    store: Arc<S>,
    cache: Arc<C>,
    config: GimbalConfig,
    classifier: QueryClassifier,
    store_breaker: Arc<CircuitBreaker>,
    cache_breaker: Arc<CircuitBreaker>,
    health: Arc<HealthMonitor>,
    metrics: Arc<SearchMetrics>,
    governance: Option<Arc<dyn GovernanceFilter>>,
}

impl<S, C> SearchOrchestrator<S, C>
where
    S: SearchStore,
    C: SearchCache,
{
    /// Build an orchestrator around a backend pair.
    ///
    /// Validates the configuration and compiles the complexity policy; this
    /// is the only point a `ConfigError` can surface.
    pub fn new(store: Arc<S>, cache: Arc<C>, config: GimbalConfig) -> GimbalResult<Self> {
        config.validate()?;
        let classifier = QueryClassifier::from_policy(&config.complexity)?;

        let store_breaker = Arc::new(CircuitBreaker::new(
            BackendKind::Store,
            config.failure_threshold,
            config.recovery_timeout,
        ));
        let cache_breaker = Arc::new(CircuitBreaker::new(
            BackendKind::Cache,
            config.failure_threshold,
            config.recovery_timeout,
        ));
        let health = Arc::new(HealthMonitor::new(
            config.health_ttl,
            config.probe_timeout,
            Arc::clone(&store_breaker),
            Arc::clone(&cache_breaker),
        ));

        Ok(Self {
            store,
            cache,
            config,
            classifier,
            store_breaker,
            cache_breaker,
            health,
            metrics: Arc::new(SearchMetrics::new()),
            governance: None,
        })
    }

    /// Attach a governance filter applied to every result set before it
    /// leaves the orchestrator.
    pub fn with_governance_filter(mut self, filter: Arc<dyn GovernanceFilter>) -> Self {
        self.governance = Some(filter);
        self
    }

    /// The health monitor, for callers that schedule their own probes.
    pub fn health_monitor(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    /// The active configuration.
    pub fn config(&self) -> &GimbalConfig {
        &self.config
    }

    /// Execute one search with an anonymous security context.
    pub async fn search(&self, query: &SearchQuery) -> GimbalResult<SearchResult> {
        self.search_with_context(query, &SecurityContext::default())
            .await
    }

    /// Execute one search on behalf of a caller identity.
    pub async fn search_with_context(
        &self,
        query: &SearchQuery,
        context: &SecurityContext,
    ) -> GimbalResult<SearchResult> {
        let started = Instant::now();
        self.metrics.record_search();

        let timeout = query.options.timeout.unwrap_or(self.config.backend_timeout);
        let store_circuit = self.store_breaker.snapshot();
        let cache_circuit = self.cache_breaker.snapshot();
        let cache_verdict = self.health.verdict(BackendKind::Cache);
        let decided_at = chrono::Utc::now();

        let plan: SearchPlan = select(
            query,
            self.config.default_strategy,
            cache_verdict,
            &cache_circuit,
            &self.classifier,
        );
        let mut reason = plan.reason;
        let mut write_through = plan.write_through;
        let key = fingerprint(query);

        // Failure text from a cache attempt, kept for error aggregation if
        // the store then fails too.
        let mut cache_failure: Option<String> = None;

        if plan.primary == BackendKind::Cache {
            match self.cache_breaker.admit() {
                Admission::Rejected { .. } => {
                    // The selector saw the circuit before it opened (or a
                    // trial is outstanding); treat exactly like rule 2.
                    self.metrics.record_circuit_rejection();
                    reason = RouteReason::CacheCircuitOpen;
                    write_through = false;
                }
                Admission::Allow | Admission::Trial => {
                    match with_deadline(BackendKind::Cache, timeout, self.cache.get(&key)).await {
                        Ok(Some(bytes)) => {
                            self.cache_breaker.record_success();
                            if let Some(payload) = CachedPayload::decode(&bytes) {
                                self.metrics.record_cache_hit();
                                let items = payload
                                    .items
                                    .into_iter()
                                    .map(|item| item.with_source(BackendKind::Cache))
                                    .collect();
                                return Ok(self.finish(
                                    items,
                                    BackendKind::Cache,
                                    true,
                                    plan.strategy,
                                    reason,
                                    store_circuit,
                                    cache_circuit,
                                    decided_at,
                                    started,
                                    context,
                                ));
                            }
                            // Undecodable entry: a miss, not an error.
                            tracing::warn!(key = %key, "cached payload failed to decode, treating as miss");
                            self.metrics.record_cache_miss();
                        }
                        Ok(None) => {
                            self.cache_breaker.record_success();
                            self.metrics.record_cache_miss();
                        }
                        Err(e) => {
                            self.cache_breaker.record_failure();
                            self.metrics.record_fallback();
                            tracing::warn!(error = %e, "cache read failed, falling back to store");
                            cache_failure = Some(e.to_string());
                        }
                    }
                }
            }
        }

        // The store leg: either the plan's primary, or the fallback after a
        // cache miss/failure/rejection.
        let items = match self.execute_store(query, timeout).await {
            Ok(items) => items,
            Err(store_error) => {
                self.metrics.record_failed_search();
                return Err(match cache_failure {
                    Some(primary_reason) => SearchError::AllBackendsFailed {
                        primary: BackendKind::Cache,
                        primary_reason,
                        fallback: BackendKind::Store,
                        fallback_reason: store_error.to_string(),
                    },
                    None => store_error,
                });
            }
        };

        if write_through {
            self.write_through(&key, &items, timeout).await;
        }

        Ok(self.finish(
            items,
            BackendKind::Store,
            false,
            plan.strategy,
            reason,
            store_circuit,
            cache_circuit,
            decided_at,
            started,
            context,
        ))
    }

    /// Run the store leg under its breaker's admission and the deadline.
    async fn execute_store(
        &self,
        query: &SearchQuery,
        timeout: Duration,
    ) -> GimbalResult<Vec<ResultItem>> {
        match self.store_breaker.admit() {
            Admission::Rejected { retry_at } => {
                self.metrics.record_circuit_rejection();
                Err(SearchError::CircuitOpen {
                    backend: BackendKind::Store,
                    retry_at,
                })
            }
            Admission::Allow | Admission::Trial => {
                match with_deadline(BackendKind::Store, timeout, self.store.search(query)).await {
                    Ok(items) => {
                        self.store_breaker.record_success();
                        self.metrics.record_store_query();
                        Ok(items
                            .into_iter()
                            .map(|item| item.with_source(BackendKind::Store))
                            .collect())
                    }
                    Err(e) => {
                        self.store_breaker.record_failure();
                        Err(SearchError::Backend(e))
                    }
                }
            }
        }
    }

    /// Best-effort write-through. Never fails the call; failures are logged,
    /// counted, and fed to the cache breaker.
    async fn write_through(&self, key: &CacheKey, items: &[ResultItem], timeout: Duration) {
        let payload = CachedPayload::new(items.to_vec());
        let bytes = match payload.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                self.metrics.record_write_through_failure();
                tracing::warn!(error = %e, "failed to encode cache payload");
                return;
            }
        };

        match self.cache_breaker.admit() {
            Admission::Rejected { .. } => {
                tracing::debug!(key = %key, "skipping write-through, cache circuit open");
            }
            Admission::Allow | Admission::Trial => {
                match with_deadline(
                    BackendKind::Cache,
                    timeout,
                    self.cache.set(key, bytes, self.config.cache_ttl),
                )
                .await
                {
                    Ok(()) => self.cache_breaker.record_success(),
                    Err(e) => {
                        self.cache_breaker.record_failure();
                        self.metrics.record_write_through_failure();
                        tracing::warn!(key = %key, error = %e, "write-through failed, continuing without cache");
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        items: Vec<ResultItem>,
        served_by: BackendKind,
        cache_hit: bool,
        strategy: SearchStrategy,
        reason: RouteReason,
        store_circuit: gimbal_core::CircuitSnapshot,
        cache_circuit: gimbal_core::CircuitSnapshot,
        decided_at: Timestamp,
        started: Instant,
        context: &SecurityContext,
    ) -> SearchResult {
        let items = match &self.governance {
            Some(filter) => filter.filter(items, context),
            None => items,
        };
        SearchResult {
            items,
            performance: Performance {
                elapsed: started.elapsed(),
                served_by,
                cache_hit,
            },
            trace: StrategyTrace {
                strategy,
                reason,
                store_circuit,
                cache_circuit,
                decided_at,
            },
        }
    }

    /// Operational snapshot: latest health and circuit state for both
    /// backends, aggregate counters, and a recommended strategy. Reads
    /// cached state only; never triggers a probe.
    pub fn stats(&self) -> StatsSnapshot {
        let store_circuit = self.store_breaker.snapshot();
        let cache_circuit = self.cache_breaker.snapshot();
        let cache_verdict = self.health.verdict(BackendKind::Cache);

        let recommended_strategy = if cache_circuit.is_open() || cache_verdict != HealthVerdict::Healthy
        {
            SearchStrategy::DatabaseOnly
        } else {
            self.config.default_strategy
        };

        StatsSnapshot {
            store: BackendStats {
                health: self.health.cached(BackendKind::Store),
                verdict: self.health.verdict(BackendKind::Store),
                average_probe_latency: self.health.average_latency(BackendKind::Store),
                recent_errors: self.health.recent_errors(BackendKind::Store),
                circuit: store_circuit,
            },
            cache: BackendStats {
                health: self.health.cached(BackendKind::Cache),
                verdict: cache_verdict,
                average_probe_latency: self.health.average_latency(BackendKind::Cache),
                recent_errors: self.health.recent_errors(BackendKind::Cache),
                circuit: cache_circuit,
            },
            recommended_strategy,
            metrics: self.metrics.snapshot(),
            captured_at: chrono::Utc::now(),
        }
    }

    /// Force a backend's breaker back to Closed. Idempotent.
    pub fn reset_circuit_breaker(&self, backend: BackendKind) {
        match backend {
            BackendKind::Store => self.store_breaker.reset(),
            BackendKind::Cache => self.cache_breaker.reset(),
        }
    }

    /// Drop every cached entry. Operational; errors propagate (unlike
    /// write-through, the caller asked for this specifically).
    pub async fn clear_cache(&self) -> GimbalResult<()> {
        match with_deadline(
            BackendKind::Cache,
            self.config.backend_timeout,
            self.cache.clear(),
        )
        .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                self.cache_breaker.record_failure();
                Err(SearchError::Backend(e))
            }
        }
    }

    /// Probe both backends immediately and return the fresh readings
    /// (store, cache). Useful at startup and from operational tooling.
    pub async fn probe_now(&self) -> (HealthStatus, HealthStatus) {
        let store = self
            .health
            .probe(BackendKind::Store, self.store.as_ref())
            .await;
        let cache = self
            .health
            .probe(BackendKind::Cache, self.cache.as_ref())
            .await;
        (store, cache)
    }

    /// Spawn the periodic probe loop. The first tick fires immediately, so
    /// health is known shortly after startup.
    pub fn start_probe_task(&self, interval: Duration) -> tokio::task::JoinHandle<()>
    where
        S: 'static,
        C: 'static,
    {
        let health = Arc::clone(&self.health);
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                health.probe(BackendKind::Store, store.as_ref()).await;
                health.probe(BackendKind::Cache, cache.as_ref()).await;
            }
        })
    }
}

impl<S, C> std::fmt::Debug for SearchOrchestrator<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchOrchestrator")
            .field("default_strategy", &self.config.default_strategy)
            .field("failure_threshold", &self.config.failure_threshold)
            .field("governance", &self.governance.is_some())
            .finish()
    }
}
