//! Gimbal Engine - Search Orchestration
//!
//! The behavior half of Gimbal: circuit breaker, health monitor, strategy
//! selector, cache key policy, metrics, and the orchestrator facade that
//! ties them together. Backend adapters and configuration loading live with
//! the embedding application; this crate owns no network listener and
//! installs no tracing subscriber.

pub mod breaker;
pub mod cache_key;
pub mod health;
pub mod orchestrator;
pub mod stats;
pub mod strategy;

pub use breaker::{Admission, CircuitBreaker};
pub use cache_key::{fingerprint, KEY_PREFIX};
pub use health::HealthMonitor;
pub use orchestrator::SearchOrchestrator;
pub use stats::{BackendStats, MetricsSnapshot, SearchMetrics, StatsSnapshot};
pub use strategy::{select, QueryClassifier, SearchPlan};

// Re-export the core surface so most applications depend on one crate.
pub use gimbal_core::{
    AllowAll, BackendError, BackendKind, CacheKey, CachedPayload, CircuitSnapshot, CircuitState,
    ComplexityPolicy, ConfigError, FilterMap, GimbalConfig, GimbalResult, GovernanceFilter,
    HealthStatus, HealthVerdict, Performance, ResultItem, RouteReason, SearchCache, SearchError,
    SearchOptions, SearchQuery, SearchResult, SearchStore, SearchStrategy, SecurityContext,
    StrategyTrace, TableMapping,
};
