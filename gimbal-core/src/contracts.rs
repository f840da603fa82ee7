//! Backend capability contracts.
//!
//! Two traits every backend pair must satisfy. Concrete adapters (Postgres,
//! OpenSearch, Redis, ...) are supplied by the embedding application; this
//! crate only defines the boundary. Implementations must be thread-safe and
//! support concurrent access.

use crate::error::BackendError;
use crate::health::HealthStatus;
use crate::query::SearchQuery;
use crate::result::ResultItem;
use async_trait::async_trait;
use std::time::Duration;

/// Opaque cache key produced by the engine's fingerprint policy.
///
/// Adapters treat the rendered form as the full key; they must not parse it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap an already-rendered key.
    ///
    /// Engine code builds keys through the fingerprint policy; this exists
    /// for adapters and tests that need to name a key directly.
    pub fn from_rendered(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The rendered key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Contract for the durable data store.
///
/// # Implementation Requirements
///
/// - `search` must honor the query's pagination and filters, translating the
///   configured table/column mapping into the store's native query form.
/// - `check_health` must be cheap: a connectivity probe, not a real search.
/// - Implementations must be `Send + Sync`; the orchestrator calls them from
///   concurrent tasks.
#[async_trait]
pub trait SearchStore: Send + Sync {
    /// Execute a search against this backend.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<ResultItem>, BackendError>;

    /// Probe connectivity and search capability.
    async fn check_health(&self) -> Result<HealthStatus, BackendError>;
}

/// Contract for the fast cache: everything the store contract has, plus
/// keyed byte storage with TTL.
///
/// Value bytes are opaque to the adapter; eviction policy is the adapter's
/// responsibility, not the orchestrator's. Every operation may fail with
/// [`BackendError`] and callers never assume availability.
#[async_trait]
pub trait SearchCache: SearchStore {
    /// Get a cached value, or `None` if absent or expired.
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, BackendError>;

    /// Store a value under `key` for at most `ttl`.
    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Duration)
        -> Result<(), BackendError>;

    /// Remove one entry.
    async fn delete(&self, key: &CacheKey) -> Result<(), BackendError>;

    /// Remove every entry.
    async fn clear(&self) -> Result<(), BackendError>;
}
