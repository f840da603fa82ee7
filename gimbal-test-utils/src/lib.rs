//! Test utilities for Gimbal: in-memory mock backends with failure
//! injection and call counting, plus small fixtures.
//!
//! The mocks satisfy the real capability contracts, so any test exercising
//! the orchestrator runs the genuine routing logic against a backend whose
//! behavior is scripted per operation.

use async_trait::async_trait;
use gimbal_core::{
    BackendError, BackendKind, CacheKey, HealthStatus, ResultItem, SearchCache, SearchQuery,
    SearchStore,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Scripted behavior for one mock operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Operate normally.
    #[default]
    None,
    /// Fail with a transport error.
    Transport,
    /// Fail with a query error.
    Query,
    /// Sleep long enough that any reasonable deadline elapses first.
    Hang,
}

impl FailureMode {
    async fn apply(self, backend: BackendKind) -> Result<(), BackendError> {
        match self {
            Self::None => Ok(()),
            Self::Transport => Err(BackendError::Transport {
                backend,
                reason: "injected transport failure".to_string(),
            }),
            Self::Query => Err(BackendError::Query {
                backend,
                reason: "injected query failure".to_string(),
            }),
            Self::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// MOCK STORE
// ============================================================================

/// In-memory durable store: returns the configured items for every search.
#[derive(Debug, Default)]
pub struct MockSearchStore {
    items: Mutex<Vec<ResultItem>>,
    search_failure: Mutex<FailureMode>,
    health_failure: Mutex<FailureMode>,
    search_calls: AtomicU64,
    health_calls: AtomicU64,
}

impl MockSearchStore {
    /// An empty, healthy store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A healthy store that answers every search with `items`.
    pub fn with_items(items: Vec<ResultItem>) -> Self {
        let store = Self::new();
        *lock(&store.items) = items;
        store
    }

    /// Replace the canned result set.
    pub fn set_items(&self, items: Vec<ResultItem>) {
        *lock(&self.items) = items;
    }

    /// Script the next search calls.
    pub fn fail_searches(&self, mode: FailureMode) {
        *lock(&self.search_failure) = mode;
    }

    /// Script the next health probes.
    pub fn fail_health(&self, mode: FailureMode) {
        *lock(&self.health_failure) = mode;
    }

    /// How many searches have reached this backend.
    pub fn search_calls(&self) -> u64 {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// How many health probes have reached this backend.
    pub fn health_calls(&self) -> u64 {
        self.health_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchStore for MockSearchStore {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<ResultItem>, BackendError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let mode = *lock(&self.search_failure);
        mode.apply(BackendKind::Store).await?;
        let items = lock(&self.items).clone();
        Ok(items
            .into_iter()
            .take(query.options.limit)
            .collect())
    }

    async fn check_health(&self) -> Result<HealthStatus, BackendError> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        let mode = *lock(&self.health_failure);
        mode.apply(BackendKind::Store).await?;
        Ok(HealthStatus::healthy(Duration::from_millis(1)))
    }
}

// ============================================================================
// MOCK CACHE
// ============================================================================

struct CacheSlot {
    value: Vec<u8>,
    stored_at: Instant,
    ttl: Duration,
}

/// In-memory cache honoring per-entry TTLs, with per-operation failure
/// injection and call counting.
#[derive(Default)]
pub struct MockSearchCache {
    entries: Mutex<HashMap<String, CacheSlot>>,
    get_failure: Mutex<FailureMode>,
    set_failure: Mutex<FailureMode>,
    health_failure: Mutex<FailureMode>,
    get_calls: AtomicU64,
    set_calls: AtomicU64,
    delete_calls: AtomicU64,
    clear_calls: AtomicU64,
    health_calls: AtomicU64,
}

impl MockSearchCache {
    /// An empty, healthy cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next get calls.
    pub fn fail_gets(&self, mode: FailureMode) {
        *lock(&self.get_failure) = mode;
    }

    /// Script the next set calls.
    pub fn fail_sets(&self, mode: FailureMode) {
        *lock(&self.set_failure) = mode;
    }

    /// Script the next health probes.
    pub fn fail_health(&self, mode: FailureMode) {
        *lock(&self.health_failure) = mode;
    }

    /// How many get calls have reached this backend.
    pub fn get_calls(&self) -> u64 {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// How many set calls have reached this backend.
    pub fn set_calls(&self) -> u64 {
        self.set_calls.load(Ordering::SeqCst)
    }

    /// How many delete calls have reached this backend.
    pub fn delete_calls(&self) -> u64 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// How many clear calls have reached this backend.
    pub fn clear_calls(&self) -> u64 {
        self.clear_calls.load(Ordering::SeqCst)
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let entries = lock(&self.entries);
        entries
            .values()
            .filter(|slot| slot.stored_at.elapsed() <= slot.ttl)
            .count()
    }

    /// Whether no live entries exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Plant a raw entry directly, bypassing the contract. Useful for
    /// corrupt-payload tests.
    pub fn plant(&self, key: &CacheKey, value: Vec<u8>, ttl: Duration) {
        lock(&self.entries).insert(
            key.as_str().to_string(),
            CacheSlot {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }
}

#[async_trait]
impl SearchStore for MockSearchCache {
    async fn search(&self, _query: &SearchQuery) -> Result<Vec<ResultItem>, BackendError> {
        // The cache never serves free-text search in these tests.
        Ok(Vec::new())
    }

    async fn check_health(&self) -> Result<HealthStatus, BackendError> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        let mode = *lock(&self.health_failure);
        mode.apply(BackendKind::Cache).await?;
        Ok(HealthStatus::healthy(Duration::from_millis(1)))
    }
}

#[async_trait]
impl SearchCache for MockSearchCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, BackendError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let mode = *lock(&self.get_failure);
        mode.apply(BackendKind::Cache).await?;
        let entries = lock(&self.entries);
        Ok(entries.get(key.as_str()).and_then(|slot| {
            if slot.stored_at.elapsed() <= slot.ttl {
                Some(slot.value.clone())
            } else {
                None
            }
        }))
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), BackendError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        let mode = *lock(&self.set_failure);
        mode.apply(BackendKind::Cache).await?;
        lock(&self.entries).insert(
            key.as_str().to_string(),
            CacheSlot {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), BackendError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.entries).remove(key.as_str());
        Ok(())
    }

    async fn clear(&self) -> Result<(), BackendError> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.entries).clear();
        Ok(())
    }
}

impl std::fmt::Debug for MockSearchCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSearchCache")
            .field("entries", &self.len())
            .field("get_calls", &self.get_calls())
            .field("set_calls", &self.set_calls())
            .finish()
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// A store-tagged result item with a name field.
pub fn make_item(id: &str, score: f32) -> ResultItem {
    ResultItem::new(id, score, BackendKind::Store)
        .with_field("name", serde_json::json!(format!("Item {}", id)))
}

/// Three descending-score items, the shape most scenarios start from.
pub fn make_items() -> Vec<ResultItem> {
    vec![
        make_item("prov-1", 0.95),
        make_item("prov-2", 0.80),
        make_item("prov-3", 0.42),
    ]
}
