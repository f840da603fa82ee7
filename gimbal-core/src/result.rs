//! Result envelope types: items, performance, and the strategy trace.

use crate::circuit::CircuitSnapshot;
use crate::query::SearchStrategy;
use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// The two backends this layer routes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The durable data store.
    Store,
    /// The fast cache.
    Cache,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store => write!(f, "store"),
            Self::Cache => write!(f, "cache"),
        }
    }
}

/// One search hit. `fields` carries the display columns selected by the
/// store adapter's table mapping; `score` is backend-specific but higher is
/// always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    /// Stable identifier from the durable store.
    pub id: String,
    /// Display fields, keyed by column name.
    pub fields: BTreeMap<String, serde_json::Value>,
    /// Relevance score.
    pub score: f32,
    /// Which backend produced this item.
    pub source: BackendKind,
}

impl ResultItem {
    /// Create an item with no display fields.
    pub fn new(id: impl Into<String>, score: f32, source: BackendKind) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
            score,
            source,
        }
    }

    /// Attach one display field.
    pub fn with_field(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Re-tag the provenance of this item.
    pub fn with_source(mut self, source: BackendKind) -> Self {
        self.source = source;
        self
    }
}

/// Timing and provenance for one completed search call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Performance {
    /// Wall-clock time from call start to envelope assembly.
    pub elapsed: Duration,
    /// The backend that served the returned items.
    pub served_by: BackendKind,
    /// Whether the cache satisfied the call.
    pub cache_hit: bool,
}

/// Which routing rule fired for one search call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteReason {
    /// Caller explicitly requested database-only.
    ExplicitDatabaseOnly,
    /// The cache circuit is open; the cache was not attempted.
    CacheCircuitOpen,
    /// Cache healthy within TTL; cache-first plan.
    CacheHealthy,
    /// Hybrid classification: complex query routed to the store.
    ComplexQuery,
    /// Hybrid classification: simple query routed cache-first.
    SimpleQuery,
    /// Cache unhealthy or health unknown; the store served directly.
    CacheDegraded,
}

impl RouteReason {
    /// Human-readable explanation, suitable for dashboards and logs.
    pub fn message(&self) -> &'static str {
        match self {
            Self::ExplicitDatabaseOnly => "database-only requested by caller",
            Self::CacheCircuitOpen => "cache circuit open, used store",
            Self::CacheHealthy => "cache healthy, cache-first",
            Self::ComplexQuery => "complex query, routed to store",
            Self::SimpleQuery => "simple query, cache-first",
            Self::CacheDegraded => "cache degraded or unknown, used store",
        }
    }
}

impl std::fmt::Display for RouteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Why a search was routed the way it was, and the circuit state observed
/// when the decision was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyTrace {
    /// The strategy that actually ran (after defaults and overrides).
    pub strategy: SearchStrategy,
    /// The rule that fired.
    pub reason: RouteReason,
    /// Circuit snapshot for the store at decision time.
    pub store_circuit: CircuitSnapshot,
    /// Circuit snapshot for the cache at decision time.
    pub cache_circuit: CircuitSnapshot,
    /// When the decision was made.
    pub decided_at: Timestamp,
}

/// The envelope returned by every successful search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Ordered result items.
    pub items: Vec<ResultItem>,
    /// Timing and provenance.
    pub performance: Performance,
    /// Routing explanation.
    pub trace: StrategyTrace,
}

/// Versioned at-rest form of cached result items.
///
/// The orchestrator owns this encoding; cache adapters treat the bytes as
/// opaque. Decoding failures degrade to a cache miss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPayload {
    /// Payload schema version.
    pub version: u32,
    /// The cached items, provenance-tagged as they were when stored.
    pub items: Vec<ResultItem>,
    /// When the payload was written.
    pub cached_at: Timestamp,
}

impl CachedPayload {
    /// Current payload schema version.
    pub const VERSION: u32 = 1;

    /// Wrap items for caching, stamped now.
    pub fn new(items: Vec<ResultItem>) -> Self {
        Self {
            version: Self::VERSION,
            items,
            cached_at: chrono::Utc::now(),
        }
    }

    /// Encode to the at-rest byte form.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode from the at-rest byte form.
    ///
    /// Returns `None` on malformed bytes or a version this build does not
    /// understand.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let payload: Self = serde_json::from_slice(bytes).ok()?;
        if payload.version != Self::VERSION {
            return None;
        }
        Some(payload)
    }
}
