//! Query types: free text plus an immutable options bag.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Routing strategy a caller may request for one search.
///
/// The default (no explicit request) is resolved from configuration; the
/// selector may still override the outcome when circuit or health state
/// demands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchStrategy {
    /// Try the cache first, fall back to the store on miss.
    CacheFirst,
    /// Use the store exclusively; no cache read or write.
    DatabaseOnly,
    /// Classify the query: complex queries route to the store, simple
    /// queries route cache-first.
    Hybrid,
}

/// Field filters: filter name to the set of allowed values.
///
/// Ordered collections so that two option bags with the same filters in a
/// different insertion order fingerprint identically.
pub type FilterMap = BTreeMap<String, BTreeSet<String>>;

/// Options accompanying one search call. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Maximum number of items to return.
    pub limit: usize,
    /// Number of items to skip.
    pub offset: usize,
    /// Field filters applied by the store adapter.
    pub filters: FilterMap,
    /// Explicit strategy override; `None` defers to the configured default.
    pub strategy: Option<SearchStrategy>,
    /// Per-call backend timeout override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
            filters: FilterMap::new(),
            strategy: None,
            timeout: None,
        }
    }
}

impl SearchOptions {
    /// Create options with default pagination and no filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page size.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the page offset.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Add one allowed value for a filter field.
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters
            .entry(field.into())
            .or_default()
            .insert(value.into());
        self
    }

    /// Request an explicit routing strategy.
    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Override the backend call timeout for this search only.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// One search call: free text plus options. Immutable per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// The free-text query.
    pub text: String,
    /// The options bag.
    pub options: SearchOptions,
}

impl SearchQuery {
    /// Create a query with default options.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: SearchOptions::default(),
        }
    }

    /// Create a query with explicit options.
    pub fn with_options(text: impl Into<String>, options: SearchOptions) -> Self {
        Self {
            text: text.into(),
            options,
        }
    }

    /// The strategy the caller explicitly requested, if any.
    pub fn requested_strategy(&self) -> Option<SearchStrategy> {
        self.options.strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_builder() {
        let options = SearchOptions::new()
            .with_limit(50)
            .with_offset(100)
            .with_filter("specialty", "cardiology")
            .with_filter("specialty", "oncology")
            .with_filter("state", "CA")
            .with_strategy(SearchStrategy::Hybrid)
            .with_timeout(Duration::from_millis(750));

        assert_eq!(options.limit, 50);
        assert_eq!(options.offset, 100);
        assert_eq!(options.filters.len(), 2);
        assert_eq!(options.filters["specialty"].len(), 2);
        assert_eq!(options.strategy, Some(SearchStrategy::Hybrid));
        assert_eq!(options.timeout, Some(Duration::from_millis(750)));
    }

    #[test]
    fn test_filter_values_deduplicate() {
        let options = SearchOptions::new()
            .with_filter("state", "CA")
            .with_filter("state", "CA");
        assert_eq!(options.filters["state"].len(), 1);
    }

    #[test]
    fn test_filter_insertion_order_is_irrelevant() {
        let a = SearchOptions::new()
            .with_filter("b", "2")
            .with_filter("a", "1");
        let b = SearchOptions::new()
            .with_filter("a", "1")
            .with_filter("b", "2");
        assert_eq!(a, b);
    }

    #[test]
    fn test_query_defaults() {
        let query = SearchQuery::new("diabetes");
        assert_eq!(query.text, "diabetes");
        assert_eq!(query.options.limit, 20);
        assert_eq!(query.requested_strategy(), None);
    }

    #[test]
    fn test_strategy_serde_kebab_case() {
        let json = serde_json::to_string(&SearchStrategy::DatabaseOnly).expect("serialize");
        assert_eq!(json, "\"database-only\"");
        let back: SearchStrategy = serde_json::from_str("\"cache-first\"").expect("deserialize");
        assert_eq!(back, SearchStrategy::CacheFirst);
    }
}
