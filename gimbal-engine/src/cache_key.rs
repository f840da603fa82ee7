//! Deterministic cache key fingerprinting.
//!
//! Two calls carrying the same text, pagination, and filters must land on
//! the same key regardless of filter insertion order; anything that changes
//! the result set must change the key. The strategy override and timeout do
//! not affect the result set, so they are not part of the identity.

use gimbal_core::{CacheKey, SearchQuery};
use sha2::{Digest, Sha256};

/// Prefix carried by every key this policy produces. The version segment
/// changes whenever the fingerprint or payload encoding changes shape, so
/// stale entries from older builds simply miss.
pub const KEY_PREFIX: &str = "search:v1:";

/// Separator between the text and options sections of the digest input.
const SECTION: u8 = 0xFF;
/// Marker preceding each filter field name.
const FIELD: u8 = 0xFE;
/// Marker preceding each filter value.
const VALUE: u8 = 0xFD;

/// Fingerprint a query into its cache key.
pub fn fingerprint(query: &SearchQuery) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(query.text.as_bytes());
    hasher.update([SECTION]);
    hasher.update(query.options.limit.to_le_bytes());
    hasher.update(query.options.offset.to_le_bytes());

    // BTreeMap/BTreeSet iteration is sorted, so insertion order cannot leak
    // into the digest. The markers keep field/value boundaries unambiguous.
    for (field, values) in &query.options.filters {
        hasher.update([FIELD]);
        hasher.update(field.as_bytes());
        for value in values {
            hasher.update([VALUE]);
            hasher.update(value.as_bytes());
        }
    }

    let digest = hasher.finalize();
    CacheKey::from_rendered(format!("{}{}", KEY_PREFIX, hex::encode(digest)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gimbal_core::{SearchOptions, SearchStrategy};
    use std::time::Duration;

    #[test]
    fn test_same_query_same_key() {
        let a = SearchQuery::new("diabetes");
        let b = SearchQuery::new("diabetes");
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_key_carries_prefix() {
        let key = fingerprint(&SearchQuery::new("diabetes"));
        assert!(key.as_str().starts_with(KEY_PREFIX));
    }

    #[test]
    fn test_filter_order_does_not_change_key() {
        let a = SearchQuery::with_options(
            "diabetes",
            SearchOptions::new()
                .with_filter("state", "CA")
                .with_filter("specialty", "endocrinology"),
        );
        let b = SearchQuery::with_options(
            "diabetes",
            SearchOptions::new()
                .with_filter("specialty", "endocrinology")
                .with_filter("state", "CA"),
        );
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_different_text_different_key() {
        assert_ne!(
            fingerprint(&SearchQuery::new("diabetes")),
            fingerprint(&SearchQuery::new("hypertension"))
        );
    }

    #[test]
    fn test_pagination_changes_key() {
        let base = SearchQuery::new("diabetes");
        let paged = SearchQuery::with_options("diabetes", SearchOptions::new().with_offset(20));
        assert_ne!(fingerprint(&base), fingerprint(&paged));
    }

    #[test]
    fn test_filters_change_key() {
        let base = SearchQuery::new("diabetes");
        let filtered = SearchQuery::with_options(
            "diabetes",
            SearchOptions::new().with_filter("state", "CA"),
        );
        assert_ne!(fingerprint(&base), fingerprint(&filtered));
    }

    #[test]
    fn test_strategy_and_timeout_do_not_change_key() {
        let base = SearchQuery::new("diabetes");
        let routed = SearchQuery::with_options(
            "diabetes",
            SearchOptions::new()
                .with_strategy(SearchStrategy::DatabaseOnly)
                .with_timeout(Duration::from_millis(100)),
        );
        assert_eq!(fingerprint(&base), fingerprint(&routed));
    }

    #[test]
    fn test_field_value_boundaries_are_unambiguous() {
        // "ab" -> "c" and "a" -> "bc" must not collide.
        let a = SearchQuery::with_options(
            "q",
            SearchOptions::new().with_filter("ab", "c"),
        );
        let b = SearchQuery::with_options(
            "q",
            SearchOptions::new().with_filter("a", "bc"),
        );
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
