//! Fuzz test for cache key fingerprinting and query classification
//!
//! Arbitrary query text must never panic the fingerprint policy or the
//! hybrid classifier, and fingerprinting must stay deterministic.
//!
//! Run with: cargo +nightly fuzz run fingerprint_fuzz -- -max_total_time=60

#![no_main]

use gimbal_core::{ComplexityPolicy, SearchQuery};
use gimbal_engine::{fingerprint, QueryClassifier, KEY_PREFIX};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let query = SearchQuery::new(text);

        let key = fingerprint(&query);
        // Keys always carry the versioned prefix.
        assert!(key.as_str().starts_with(KEY_PREFIX));
        // Fingerprinting is deterministic.
        assert_eq!(key, fingerprint(&query));

        // Classification must never panic, whatever the input looks like.
        let classifier =
            QueryClassifier::from_policy(&ComplexityPolicy::default()).expect("default policy");
        let _ = classifier.is_complex(text);
    }
});
