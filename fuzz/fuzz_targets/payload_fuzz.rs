//! Fuzz test for cached payload decoding
//!
//! Cache entries come back as opaque bytes that may be truncated, corrupt,
//! or written by a different build. Decoding must never panic; anything
//! malformed reads as `None` (a cache miss), never an error.
//!
//! Run with: cargo +nightly fuzz run payload_fuzz -- -max_total_time=60

#![no_main]

use gimbal_core::CachedPayload;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Some(payload) = CachedPayload::decode(data) {
        // Anything that decodes must carry the current version and survive a
        // re-encode/decode round trip.
        assert_eq!(payload.version, CachedPayload::VERSION);
        let bytes = payload.encode().expect("re-encode");
        assert!(CachedPayload::decode(&bytes).is_some());
    }
});
