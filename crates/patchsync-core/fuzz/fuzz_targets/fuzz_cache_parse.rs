//! Fuzz test for checksum cache parsing
//!
//! Tests that cache file parsing handles arbitrary inputs safely.

#![no_main]

use libfuzzer_sys::fuzz_target;
use patchsync_core::{is_hex_digest, parse_cache};

fuzz_target!(|data: &str| {
    let entries = parse_cache(data);

    for (filename, checksum) in &entries {
        assert!(!filename.is_empty());
        assert_eq!(filename, &filename.to_lowercase());
        assert!(is_hex_digest(checksum));
    }

    // Re-serializing and parsing again is stable
    let rendered: String = entries
        .iter()
        .map(|(f, c)| format!("{},{}\n", f, c))
        .collect();
    assert_eq!(parse_cache(&rendered), entries);
});
