//! Fuzz test for manifest parsing
//!
//! Tests that manifest parsing handles arbitrary inputs safely.

#![no_main]

use libfuzzer_sys::fuzz_target;
use patchsync_core::manifest::is_safe_relative_path;
use patchsync_core::{parse_manifest, parse_manifest_line};
use std::collections::HashSet;
use std::path::Path;

fuzz_target!(|data: &str| {
    let entries = parse_manifest(data);

    // Every accepted entry is well formed and filenames are unique
    let mut seen = HashSet::new();
    for entry in &entries {
        assert!(!entry.filename.is_empty());
        assert!(!entry.checksum.is_empty());
        assert!(seen.insert(entry.filename.clone()));

        if let Some(link) = &entry.link {
            assert!(!link.eq_ignore_ascii_case("null"));
        }

        if is_safe_relative_path(&entry.filename) {
            let path = entry.local_path(Path::new("data"));
            assert!(path.starts_with("data"));
        }
    }

    // Single lines never panic either
    for (i, line) in data.lines().enumerate() {
        let _ = parse_manifest_line(i + 1, line);
    }
});
