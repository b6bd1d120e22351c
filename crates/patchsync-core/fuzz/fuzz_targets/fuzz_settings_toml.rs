//! Fuzz test for settings TOML parsing
//!
//! Tests that settings deserialization handles arbitrary TOML safely.

#![no_main]

use libfuzzer_sys::fuzz_target;
use patchsync_core::{parse_size, Settings};

fuzz_target!(|data: &str| {
    if let Ok(settings) = Settings::from_toml(data) {
        // Conversion may fail but must not panic
        let _ = settings.to_sync_config();
        let _ = parse_size(&settings.verify.hash_progress_interval);
    }

    // Sections as they appear in a full config
    for section in ["server", "paths", "network", "verify", "behavior"] {
        let wrapped = format!("[{}]\n{}", section, data);
        let _ = Settings::from_toml(&wrapped);
    }

    let _ = parse_size(data);
});
