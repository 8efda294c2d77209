//! Fuzz target for query URL and title patterns.
//!
//! Run with: cargo +nightly fuzz run fuzz_url_match

#![no_main]

use libfuzzer_sys::fuzz_target;
use tabshim_core::query::{glob_match, url_matches};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let (pattern, text) = s.split_once('\n').unwrap_or((s, ""));

    let _ = url_matches(pattern, text);
    if glob_match(pattern, text) {
        // A match stays a match when the pattern gains a trailing star.
        assert!(glob_match(&format!("{pattern}*"), text));
    }
});
