//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = tabshim_config::AppConfig::parse(s) {
            // A config that validates must yield a usable agent setup.
            assert!(!config.agent.resource_root.is_empty());
            let _ = config.bridge.request_timeout();
            let _ = config.agent.memory_limit();
        }
    }
});
