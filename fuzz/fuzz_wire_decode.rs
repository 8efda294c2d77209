//! Fuzz target for inbound bridge traffic and raw tab records.
//!
//! Run with: cargo +nightly fuzz run fuzz_wire_decode
//!
//! Agents and hosts are untrusted: arbitrary JSON must decode or be
//! rejected, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::Value;
use tabshim_core::bridge::{BridgeMessage, ResponsePayload};
use tabshim_core::normalize::{MESSAGING_FIELDS, STANDARD_FIELDS, normalize};

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    if let Ok(message) = serde_json::from_value::<BridgeMessage>(value.clone()) {
        let _ = message.is_ready_complete();
        let _ = message.is_response();
        let _ = serde_json::from_value::<ResponsePayload>(message.message)
            .map(ResponsePayload::into_result);
    }

    if let Value::Object(raw) = value {
        for table in [&STANDARD_FIELDS, &MESSAGING_FIELDS] {
            if let Ok(tab) = normalize(&raw, table) {
                // Whatever normalizes must serialize back out.
                assert!(serde_json::to_value(&tab).is_ok());
            }
        }
    }
});
