//! Raw tab records as each host family reports them.

use serde_json::{Value, json};
use tabshim_core::tab::RawTab;

fn object(value: Value) -> RawTab {
    match value {
        Value::Object(map) => map,
        _ => RawTab::new(),
    }
}

/// A record with every field, privacy flag named `incognito`.
pub fn full_raw_tab() -> RawTab {
    object(json!({
        "active": true,
        "audible": false,
        "favIconUrl": "https://example.com/favicon.ico",
        "height": 800,
        "id": 12,
        "incognito": false,
        "index": 3,
        "pinned": true,
        "status": "complete",
        "title": "Example",
        "url": "https://example.com/",
        "width": 1200,
        "windowId": 2
    }))
}

/// A record from a host that names the privacy flag `inPrivate`.
pub fn in_private_raw_tab() -> RawTab {
    object(json!({
        "active": false,
        "id": 4,
        "inPrivate": true,
        "index": 0,
        "pinned": false,
        "windowId": 9
    }))
}

/// A record without the permission-gated fields (`url`, `title`,
/// `favIconUrl`) and without an id, as for a devtools surface.
pub fn gated_raw_tab() -> RawTab {
    object(json!({
        "active": false,
        "incognito": false,
        "index": 1,
        "pinned": false,
        "status": "loading",
        "windowId": 1
    }))
}

/// A record missing the unconditional `windowId` field.
pub fn malformed_raw_tab() -> RawTab {
    object(json!({
        "active": true,
        "incognito": false,
        "index": 0,
        "pinned": false
    }))
}
