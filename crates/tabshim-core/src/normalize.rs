//! Tab normalizer — maps host-specific raw records onto the canonical [`Tab`].
//!
//! Hosts disagree on a handful of field names. Rather than branching on host
//! identity, each host carries a [`FieldMap`]: for every canonical field that
//! differs, the raw names to probe, in order. Adding a host is a data change.

use serde_json::Value;

use crate::error::TabsError;
use crate::tab::{RawTab, Tab, TabStatus};

/// Per-host table of raw field names to probe for a canonical field.
///
/// Fields without an entry are read under their canonical name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMap {
    aliases: &'static [(&'static str, &'static [&'static str])],
}

impl FieldMap {
    pub const fn new(aliases: &'static [(&'static str, &'static [&'static str])]) -> Self {
        Self { aliases }
    }

    /// The raw names to probe for `canonical`, in order, if they differ
    /// from the canonical name.
    pub fn candidates(&self, canonical: &str) -> Option<&'static [&'static str]> {
        self.aliases
            .iter()
            .find(|(name, _)| *name == canonical)
            .map(|(_, candidates)| *candidates)
    }

    fn probe<'a>(&self, raw: &'a RawTab, canonical: &str) -> Option<&'a Value> {
        let present = |name: &str| raw.get(name).filter(|v| !v.is_null());
        match self.candidates(canonical) {
            Some(names) => names.iter().find_map(|name| present(*name)),
            None => present(canonical),
        }
    }
}

/// Field map for the promise-native and callback hosts: `incognito`, falling
/// back to `inPrivate`.
pub const STANDARD_FIELDS: FieldMap = FieldMap::new(&[("incognito", &["incognito", "inPrivate"])]);

/// Field map for the message-passing host: `inPrivate`, falling back to
/// `incognito`.
pub const MESSAGING_FIELDS: FieldMap =
    FieldMap::new(&[("incognito", &["inPrivate", "incognito"])]);

/// Convert one raw record into a [`Tab`]. The input is never modified.
pub fn normalize(raw: &RawTab, fields: &FieldMap) -> Result<Tab, TabsError> {
    let probe = |canonical: &str| fields.probe(raw, canonical);

    let required_bool = |canonical: &'static str| {
        probe(canonical)
            .and_then(Value::as_bool)
            .ok_or(TabsError::MalformedTab(canonical))
    };
    let optional_str = |canonical: &'static str| {
        probe(canonical)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let index = probe("index")
        .and_then(Value::as_u64)
        .and_then(|i| u32::try_from(i).ok())
        .ok_or(TabsError::MalformedTab("index"))?;
    let window_id = probe("windowId")
        .and_then(Value::as_i64)
        .ok_or(TabsError::MalformedTab("windowId"))?;
    let status = match probe("status") {
        Some(value) => Some(
            serde_json::from_value::<TabStatus>(value.clone())
                .map_err(|_| TabsError::MalformedTab("status"))?,
        ),
        None => None,
    };

    Ok(Tab {
        active: required_bool("active")?,
        fav_icon_url: optional_str("favIconUrl"),
        id: probe("id").and_then(Value::as_i64),
        incognito: required_bool("incognito")?,
        index,
        pinned: required_bool("pinned")?,
        status,
        title: optional_str("title"),
        url: optional_str("url"),
        window_id,
    })
}

/// Point-wise [`normalize`] over a batch result.
pub fn normalize_all(raws: &[RawTab], fields: &FieldMap) -> Result<Vec<Tab>, TabsError> {
    raws.iter().map(|raw| normalize(raw, fields)).collect()
}

/// Decode a host value into a raw record, rejecting anything but an object.
pub fn raw_from_value(value: Value) -> Result<RawTab, TabsError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(TabsError::MalformedTab("<record>")),
    }
}

/// Decode a host value holding an array of raw records.
pub fn raws_from_value(value: Value) -> Result<Vec<RawTab>, TabsError> {
    match value {
        Value::Array(items) => items.into_iter().map(raw_from_value).collect(),
        Value::Null => Ok(Vec::new()),
        _ => Err(TabsError::MalformedTab("<records>")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn raw(value: Value) -> RawTab {
        raw_from_value(value).unwrap()
    }

    #[test]
    fn test_full_record() {
        let record = raw(json!({
            "active": true,
            "favIconUrl": "https://example.com/favicon.ico",
            "id": 12,
            "incognito": false,
            "index": 3,
            "pinned": true,
            "status": "loading",
            "title": "Example",
            "url": "https://example.com/",
            "windowId": 2,
            "audible": true
        }));
        let tab = normalize(&record, &STANDARD_FIELDS).unwrap();
        assert_eq!(
            tab,
            Tab {
                active: true,
                fav_icon_url: Some("https://example.com/favicon.ico".to_string()),
                id: Some(12),
                incognito: false,
                index: 3,
                pinned: true,
                status: Some(TabStatus::Loading),
                title: Some("Example".to_string()),
                url: Some("https://example.com/".to_string()),
                window_id: 2,
            }
        );
    }

    #[test]
    fn test_gated_fields_stay_absent() {
        let record = raw(json!({
            "active": false,
            "incognito": false,
            "index": 0,
            "pinned": false,
            "windowId": 1
        }));
        for fields in [&STANDARD_FIELDS, &MESSAGING_FIELDS] {
            let tab = normalize(&record, fields).unwrap();
            assert_eq!(tab.id, None);
            assert_eq!(tab.url, None);
            assert_eq!(tab.title, None);
            assert_eq!(tab.fav_icon_url, None);
            assert_eq!(tab.status, None);
        }
    }

    #[test]
    fn test_privacy_flag_fallback() {
        let edge_style = raw(json!({
            "active": true, "inPrivate": true, "index": 0, "pinned": false, "windowId": 1
        }));
        assert!(normalize(&edge_style, &STANDARD_FIELDS).unwrap().incognito);

        let both = raw(json!({
            "active": true, "incognito": false, "inPrivate": true,
            "index": 0, "pinned": false, "windowId": 1
        }));
        // First candidate wins when both are present.
        assert!(!normalize(&both, &STANDARD_FIELDS).unwrap().incognito);
        assert!(normalize(&both, &MESSAGING_FIELDS).unwrap().incognito);
    }

    #[test]
    fn test_missing_unconditional_field_is_rejected() {
        let record = raw(json!({ "active": true, "index": 0, "pinned": false, "windowId": 1 }));
        let err = normalize(&record, &STANDARD_FIELDS).unwrap_err();
        assert!(matches!(err, TabsError::MalformedTab("incognito")));
    }

    #[test]
    fn test_input_is_not_mutated() {
        let record = raw(json!({
            "active": true, "inPrivate": false, "index": 1, "pinned": false, "windowId": 9
        }));
        let before = record.clone();
        normalize(&record, &STANDARD_FIELDS).unwrap();
        assert_eq!(record, before);
    }

    #[test]
    fn test_normalize_all_is_pointwise() {
        let records = raws_from_value(json!([
            { "active": true, "incognito": false, "index": 0, "pinned": false, "windowId": 1 },
            { "active": false, "incognito": false, "index": 1, "pinned": false, "windowId": 1 }
        ]))
        .unwrap();
        let tabs = normalize_all(&records, &STANDARD_FIELDS).unwrap();
        assert_eq!(tabs.len(), 2);
        assert_eq!(tabs[1].index, 1);
    }

    #[test]
    fn test_candidates_only_for_aliased_fields() {
        assert_eq!(STANDARD_FIELDS.candidates("url"), None);
        assert_eq!(
            MESSAGING_FIELDS.candidates("incognito"),
            Some(&["inPrivate", "incognito"][..])
        );
    }
}
