//! Canonical tab model and the option bags passed through to hosts.
//!
//! Everything here serializes in the camelCase shape hosts speak, so option
//! bags can be handed to a host unmodified and raw records can be decoded
//! without a translation layer.

use serde::{Deserialize, Serialize};

/// A tab identifier, unique within a browser session.
pub type TabId = i64;

/// A window identifier.
pub type WindowId = i64;

/// A host-specific tab record, before normalization.
pub type RawTab = serde_json::Map<String, serde_json::Value>;

/// Loading state of a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    Loading,
    Complete,
}

/// Canonical snapshot of a tab.
///
/// `active`, `incognito`, `index`, `pinned` and `window_id` are always
/// populated. The remaining fields are permission- or host-gated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    /// Whether the tab is active in its window.
    pub active: bool,
    /// Favicon URL; only present with the "tabs" permission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fav_icon_url: Option<String>,
    /// Absent for surfaces that do not host content (e.g. devtools).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TabId>,
    /// Whether the tab is in a private browsing window.
    pub incognito: bool,
    /// Zero-based position within its window.
    pub index: u32,
    pub pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TabStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// The window hosting this tab.
    pub window_id: WindowId,
}

/// Properties for a new tab.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProperties {
    /// Whether the new tab becomes active in its window. Defaults to true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// Position in the window; hosts clamp to the window's tab count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    /// Initial URL. Defaults to the host's new-tab page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Target window. Defaults to the current window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<WindowId>,
}

impl CreateProperties {
    /// Properties for a tab opened at `url`.
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Whether the created tab should become active.
    pub fn wants_active(&self) -> bool {
        self.active.unwrap_or(true)
    }
}

/// Properties to change on an existing tab.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The type of window a tab lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    Normal,
}

/// One or many URL match patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UrlFilter {
    One(String),
    Many(Vec<String>),
}

impl UrlFilter {
    /// The patterns as a slice, regardless of arity.
    pub fn patterns(&self) -> &[String] {
        match self {
            UrlFilter::One(p) => std::slice::from_ref(p),
            UrlFilter::Many(ps) => ps,
        }
    }
}

/// Filter for `query`. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_window: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_focused_window: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TabStatus>,
    /// Title match pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<UrlFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<WindowId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_type: Option<WindowType>,
}

impl QueryInfo {
    /// The query for "the active tab of the current window".
    pub fn active_in_current_window() -> Self {
        Self {
            active: Some(true),
            current_window: Some(true),
            ..Self::default()
        }
    }
}

/// The properties of a tab that changed, delivered with `onUpdated`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discarded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fav_icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TabStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ChangeInfo {
    /// A change carrying only a new loading status.
    pub fn status(status: TabStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// The script to inject: inline code or an absolute file reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Path rooted at the extension's base resource root; must start with `/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl ScriptDetails {
    /// Details carrying inline code.
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            file: None,
        }
    }

    /// Details referencing a file under the extension's resource root.
    pub fn file(file: impl Into<String>) -> Self {
        Self {
            code: None,
            file: Some(file.into()),
        }
    }

    /// Reject file references that are not rooted at `/`.
    pub fn validate(&self) -> Result<(), crate::TabsError> {
        match &self.file {
            Some(file) if !file.starts_with('/') => Err(crate::TabsError::Usage(format!(
                "the \"file\" parameter must be an absolute path, got {file:?}"
            ))),
            _ => Ok(()),
        }
    }
}

/// One or many tab ids, as accepted by `remove`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TabIds {
    One(TabId),
    Many(Vec<TabId>),
}

impl TabIds {
    /// The ids as a vector, regardless of arity.
    pub fn to_vec(&self) -> Vec<TabId> {
        match self {
            TabIds::One(id) => vec![*id],
            TabIds::Many(ids) => ids.clone(),
        }
    }
}

impl From<TabId> for TabIds {
    fn from(id: TabId) -> Self {
        TabIds::One(id)
    }
}

impl From<Vec<TabId>> for TabIds {
    fn from(ids: Vec<TabId>) -> Self {
        TabIds::Many(ids)
    }
}
