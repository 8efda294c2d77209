//! Host boundaries — the three native tab subsystems this crate adapts.
//!
//! The hosts themselves are external collaborators. Each is described by a
//! trait at the narrowest boundary the adapters need:
//!
//! ```text
//! ┌────────────────────┐  ┌──────────────────────┐  ┌─────────────────────┐
//! │  PromiseTabsHost   │  │  CallbackTabsHost    │  │   MessagingHost     │
//! │ (deferred results) │  │ (callback+lastError) │  │ (no tab API: agent  │
//! │                    │  │                      │  │  over message bus)  │
//! └─────────┬──────────┘  └──────────┬───────────┘  └──────────┬──────────┘
//!           └───────────────┬────────┴─────────────────────────┘
//!                   ┌───────▼───────┐
//!                   │  Environment  │──── detect() ───▶ HostModel
//!                   └───────────────┘
//! ```

pub mod detect;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::BoxFuture;
use crate::bridge::wire::BridgeMessage;
use crate::error::HostError;
use crate::event::UpdateEvent;
use crate::query::WindowContext;
use crate::tab::{
    CreateProperties, QueryInfo, RawTab, ScriptDetails, TabId, TabIds, UpdateProperties, WindowId,
};

pub use detect::{HostModel, HostPreference, detect, select};

/// A host whose tab calls return deferred results.
pub trait PromiseTabsHost: Send + Sync {
    fn create(&self, props: &CreateProperties) -> BoxFuture<'_, Result<RawTab, HostError>>;

    fn execute_script(
        &self,
        tab_id: Option<TabId>,
        details: &ScriptDetails,
    ) -> BoxFuture<'_, Result<Vec<Value>, HostError>>;

    fn remove(&self, tab_ids: &TabIds) -> BoxFuture<'_, Result<(), HostError>>;

    fn update(
        &self,
        tab_id: Option<TabId>,
        props: &UpdateProperties,
    ) -> BoxFuture<'_, Result<RawTab, HostError>>;

    fn query(&self, info: &QueryInfo) -> BoxFuture<'_, Result<Vec<RawTab>, HostError>>;

    /// The host's native tab-updated event.
    fn on_updated(&self) -> &dyn UpdateEvent;
}

/// Completion callback handed to a [`CallbackTabsHost`].
///
/// On failure the host calls it with `Value::Null` after setting its
/// last-error slot.
pub type Callback = Box<dyn FnOnce(Value) + Send>;

/// A host whose tab calls complete through a callback, with failures
/// reported in a host-global last-error slot.
pub trait CallbackTabsHost: Send + Sync {
    fn create(&self, props: &CreateProperties, callback: Callback);

    fn execute_script(&self, tab_id: Option<TabId>, details: &ScriptDetails, callback: Callback);

    fn remove(&self, tab_ids: &TabIds, callback: Callback);

    fn update(&self, tab_id: Option<TabId>, props: &UpdateProperties, callback: Callback);

    fn query(&self, info: &QueryInfo, callback: Callback);

    /// The last-error slot. Only meaningful while a callback is running; the
    /// host clears it once the callback returns.
    fn last_error(&self) -> Option<String>;

    fn on_updated(&self) -> &dyn UpdateEvent;
}

/// A content page as the message-passing host addresses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub id: TabId,
    pub window_id: WindowId,
    pub index: u32,
    pub active: bool,
    pub private: bool,
    pub url: Option<String>,
    pub title: Option<String>,
}

impl PageInfo {
    /// The raw record this host reports for a page.
    ///
    /// The host cannot probe pin state or loading status, so those are
    /// fixed: never pinned, always complete.
    pub fn to_raw(&self) -> RawTab {
        let mut raw = RawTab::new();
        raw.insert("active".into(), Value::Bool(self.active));
        raw.insert("id".into(), Value::from(self.id));
        raw.insert("inPrivate".into(), Value::Bool(self.private));
        raw.insert("index".into(), Value::from(self.index));
        raw.insert("pinned".into(), Value::Bool(false));
        raw.insert("status".into(), Value::from("complete"));
        if let Some(title) = &self.title {
            raw.insert("title".into(), Value::from(title.as_str()));
        }
        if let Some(url) = &self.url {
            raw.insert("url".into(), Value::from(url.as_str()));
        }
        raw.insert("windowId".into(), Value::from(self.window_id));
        raw
    }
}

/// Whether a newly opened page takes focus in its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Foreground,
    Background,
}

/// A request to open a page, in the message-passing host's own terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenTab {
    pub window_id: Option<WindowId>,
    pub index: Option<u32>,
    pub url: Option<String>,
    pub visibility: Visibility,
}

impl From<&CreateProperties> for OpenTab {
    fn from(props: &CreateProperties) -> Self {
        Self {
            window_id: props.window_id,
            index: props.index,
            url: props.url.clone(),
            visibility: if props.wants_active() {
                Visibility::Foreground
            } else {
                Visibility::Background
            },
        }
    }
}

/// A message an agent dispatched, tagged with the page it came from.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub source: PageInfo,
    pub message: BridgeMessage,
}

/// A host with no tab API beyond page addressing and message passing.
///
/// Messages travel fire-and-forget in both directions. Delivery is at most
/// once and unordered; only the message `name` is guaranteed verbatim.
pub trait MessagingHost: Send + Sync {
    /// The active tab of the active window, if any.
    fn active_tab(&self) -> Option<PageInfo>;

    /// Every open page, in window order.
    fn tabs(&self) -> Vec<PageInfo>;

    /// Which windows count as current and last-focused.
    fn window_context(&self) -> WindowContext;

    fn open_tab(&self, request: &OpenTab) -> Result<PageInfo, HostError>;

    fn close_tab(&self, id: TabId) -> Result<(), HostError>;

    fn update_tab(&self, id: TabId, props: &UpdateProperties) -> Result<PageInfo, HostError>;

    /// Send a message to the agent injected into page `target`.
    fn dispatch(&self, target: TabId, message: BridgeMessage) -> Result<(), HostError>;

    /// Register a sink that receives every message any agent dispatches.
    ///
    /// The sink is unbounded; a host never drops a message it delivered.
    fn add_message_listener(&self, sink: mpsc::UnboundedSender<InboundMessage>);
}

/// The ambient bindings present in this process.
///
/// Each binding is optional; the detector decides which one is used.
#[derive(Clone, Default)]
pub struct Environment {
    promise: Option<Arc<dyn PromiseTabsHost>>,
    callback: Option<Arc<dyn CallbackTabsHost>>,
    messaging: Option<Arc<dyn MessagingHost>>,
}

impl Environment {
    /// An environment with no bindings at all.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_promise_host(mut self, host: Arc<dyn PromiseTabsHost>) -> Self {
        self.promise = Some(host);
        self
    }

    pub fn with_callback_host(mut self, host: Arc<dyn CallbackTabsHost>) -> Self {
        self.callback = Some(host);
        self
    }

    pub fn with_messaging_host(mut self, host: Arc<dyn MessagingHost>) -> Self {
        self.messaging = Some(host);
        self
    }

    pub fn promise_host(&self) -> Option<&Arc<dyn PromiseTabsHost>> {
        self.promise.as_ref()
    }

    pub fn callback_host(&self) -> Option<&Arc<dyn CallbackTabsHost>> {
        self.callback.as_ref()
    }

    pub fn messaging_host(&self) -> Option<&Arc<dyn MessagingHost>> {
        self.messaging.as_ref()
    }

    /// Whether the binding for `model` is present.
    pub fn has(&self, model: HostModel) -> bool {
        match model {
            HostModel::PromiseNative => self.promise.is_some(),
            HostModel::CallbackWithLastError => self.callback.is_some(),
            HostModel::MessagePassingOnly => self.messaging.is_some(),
        }
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("promise", &self.promise.is_some())
            .field("callback", &self.callback.is_some())
            .field("messaging", &self.messaging.is_some())
            .finish()
    }
}
