//! The three host boundaries over one [`SimState`](super::SimState).

use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use super::{SimState, raw};
use crate::BoxFuture;
use crate::error::HostError;
use crate::event::UpdateEvent;
use crate::host::{
    Callback, CallbackTabsHost, InboundMessage, MessagingHost, OpenTab, PageInfo, PromiseTabsHost,
};
use crate::bridge::BridgeMessage;
use crate::query::WindowContext;
use crate::tab::{
    CreateProperties, QueryInfo, RawTab, ScriptDetails, TabId, TabIds, UpdateProperties,
};

/// Deferred-result host.
pub struct SimPromiseHost {
    state: Arc<SimState>,
}

impl SimPromiseHost {
    pub(super) fn new(state: Arc<SimState>) -> Self {
        Self { state }
    }
}

fn ready<'a, T: Send + 'a>(outcome: Result<T, HostError>) -> BoxFuture<'a, Result<T, HostError>> {
    Box::pin(async move { outcome })
}

impl PromiseTabsHost for SimPromiseHost {
    fn create(&self, props: &CreateProperties) -> BoxFuture<'_, Result<RawTab, HostError>> {
        let outcome = self
            .state
            .open(&OpenTab::from(props))
            .and_then(|id| self.state.tab(id))
            .map(|tab| raw(&tab));
        ready(outcome)
    }

    fn execute_script(
        &self,
        tab_id: Option<TabId>,
        details: &ScriptDetails,
    ) -> BoxFuture<'_, Result<Vec<Value>, HostError>> {
        let details = details.clone();
        Box::pin(self.state.execute(tab_id, details))
    }

    fn remove(&self, tab_ids: &TabIds) -> BoxFuture<'_, Result<(), HostError>> {
        ready(self.state.remove(&tab_ids.to_vec()))
    }

    fn update(
        &self,
        tab_id: Option<TabId>,
        props: &UpdateProperties,
    ) -> BoxFuture<'_, Result<RawTab, HostError>> {
        let outcome = self
            .state
            .update(tab_id, props)
            .and_then(|id| self.state.tab(id))
            .map(|tab| raw(&tab));
        ready(outcome)
    }

    fn query(&self, info: &QueryInfo) -> BoxFuture<'_, Result<Vec<RawTab>, HostError>> {
        let outcome = self
            .state
            .query(info)
            .map(|tabs| tabs.iter().map(raw).collect());
        ready(outcome)
    }

    fn on_updated(&self) -> &dyn UpdateEvent {
        &self.state.events
    }
}

/// Callback host with a last-error slot.
///
/// Callbacks run on the calling thread before the call returns, except for
/// `execute_script`, which completes on the tokio runtime.
pub struct SimCallbackHost {
    state: Arc<SimState>,
}

impl SimCallbackHost {
    pub(super) fn new(state: Arc<SimState>) -> Self {
        Self { state }
    }
}

/// Run `callback` with the outcome, holding a failure in the last-error slot
/// for exactly as long as the callback runs.
fn deliver(state: &SimState, callback: Callback, outcome: Result<Value, HostError>) {
    match outcome {
        Ok(value) => callback(value),
        Err(err) => {
            state.set_last_error(Some(err.0));
            callback(Value::Null);
            state.set_last_error(None);
        }
    }
}

fn tab_value(state: &SimState, id: TabId) -> Result<Value, HostError> {
    state.tab(id).map(|tab| Value::Object(raw(&tab)))
}

impl CallbackTabsHost for SimCallbackHost {
    fn create(&self, props: &CreateProperties, callback: Callback) {
        let outcome = self
            .state
            .open(&OpenTab::from(props))
            .and_then(|id| tab_value(&self.state, id));
        deliver(&self.state, callback, outcome);
    }

    fn execute_script(&self, tab_id: Option<TabId>, details: &ScriptDetails, callback: Callback) {
        let Ok(runtime) = Handle::try_current() else {
            let err = HostError::new("script execution needs an async runtime");
            deliver(&self.state, callback, Err(err));
            return;
        };
        let state = Arc::clone(&self.state);
        let details = details.clone();
        runtime.spawn(async move {
            let outcome = state
                .execute(tab_id, details)
                .await
                .map(Value::Array);
            deliver(&state, callback, outcome);
        });
    }

    fn remove(&self, tab_ids: &TabIds, callback: Callback) {
        let outcome = self.state.remove(&tab_ids.to_vec()).map(|()| Value::Null);
        deliver(&self.state, callback, outcome);
    }

    fn update(&self, tab_id: Option<TabId>, props: &UpdateProperties, callback: Callback) {
        let outcome = self
            .state
            .update(tab_id, props)
            .and_then(|id| tab_value(&self.state, id));
        deliver(&self.state, callback, outcome);
    }

    fn query(&self, info: &QueryInfo, callback: Callback) {
        let outcome = self.state.query(info).map(|tabs| {
            Value::Array(tabs.iter().map(|tab| Value::Object(raw(tab))).collect())
        });
        deliver(&self.state, callback, outcome);
    }

    fn last_error(&self) -> Option<String> {
        self.state.last_error()
    }

    fn on_updated(&self) -> &dyn UpdateEvent {
        &self.state.events
    }
}

/// Message-passing host: page addressing plus agent messaging, no tab API.
pub struct SimMessagingHost {
    state: Arc<SimState>,
}

impl SimMessagingHost {
    pub(super) fn new(state: Arc<SimState>) -> Self {
        Self { state }
    }
}

impl MessagingHost for SimMessagingHost {
    fn active_tab(&self) -> Option<PageInfo> {
        let model = self.state.model().ok()?;
        let page = model.active_page()?;
        Some(model.page_info(page))
    }

    fn tabs(&self) -> Vec<PageInfo> {
        let Ok(model) = self.state.model() else {
            return Vec::new();
        };
        let mut pages: Vec<PageInfo> = model.pages.iter().map(|p| model.page_info(p)).collect();
        pages.sort_by_key(|p| (p.window_id, p.index));
        pages
    }

    fn window_context(&self) -> WindowContext {
        self.state
            .model()
            .map(|m| m.window_context())
            .unwrap_or(WindowContext {
                current_window: None,
                last_focused_window: None,
            })
    }

    fn open_tab(&self, request: &OpenTab) -> Result<PageInfo, HostError> {
        let id = self.state.open(request)?;
        self.state.page_info(id)
    }

    fn close_tab(&self, id: TabId) -> Result<(), HostError> {
        self.state.remove(&[id])
    }

    fn update_tab(&self, id: TabId, props: &UpdateProperties) -> Result<PageInfo, HostError> {
        let id = self.state.update(Some(id), props)?;
        self.state.page_info(id)
    }

    fn dispatch(&self, target: TabId, message: BridgeMessage) -> Result<(), HostError> {
        self.state.dispatch(target, message)
    }

    fn add_message_listener(&self, sink: mpsc::UnboundedSender<InboundMessage>) {
        if let Ok(mut sinks) = self.state.sinks.lock() {
            sinks.push(sink);
        }
    }
}
