//! Adapter for the message-passing host.
//!
//! Tab management goes through the host's page primitives. Script execution
//! goes through the agent bridge, and `onUpdated` is synthesized from agents'
//! lifecycle messages.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use tabshim_config::BridgeConfig;

use super::{TabsApi, rejected};
use crate::Deferred;
use crate::bridge::BridgeController;
use crate::bridge::wire::EXECUTE_SCRIPT;
use crate::error::{HostError, TabsError};
use crate::event::UpdateEvent;
use crate::host::{HostModel, MessagingHost, OpenTab, PageInfo};
use crate::normalize::{MESSAGING_FIELDS, normalize};
use crate::query::matches;
use crate::tab::{CreateProperties, QueryInfo, ScriptDetails, Tab, TabId, TabIds, UpdateProperties};

pub struct MessagePassingTabs {
    host: Arc<dyn MessagingHost>,
    bridge: BridgeController,
    dispatcher: JoinHandle<()>,
}

impl MessagePassingTabs {
    /// Attach to `host` and spawn the bridge dispatcher on the current tokio
    /// runtime.
    pub fn new(host: Arc<dyn MessagingHost>, config: &BridgeConfig) -> Result<Self, TabsError> {
        let runtime = Handle::try_current().map_err(|_| TabsError::NoRuntime)?;
        let (bridge, dispatcher) = BridgeController::new(Arc::clone(&host), config);
        let dispatcher = runtime.spawn(dispatcher.run());
        Ok(Self {
            host,
            bridge,
            dispatcher,
        })
    }

    pub fn bridge(&self) -> &BridgeController {
        &self.bridge
    }

    fn resolve(&self, tab_id: Option<TabId>) -> Result<TabId, TabsError> {
        match tab_id {
            Some(id) => Ok(id),
            None => self
                .host
                .active_tab()
                .map(|page| page.id)
                .ok_or(TabsError::NoActiveTab),
        }
    }
}

impl Drop for MessagePassingTabs {
    fn drop(&mut self) {
        self.dispatcher.abort();
        let dropped = self.bridge.close();
        if dropped > 0 {
            debug!(dropped, "Abandoned pending agent requests");
        }
    }
}

fn to_tab(page: &PageInfo) -> Result<Tab, TabsError> {
    normalize(&page.to_raw(), &MESSAGING_FIELDS)
}

fn ready<T: Send + 'static>(outcome: Result<T, TabsError>) -> Deferred<T> {
    Box::pin(async move { outcome })
}

impl TabsApi for MessagePassingTabs {
    fn model(&self) -> HostModel {
        HostModel::MessagePassingOnly
    }

    fn create(&self, props: CreateProperties) -> Deferred<Tab> {
        let outcome = self
            .host
            .open_tab(&OpenTab::from(&props))
            .map_err(TabsError::from)
            .and_then(|page| to_tab(&page));
        ready(outcome)
    }

    fn execute_script(
        &self,
        tab_id: Option<TabId>,
        details: ScriptDetails,
    ) -> Deferred<Vec<Value>> {
        let args = match serde_json::to_value(&details) {
            Ok(args) => vec![args],
            Err(err) => return rejected(err.into()),
        };
        let request = self.bridge.run_agent_request(tab_id, EXECUTE_SCRIPT, args);
        // The agent answers with one completion value; hosts with a native
        // executeScript answer with one per frame.
        Box::pin(async move { Ok(vec![request.await?]) })
    }

    /// Closes every tab or none: unknown ids are refused before any closes.
    fn remove(&self, tab_ids: TabIds) -> Deferred<()> {
        let ids = tab_ids.to_vec();
        let open: HashSet<TabId> = self.host.tabs().iter().map(|page| page.id).collect();
        if let Some(missing) = ids.iter().find(|id| !open.contains(id)) {
            let err = HostError::new(format!("No tab with id: {missing}."));
            return ready(Err(err.into()));
        }

        let outcome = ids
            .into_iter()
            .try_for_each(|id| self.host.close_tab(id))
            .map_err(TabsError::from);
        ready(outcome)
    }

    fn update(&self, tab_id: Option<TabId>, props: UpdateProperties) -> Deferred<Tab> {
        let outcome = self.resolve(tab_id).and_then(|id| {
            let page = self.host.update_tab(id, &props)?;
            to_tab(&page)
        });
        ready(outcome)
    }

    fn query(&self, info: QueryInfo) -> Deferred<Vec<Tab>> {
        // Minimal path: the active tab of the current window, straight from
        // the addressing primitive.
        if info == QueryInfo::active_in_current_window() {
            let outcome = match self.host.active_tab() {
                Some(page) => to_tab(&page).map(|tab| vec![tab]),
                None => Ok(Vec::new()),
            };
            return ready(outcome);
        }

        let window = self.host.window_context();
        let outcome = self
            .host
            .tabs()
            .iter()
            .map(to_tab)
            .filter(|tab| tab.as_ref().map_or(true, |tab| matches(&info, tab, &window)))
            .collect();
        ready(outcome)
    }

    fn on_updated(&self) -> &dyn UpdateEvent {
        self.bridge.listeners()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBrowser;

    #[test]
    fn test_needs_a_runtime() {
        let browser = SimBrowser::new();
        assert!(matches!(
            MessagePassingTabs::new(browser.messaging_host(), &BridgeConfig::default()),
            Err(TabsError::NoRuntime)
        ));
    }

    #[tokio::test]
    async fn test_drop_fails_outstanding_requests() {
        let browser = SimBrowser::new();
        let id = browser.open("https://a.test/").unwrap();
        browser.detach_agent(id);

        let tabs = MessagePassingTabs::new(browser.messaging_host(), &BridgeConfig::default())
            .unwrap();
        let request = tabs.execute_script(Some(id), ScriptDetails::code("1"));
        assert_eq!(tabs.bridge().pending_count(), 1);

        drop(tabs);
        assert!(matches!(request.await, Err(TabsError::BridgeClosed)));
    }

    #[tokio::test]
    async fn test_remove_with_unknown_id_closes_nothing() {
        let browser = SimBrowser::new();
        let a = browser.open("https://a.test/").unwrap();
        let b = browser.open("https://b.test/").unwrap();
        let tabs = MessagePassingTabs::new(browser.messaging_host(), &BridgeConfig::default())
            .unwrap();

        let err = tabs.remove(TabIds::Many(vec![a, 999, b])).await.unwrap_err();
        assert_eq!(err.to_string(), "No tab with id: 999.");
        assert_eq!(browser.tab_count(), 2);

        tabs.remove(TabIds::Many(vec![a, b])).await.unwrap();
        assert_eq!(browser.tab_count(), 0);
    }
}
