//! A message-passing host driven entirely by the test.
//!
//! Nothing answers dispatched messages on its own: the test reads what was
//! sent with [`ScriptedMessagingHost::sent`] and plays agents with
//! [`ScriptedMessagingHost::deliver`].

use std::sync::Mutex;

use tabshim_core::HostError;
use tabshim_core::bridge::BridgeMessage;
use tabshim_core::host::{InboundMessage, MessagingHost, OpenTab, PageInfo};
use tabshim_core::query::WindowContext;
use tabshim_core::tab::{TabId, UpdateProperties};
use tokio::sync::mpsc;

#[derive(Default)]
pub struct ScriptedMessagingHost {
    pages: Mutex<Vec<PageInfo>>,
    sent: Mutex<Vec<(TabId, BridgeMessage)>>,
    sinks: Mutex<Vec<mpsc::UnboundedSender<InboundMessage>>>,
}

/// A page in window 1.
pub fn page(id: TabId, index: u32, active: bool, url: &str) -> PageInfo {
    PageInfo {
        id,
        window_id: 1,
        index,
        active,
        private: false,
        url: Some(url.to_string()),
        title: None,
    }
}

impl ScriptedMessagingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(pages: Vec<PageInfo>) -> Self {
        Self {
            pages: Mutex::new(pages),
            ..Self::default()
        }
    }

    /// Everything dispatched so far, oldest first.
    pub fn sent(&self) -> Vec<(TabId, BridgeMessage)> {
        self.sent.lock().expect("sent lock").clone()
    }

    /// The correlation id of the `n`th dispatched request.
    pub fn return_id(&self, n: usize) -> String {
        self.sent()[n].1.message["returnId"]
            .as_str()
            .expect("request without returnId")
            .to_string()
    }

    /// Deliver `message` as if the agent in page `from` had sent it.
    pub fn deliver(&self, from: TabId, message: BridgeMessage) {
        let source = self
            .pages
            .lock()
            .expect("pages lock")
            .iter()
            .find(|p| p.id == from)
            .cloned()
            .expect("delivering from an unknown page");
        for sink in self.sinks.lock().expect("sinks lock").iter() {
            let _ = sink.send(InboundMessage {
                source: source.clone(),
                message: message.clone(),
            });
        }
    }
}

impl MessagingHost for ScriptedMessagingHost {
    fn active_tab(&self) -> Option<PageInfo> {
        self.pages
            .lock()
            .ok()?
            .iter()
            .find(|p| p.active)
            .cloned()
    }

    fn tabs(&self) -> Vec<PageInfo> {
        self.pages.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn window_context(&self) -> WindowContext {
        WindowContext {
            current_window: Some(1),
            last_focused_window: Some(1),
        }
    }

    fn open_tab(&self, request: &OpenTab) -> Result<PageInfo, HostError> {
        let mut pages = self.pages.lock().map_err(|_| HostError::new("poisoned"))?;
        let id = pages.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let index = u32::try_from(pages.len()).unwrap_or(u32::MAX);
        let opened = page(id, index, false, request.url.as_deref().unwrap_or("about:blank"));
        pages.push(opened.clone());
        Ok(opened)
    }

    fn close_tab(&self, id: TabId) -> Result<(), HostError> {
        let mut pages = self.pages.lock().map_err(|_| HostError::new("poisoned"))?;
        let before = pages.len();
        pages.retain(|p| p.id != id);
        if pages.len() == before {
            return Err(HostError::new(format!("No tab with id: {id}.")));
        }
        Ok(())
    }

    fn update_tab(&self, id: TabId, props: &UpdateProperties) -> Result<PageInfo, HostError> {
        let mut pages = self.pages.lock().map_err(|_| HostError::new("poisoned"))?;
        let page = pages
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| HostError::new(format!("No tab with id: {id}.")))?;
        if let Some(url) = &props.url {
            page.url = Some(url.clone());
        }
        Ok(page.clone())
    }

    fn dispatch(&self, target: TabId, message: BridgeMessage) -> Result<(), HostError> {
        self.sent
            .lock()
            .map_err(|_| HostError::new("poisoned"))?
            .push((target, message));
        Ok(())
    }

    fn add_message_listener(&self, sink: mpsc::UnboundedSender<InboundMessage>) {
        if let Ok(mut sinks) = self.sinks.lock() {
            sinks.push(sink);
        }
    }
}
