//! In-memory browser — all three host models over one tab model.
//!
//! Windows hold ordered pages. Every page opened while a tokio runtime is
//! available gets a real [`Agent`] listening on its own inbox, so the
//! message-passing host exercises the same bridge code a real page would.
//! Page loads finish immediately: the native `onUpdated` event fires with
//! `status: complete` and the page's agent announces `readystatechange`.
//!
//! Failures can be injected with [`SimBrowser::fail_next`]: the next host
//! call of any kind fails with the given message.

mod hosts;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

use crate::bridge::{
    Agent, AgentPort, BridgeMessage, QuickJsEvaluator, ReadyState, ResourceLoader,
    ScriptEvaluator,
};
use crate::error::HostError;
use crate::event::ListenerSet;
use crate::host::{
    CallbackTabsHost, Environment, HostModel, InboundMessage, MessagingHost, OpenTab, PageInfo,
    PromiseTabsHost, Visibility,
};
use crate::query::{WindowContext, matches};
use crate::tab::{
    ChangeInfo, QueryInfo, RawTab, ScriptDetails, Tab, TabId, TabStatus, UpdateProperties,
    WindowId,
};

pub use hosts::{SimCallbackHost, SimMessagingHost, SimPromiseHost};

/// The page a new tab shows when no URL is given.
pub const NEW_TAB_URL: &str = "about:newtab";

#[derive(Debug, Clone)]
struct Page {
    id: TabId,
    window_id: WindowId,
    url: Option<String>,
    title: Option<String>,
    active: bool,
    pinned: bool,
    status: TabStatus,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    id: WindowId,
    private: bool,
}

#[derive(Debug)]
struct Model {
    windows: Vec<Window>,
    pages: Vec<Page>,
    focused: Option<WindowId>,
    next_tab_id: TabId,
    next_window_id: WindowId,
}

impl Model {
    fn new() -> Self {
        Self {
            windows: Vec::new(),
            pages: Vec::new(),
            focused: None,
            next_tab_id: 1,
            next_window_id: 1,
        }
    }

    fn add_window(&mut self, private: bool) -> WindowId {
        let id = self.next_window_id;
        self.next_window_id += 1;
        self.windows.push(Window { id, private });
        self.focused = Some(id);
        id
    }

    fn window(&self, id: WindowId) -> Result<&Window, HostError> {
        self.windows
            .iter()
            .find(|w| w.id == id)
            .ok_or_else(|| HostError::new(format!("No window with id: {id}.")))
    }

    fn page(&self, id: TabId) -> Result<&Page, HostError> {
        self.pages
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| no_tab(id))
    }

    fn page_mut(&mut self, id: TabId) -> Result<&mut Page, HostError> {
        self.pages
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| no_tab(id))
    }

    fn active_page(&self) -> Option<&Page> {
        let focused = self.focused?;
        self.pages
            .iter()
            .find(|p| p.window_id == focused && p.active)
    }

    /// The target of a call without an explicit tab id.
    fn resolve(&self, tab_id: Option<TabId>) -> Result<TabId, HostError> {
        match tab_id {
            Some(id) => self.page(id).map(|p| p.id),
            None => self
                .active_page()
                .map(|p| p.id)
                .ok_or_else(|| HostError::new("No active tab.")),
        }
    }

    fn index_of(&self, page: &Page) -> u32 {
        let position = self
            .pages
            .iter()
            .filter(|p| p.window_id == page.window_id)
            .position(|p| p.id == page.id)
            .unwrap_or(0);
        u32::try_from(position).unwrap_or(u32::MAX)
    }

    fn is_private(&self, window_id: WindowId) -> bool {
        self.window(window_id).map(|w| w.private).unwrap_or(false)
    }

    fn insert(&mut self, page: Page, index: Option<u32>) {
        let slots: Vec<usize> = self
            .pages
            .iter()
            .enumerate()
            .filter(|(_, p)| p.window_id == page.window_id)
            .map(|(i, _)| i)
            .collect();
        let at = match index.and_then(|i| slots.get(i as usize)) {
            Some(&slot) => slot,
            None => slots.last().map_or(self.pages.len(), |&last| last + 1),
        };
        self.pages.insert(at, page);
    }

    fn activate(&mut self, id: TabId) {
        let Ok(window_id) = self.page(id).map(|p| p.window_id) else {
            return;
        };
        for page in self.pages.iter_mut().filter(|p| p.window_id == window_id) {
            page.active = page.id == id;
        }
    }

    fn remove(&mut self, id: TabId) -> Option<Page> {
        let at = self.pages.iter().position(|p| p.id == id)?;
        let index = self.index_of(&self.pages[at]) as usize;
        let page = self.pages.remove(at);

        if page.active {
            let successor = self
                .pages
                .iter()
                .filter(|p| p.window_id == page.window_id)
                .enumerate()
                .take_while(|(i, _)| *i <= index)
                .last()
                .map(|(_, p)| p.id);
            if let Some(next) = successor {
                self.activate(next);
            }
        }
        Some(page)
    }

    fn tab(&self, page: &Page) -> Tab {
        Tab {
            active: page.active,
            fav_icon_url: None,
            id: Some(page.id),
            incognito: self.is_private(page.window_id),
            index: self.index_of(page),
            pinned: page.pinned,
            status: Some(page.status),
            title: page.title.clone(),
            url: page.url.clone(),
            window_id: page.window_id,
        }
    }

    fn page_info(&self, page: &Page) -> PageInfo {
        PageInfo {
            id: page.id,
            window_id: page.window_id,
            index: self.index_of(page),
            active: page.active,
            private: self.is_private(page.window_id),
            url: page.url.clone(),
            title: page.title.clone(),
        }
    }

    fn window_context(&self) -> WindowContext {
        WindowContext {
            current_window: self.focused,
            last_focused_window: self.focused,
        }
    }
}

fn no_tab(id: TabId) -> HostError {
    HostError::new(format!("No tab with id: {id}."))
}

/// The record native hosts hand out for a tab.
fn raw(tab: &Tab) -> RawTab {
    match serde_json::to_value(tab) {
        Ok(Value::Object(map)) => map,
        _ => RawTab::new(),
    }
}

/// A page's agent and the inbox it serves.
struct AgentSlot {
    agent: Arc<Agent>,
    inbox: mpsc::UnboundedSender<BridgeMessage>,
}

struct SimState {
    model: Mutex<Model>,
    fault: Mutex<Option<String>>,
    /// Last-error slot, per delivering thread: set only while a failing
    /// callback runs on that thread.
    last_error: Mutex<HashMap<std::thread::ThreadId, String>>,
    events: ListenerSet,
    sinks: Mutex<Vec<mpsc::UnboundedSender<InboundMessage>>>,
    agents: Mutex<HashMap<TabId, AgentSlot>>,
    evaluator: Mutex<Arc<dyn ScriptEvaluator>>,
    resources: Mutex<Option<Arc<dyn ResourceLoader>>>,
}

impl SimState {
    fn model(&self) -> Result<MutexGuard<'_, Model>, HostError> {
        self.model
            .lock()
            .map_err(|_| HostError::new("browser state unavailable"))
    }

    fn take_fault(&self) -> Result<(), HostError> {
        match self.fault.lock().ok().and_then(|mut f| f.take()) {
            Some(message) => Err(HostError::new(message)),
            None => Ok(()),
        }
    }

    fn evaluator(&self) -> Arc<dyn ScriptEvaluator> {
        match self.evaluator.lock() {
            Ok(evaluator) => Arc::clone(&evaluator),
            Err(_) => Arc::new(QuickJsEvaluator::new()),
        }
    }

    fn resources(&self) -> Option<Arc<dyn ResourceLoader>> {
        self.resources.lock().ok().and_then(|r| r.clone())
    }

    fn tab(&self, id: TabId) -> Result<Tab, HostError> {
        let model = self.model()?;
        let page = model.page(id)?;
        Ok(model.tab(page))
    }

    fn page_info(&self, id: TabId) -> Result<PageInfo, HostError> {
        let model = self.model()?;
        let page = model.page(id)?;
        Ok(model.page_info(page))
    }

    fn open(self: &Arc<Self>, request: &OpenTab) -> Result<TabId, HostError> {
        self.take_fault()?;
        let id = {
            let mut model = self.model()?;
            let window_id = match request.window_id.or(model.focused) {
                Some(id) => model.window(id)?.id,
                None => return Err(HostError::new("No current window.")),
            };
            let id = model.next_tab_id;
            model.next_tab_id += 1;
            let page = Page {
                id,
                window_id,
                url: Some(
                    request
                        .url
                        .clone()
                        .unwrap_or_else(|| NEW_TAB_URL.to_string()),
                ),
                title: None,
                active: false,
                pinned: false,
                status: TabStatus::Loading,
            };
            model.insert(page, request.index);
            let first_in_window = model.pages.iter().filter(|p| p.window_id == window_id).count() == 1;
            if request.visibility == Visibility::Foreground || first_in_window {
                model.activate(id);
            }
            id
        };
        debug!(tab_id = id, url = ?request.url, "Page opened");

        self.attach_agent(id);
        self.finish_load(id, None);
        Ok(id)
    }

    fn update(self: &Arc<Self>, tab_id: Option<TabId>, props: &UpdateProperties) -> Result<TabId, HostError> {
        self.take_fault()?;
        let (id, navigated) = {
            let mut model = self.model()?;
            let id = model.resolve(tab_id)?;
            if props.active == Some(true) {
                model.activate(id);
            }
            let navigated = props.url.clone();
            if let Some(url) = &navigated {
                let page = model.page_mut(id)?;
                page.url = Some(url.clone());
                page.title = None;
                page.status = TabStatus::Loading;
            }
            (id, navigated)
        };
        if navigated.is_some() {
            self.finish_load(id, navigated);
        }
        Ok(id)
    }

    fn remove(&self, ids: &[TabId]) -> Result<(), HostError> {
        self.take_fault()?;
        {
            let mut model = self.model()?;
            if let Some(missing) = ids.iter().find(|id| model.page(**id).is_err()) {
                return Err(no_tab(*missing));
            }
            for id in ids {
                model.remove(*id);
            }
        }
        for id in ids {
            self.detach_agent(*id);
        }
        Ok(())
    }

    fn query(&self, info: &QueryInfo) -> Result<Vec<Tab>, HostError> {
        self.take_fault()?;
        let model = self.model()?;
        let window = model.window_context();
        Ok(model
            .pages
            .iter()
            .map(|page| model.tab(page))
            .filter(|tab| matches(info, tab, &window))
            .collect())
    }

    /// Run a script the way a native host does: in the page, one result per
    /// frame (the simulated pages have exactly one).
    async fn execute(&self, tab_id: Option<TabId>, details: ScriptDetails) -> Result<Vec<Value>, HostError> {
        self.take_fault()?;
        self.model()?.resolve(tab_id)?;

        let code = details.code.filter(|code| !code.is_empty());
        let source = match (code, details.file) {
            (Some(code), _) => code,
            (None, Some(file)) => {
                let loader = self
                    .resources()
                    .ok_or_else(|| HostError::new(format!("Could not load file: '{file}'.")))?;
                loader
                    .load(&file)
                    .await
                    .map_err(|e| HostError::new(e.to_string()))?
            }
            (None, None) => return Err(HostError::new("No source code or file specified.")),
        };

        let evaluator = self.evaluator();
        let completion = tokio::task::spawn_blocking(move || evaluator.evaluate(&source))
            .await
            .map_err(|e| HostError::new(e.to_string()))?
            .map_err(|e| HostError::new(e.to_string()))?;
        Ok(vec![completion])
    }

    /// Mark a page loaded and tell everyone who observes loads.
    fn finish_load(&self, id: TabId, navigated: Option<String>) {
        let tab = match self.model() {
            Ok(mut model) => match model.page_mut(id) {
                Ok(page) => {
                    page.status = TabStatus::Complete;
                    let page = page.clone();
                    model.tab(&page)
                }
                Err(_) => return,
            },
            Err(_) => return,
        };

        let change = ChangeInfo {
            status: Some(TabStatus::Complete),
            url: navigated,
            ..ChangeInfo::default()
        };
        self.events.emit(id, &change, &tab);

        if let Some(agent) = self.agent(id) {
            agent.ready_state_changed(ReadyState::Interactive);
            agent.ready_state_changed(ReadyState::Complete);
        }
    }

    fn agent(&self, id: TabId) -> Option<Arc<Agent>> {
        self.agents
            .lock()
            .ok()
            .and_then(|agents| agents.get(&id).map(|slot| Arc::clone(&slot.agent)))
    }

    /// Inject an agent into page `id`. Needs a tokio runtime to serve its
    /// inbox; without one the page simply has no agent.
    fn attach_agent(self: &Arc<Self>, id: TabId) {
        let Ok(runtime) = Handle::try_current() else {
            debug!(tab_id = id, "No runtime; page left without an agent");
            return;
        };

        let port = Arc::new(PagePort {
            state: Arc::downgrade(self),
            tab_id: id,
        });
        let mut agent = Agent::new(port, self.evaluator());
        if let Some(loader) = self.resources() {
            agent = agent.with_resources(loader);
        }
        let agent = Arc::new(agent);

        let (inbox, rx) = mpsc::unbounded_channel();
        let serving = Arc::clone(&agent);
        runtime.spawn(async move { serving.run(rx).await });

        if let Ok(mut agents) = self.agents.lock() {
            agents.insert(id, AgentSlot { agent, inbox });
        }
    }

    fn detach_agent(&self, id: TabId) -> bool {
        self.agents
            .lock()
            .map(|mut agents| agents.remove(&id).is_some())
            .unwrap_or(false)
    }

    /// Hand a message to page `target`'s agent. A page without an agent
    /// swallows it.
    fn dispatch(&self, target: TabId, message: BridgeMessage) -> Result<(), HostError> {
        self.take_fault()?;
        self.model()?.page(target)?;

        let inbox = self
            .agents
            .lock()
            .ok()
            .and_then(|agents| agents.get(&target).map(|slot| slot.inbox.clone()));
        match inbox {
            Some(inbox) => {
                if inbox.send(message).is_err() {
                    debug!(tab_id = target, "Agent gone; message lost");
                }
            }
            None => debug!(tab_id = target, name = %message.name, "No agent in page; message lost"),
        }
        Ok(())
    }

    /// Deliver a message from page `source`'s agent to every listener.
    fn deliver_inbound(&self, source: TabId, message: BridgeMessage) {
        let Ok(source) = self.page_info(source) else {
            return;
        };
        let Ok(mut sinks) = self.sinks.lock() else {
            return;
        };
        // A sink whose dispatcher is gone is forgotten.
        sinks.retain(|sink| {
            sink.send(InboundMessage {
                source: source.clone(),
                message: message.clone(),
            })
            .is_ok()
        });
    }

    fn set_last_error(&self, message: Option<String>) {
        if let Ok(mut slots) = self.last_error.lock() {
            let thread = std::thread::current().id();
            match message {
                Some(message) => slots.insert(thread, message),
                None => slots.remove(&thread),
            };
        }
    }

    fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .ok()
            .and_then(|slots| slots.get(&std::thread::current().id()).cloned())
    }
}

/// How a page's agent reaches the extension.
struct PagePort {
    state: Weak<SimState>,
    tab_id: TabId,
}

impl AgentPort for PagePort {
    fn dispatch_message(&self, message: BridgeMessage) {
        if let Some(state) = self.state.upgrade() {
            state.deliver_inbound(self.tab_id, message);
        }
    }
}

/// An in-memory browser.
///
/// Clones share the same browser.
#[derive(Clone)]
pub struct SimBrowser {
    state: Arc<SimState>,
}

impl Default for SimBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBrowser {
    /// A browser with one focused, empty, normal window.
    pub fn new() -> Self {
        let mut model = Model::new();
        model.add_window(false);
        Self {
            state: Arc::new(SimState {
                model: Mutex::new(model),
                fault: Mutex::new(None),
                last_error: Mutex::new(HashMap::new()),
                events: ListenerSet::new(),
                sinks: Mutex::new(Vec::new()),
                agents: Mutex::new(HashMap::new()),
                evaluator: Mutex::new(Arc::new(QuickJsEvaluator::new())),
                resources: Mutex::new(None),
            }),
        }
    }

    /// Evaluate scripts with `evaluator` in pages opened from now on.
    pub fn with_evaluator(self, evaluator: Arc<dyn ScriptEvaluator>) -> Self {
        if let Ok(mut slot) = self.state.evaluator.lock() {
            *slot = evaluator;
        }
        self
    }

    /// Serve `file` script references from `loader` in pages opened from now on.
    pub fn with_resources(self, loader: Arc<dyn ResourceLoader>) -> Self {
        if let Ok(mut slot) = self.state.resources.lock() {
            *slot = Some(loader);
        }
        self
    }

    /// Open a new window and focus it.
    pub fn open_window(&self, private: bool) -> Result<WindowId, HostError> {
        Ok(self.state.model()?.add_window(private))
    }

    pub fn focus_window(&self, id: WindowId) -> Result<(), HostError> {
        let mut model = self.state.model()?;
        model.window(id)?;
        model.focused = Some(id);
        Ok(())
    }

    /// Open `url` in the focused window, in the foreground.
    pub fn open(&self, url: &str) -> Result<TabId, HostError> {
        self.state.open(&OpenTab {
            window_id: None,
            index: None,
            url: Some(url.to_string()),
            visibility: Visibility::Foreground,
        })
    }

    pub fn set_title(&self, id: TabId, title: &str) -> Result<(), HostError> {
        self.state.model()?.page_mut(id)?.title = Some(title.to_string());
        Ok(())
    }

    pub fn set_pinned(&self, id: TabId, pinned: bool) -> Result<(), HostError> {
        self.state.model()?.page_mut(id)?.pinned = pinned;
        Ok(())
    }

    /// Reload a page: its load completes again.
    pub fn reload(&self, id: TabId) -> Result<(), HostError> {
        self.state.model()?.page_mut(id)?.status = TabStatus::Loading;
        self.state.finish_load(id, None);
        Ok(())
    }

    /// Remove a page's agent, as if it crashed or was never injected.
    /// Requests sent to it afterwards are never answered.
    pub fn detach_agent(&self, id: TabId) -> bool {
        self.state.detach_agent(id)
    }

    pub fn has_agent(&self, id: TabId) -> bool {
        self.state.agent(id).is_some()
    }

    /// Fail the next host call with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        if let Ok(mut fault) = self.state.fault.lock() {
            *fault = Some(message.into());
        }
    }

    /// The current state of a tab.
    pub fn tab(&self, id: TabId) -> Option<Tab> {
        self.state.tab(id).ok()
    }

    pub fn tab_count(&self) -> usize {
        self.state.model().map(|m| m.pages.len()).unwrap_or(0)
    }

    pub fn promise_host(&self) -> Arc<dyn PromiseTabsHost> {
        Arc::new(SimPromiseHost::new(Arc::clone(&self.state)))
    }

    pub fn callback_host(&self) -> Arc<dyn CallbackTabsHost> {
        Arc::new(SimCallbackHost::new(Arc::clone(&self.state)))
    }

    pub fn messaging_host(&self) -> Arc<dyn MessagingHost> {
        Arc::new(SimMessagingHost::new(Arc::clone(&self.state)))
    }

    /// An environment exposing only the binding for `model`.
    pub fn environment(&self, model: HostModel) -> Environment {
        let env = Environment::empty();
        match model {
            HostModel::PromiseNative => env.with_promise_host(self.promise_host()),
            HostModel::CallbackWithLastError => env.with_callback_host(self.callback_host()),
            HostModel::MessagePassingOnly => env.with_messaging_host(self.messaging_host()),
        }
    }
}
