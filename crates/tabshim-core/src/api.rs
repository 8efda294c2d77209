//! The public tab API: one entry point, whichever host is present.

use std::sync::{Arc, OnceLock};

use serde_json::Value;
use tracing::debug;

use tabshim_config::AppConfig;

use crate::Deferred;
use crate::adapters::{TabsApi, create_adapter, rejected};
use crate::error::TabsError;
use crate::event::UpdateEvent;
use crate::host::{Environment, HostModel, HostPreference, select};
use crate::tab::{CreateProperties, QueryInfo, ScriptDetails, Tab, TabId, TabIds, UpdateProperties};

/// Tab operations bound to the host detected at construction.
///
/// If no host was detected every operation fails fast with
/// [`TabsError::HostNotDetected`].
#[derive(Clone)]
pub struct Tabs {
    adapter: Option<Arc<dyn TabsApi>>,
}

impl Tabs {
    /// Detect the host in `env` under the configured preference and bind to it.
    ///
    /// Errors only if the detected host cannot be driven (e.g. the
    /// message-passing host outside a tokio runtime).
    pub fn new(env: &Environment, config: &AppConfig) -> Result<Self, TabsError> {
        let preference: HostPreference = config
            .host
            .preference
            .parse()
            .map_err(TabsError::Usage)?;
        let adapter = match select(preference, env) {
            Some(model) => Some(create_adapter(model, env, &config.bridge)?),
            None => None,
        };
        Ok(Self { adapter })
    }

    /// Bind directly to an adapter.
    pub fn with_adapter(adapter: Arc<dyn TabsApi>) -> Self {
        Self {
            adapter: Some(adapter),
        }
    }

    /// The host model in use, if any.
    pub fn model(&self) -> Option<HostModel> {
        self.adapter.as_ref().map(|a| a.model())
    }

    fn adapter(&self) -> Result<&Arc<dyn TabsApi>, TabsError> {
        self.adapter.as_ref().ok_or(TabsError::HostNotDetected)
    }

    /// Open a new tab.
    pub fn create(&self, props: CreateProperties) -> Deferred<Tab> {
        match self.adapter() {
            Ok(adapter) => adapter.create(props),
            Err(err) => rejected(err),
        }
    }

    /// Run a script in `tab_id`, or in the active tab of the current window.
    ///
    /// A `file` reference that is not rooted at `/` is refused here, before
    /// the host sees anything; so is a call with no host at all.
    pub fn execute_script(
        &self,
        tab_id: Option<TabId>,
        details: ScriptDetails,
    ) -> Result<Deferred<Vec<Value>>, TabsError> {
        details.validate()?;
        let adapter = self.adapter()?;
        debug!(?tab_id, host = %adapter.model(), "executeScript");
        Ok(adapter.execute_script(tab_id, details))
    }

    pub fn remove(&self, tab_ids: impl Into<TabIds>) -> Deferred<()> {
        match self.adapter() {
            Ok(adapter) => adapter.remove(tab_ids.into()),
            Err(err) => rejected(err),
        }
    }

    /// Update `tab_id`, or the active tab of the current window.
    pub fn update(&self, tab_id: Option<TabId>, props: UpdateProperties) -> Deferred<Tab> {
        match self.adapter() {
            Ok(adapter) => adapter.update(tab_id, props),
            Err(err) => rejected(err),
        }
    }

    pub fn query(&self, info: QueryInfo) -> Deferred<Vec<Tab>> {
        match self.adapter() {
            Ok(adapter) => adapter.query(info),
            Err(err) => rejected(err),
        }
    }

    /// The tab-updated event of the active host.
    pub fn on_updated(&self) -> Result<&dyn UpdateEvent, TabsError> {
        Ok(self.adapter()?.on_updated())
    }
}

static INSTALLED: OnceLock<Tabs> = OnceLock::new();

/// Detect the host once for the whole process.
///
/// The first successful call wins; later calls return the same binding and
/// ignore their arguments.
pub fn install(env: &Environment, config: &AppConfig) -> Result<&'static Tabs, TabsError> {
    if let Some(tabs) = INSTALLED.get() {
        return Ok(tabs);
    }
    let tabs = Tabs::new(env, config)?;
    Ok(INSTALLED.get_or_init(|| tabs))
}

/// The process-wide binding, if [`install`] has run.
pub fn global() -> Option<&'static Tabs> {
    INSTALLED.get()
}
