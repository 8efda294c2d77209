//! Host adapters — one implementation of [`TabsApi`] per host model.
//!
//! ```text
//!                    ┌────────────┐
//!   Tabs facade ────▶│  TabsApi   │  (trait)
//!                    └─────┬──────┘
//!          ┌───────────────┼────────────────┐
//!          ▼               ▼                ▼
//!   ┌─────────────┐ ┌──────────────┐ ┌──────────────────┐
//!   │ PromiseTabs │ │ CallbackTabs │ │ MessagePassing-  │
//!   │ (delegate)  │ │ (lastError → │ │ Tabs (agent      │
//!   │             │ │  rejection)  │ │  bridge)         │
//!   └─────────────┘ └──────────────┘ └──────────────────┘
//! ```
//!
//! Call sites only ever see the trait; none of them branch on host identity.

pub mod callback;
pub mod deferred;
pub mod message;
pub mod promise;

use std::sync::Arc;

use serde_json::Value;

use tabshim_config::BridgeConfig;

use crate::Deferred;
use crate::error::TabsError;
use crate::event::UpdateEvent;
use crate::host::{Environment, HostModel};
use crate::tab::{CreateProperties, QueryInfo, ScriptDetails, Tab, TabId, TabIds, UpdateProperties};

pub use callback::CallbackTabs;
pub use message::MessagePassingTabs;
pub use promise::PromiseTabs;

/// The tab operations, uniform across hosts.
///
/// Every operation returns a deferred immediately. Tab results are already
/// normalized.
pub trait TabsApi: Send + Sync {
    /// The host model this adapter drives.
    fn model(&self) -> HostModel;

    fn create(&self, props: CreateProperties) -> Deferred<Tab>;

    /// Run a script. `details` has already been validated.
    fn execute_script(&self, tab_id: Option<TabId>, details: ScriptDetails)
    -> Deferred<Vec<Value>>;

    fn remove(&self, tab_ids: TabIds) -> Deferred<()>;

    fn update(&self, tab_id: Option<TabId>, props: UpdateProperties) -> Deferred<Tab>;

    fn query(&self, info: QueryInfo) -> Deferred<Vec<Tab>>;

    fn on_updated(&self) -> &dyn UpdateEvent;
}

/// Build the adapter for `model` from the bindings in `env`.
///
/// Fails with [`TabsError::HostNotDetected`] if the binding for `model` is
/// absent.
pub fn create_adapter(
    model: HostModel,
    env: &Environment,
    bridge: &BridgeConfig,
) -> Result<Arc<dyn TabsApi>, TabsError> {
    match model {
        HostModel::PromiseNative => {
            let host = env.promise_host().ok_or(TabsError::HostNotDetected)?;
            Ok(Arc::new(PromiseTabs::new(Arc::clone(host))))
        }
        HostModel::CallbackWithLastError => {
            let host = env.callback_host().ok_or(TabsError::HostNotDetected)?;
            Ok(Arc::new(CallbackTabs::new(Arc::clone(host))))
        }
        HostModel::MessagePassingOnly => {
            let host = env.messaging_host().ok_or(TabsError::HostNotDetected)?;
            Ok(Arc::new(MessagePassingTabs::new(Arc::clone(host), bridge)?))
        }
    }
}

/// A deferred that has already failed.
pub(crate) fn rejected<T: Send + 'static>(err: TabsError) -> Deferred<T> {
    Box::pin(async move { Err(err) })
}
