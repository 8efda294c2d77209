//! Adapter for hosts that complete through a callback and a last-error slot.

use std::sync::Arc;

use serde_json::Value;

use super::TabsApi;
use super::deferred::adapt;
use crate::Deferred;
use crate::event::UpdateEvent;
use crate::host::{CallbackTabsHost, HostModel};
use crate::normalize::{STANDARD_FIELDS, normalize, normalize_all, raw_from_value, raws_from_value};
use crate::tab::{CreateProperties, QueryInfo, ScriptDetails, Tab, TabId, TabIds, UpdateProperties};

pub struct CallbackTabs {
    host: Arc<dyn CallbackTabsHost>,
}

impl CallbackTabs {
    pub fn new(host: Arc<dyn CallbackTabsHost>) -> Self {
        Self { host }
    }
}

impl TabsApi for CallbackTabs {
    fn model(&self) -> HostModel {
        HostModel::CallbackWithLastError
    }

    fn create(&self, props: CreateProperties) -> Deferred<Tab> {
        let pending = adapt(&self.host, |host, cb| host.create(&props, cb));
        Box::pin(async move {
            let raw = raw_from_value(pending.await?)?;
            normalize(&raw, &STANDARD_FIELDS)
        })
    }

    fn execute_script(
        &self,
        tab_id: Option<TabId>,
        details: ScriptDetails,
    ) -> Deferred<Vec<Value>> {
        let pending = adapt(&self.host, |host, cb| host.execute_script(tab_id, &details, cb));
        Box::pin(async move {
            match pending.await? {
                Value::Array(results) => Ok(results),
                Value::Null => Ok(Vec::new()),
                single => Ok(vec![single]),
            }
        })
    }

    fn remove(&self, tab_ids: TabIds) -> Deferred<()> {
        let pending = adapt(&self.host, |host, cb| host.remove(&tab_ids, cb));
        Box::pin(async move {
            pending.await?;
            Ok(())
        })
    }

    fn update(&self, tab_id: Option<TabId>, props: UpdateProperties) -> Deferred<Tab> {
        let pending = adapt(&self.host, |host, cb| host.update(tab_id, &props, cb));
        Box::pin(async move {
            let raw = raw_from_value(pending.await?)?;
            normalize(&raw, &STANDARD_FIELDS)
        })
    }

    fn query(&self, info: QueryInfo) -> Deferred<Vec<Tab>> {
        let pending = adapt(&self.host, |host, cb| host.query(&info, cb));
        Box::pin(async move {
            let raws = raws_from_value(pending.await?)?;
            normalize_all(&raws, &STANDARD_FIELDS)
        })
    }

    fn on_updated(&self) -> &dyn UpdateEvent {
        self.host.on_updated()
    }
}
