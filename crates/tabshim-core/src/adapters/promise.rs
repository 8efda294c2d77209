//! Adapter for hosts whose tab calls already return deferred results.

use std::sync::Arc;

use serde_json::Value;

use super::TabsApi;
use crate::Deferred;
use crate::event::UpdateEvent;
use crate::host::{HostModel, PromiseTabsHost};
use crate::normalize::{STANDARD_FIELDS, normalize, normalize_all};
use crate::tab::{CreateProperties, QueryInfo, ScriptDetails, Tab, TabId, TabIds, UpdateProperties};

/// Straight delegation, with tab results normalized.
pub struct PromiseTabs {
    host: Arc<dyn PromiseTabsHost>,
}

impl PromiseTabs {
    pub fn new(host: Arc<dyn PromiseTabsHost>) -> Self {
        Self { host }
    }
}

impl TabsApi for PromiseTabs {
    fn model(&self) -> HostModel {
        HostModel::PromiseNative
    }

    fn create(&self, props: CreateProperties) -> Deferred<Tab> {
        let host = Arc::clone(&self.host);
        Box::pin(async move {
            let raw = host.create(&props).await?;
            normalize(&raw, &STANDARD_FIELDS)
        })
    }

    fn execute_script(
        &self,
        tab_id: Option<TabId>,
        details: ScriptDetails,
    ) -> Deferred<Vec<Value>> {
        let host = Arc::clone(&self.host);
        Box::pin(async move { Ok(host.execute_script(tab_id, &details).await?) })
    }

    fn remove(&self, tab_ids: TabIds) -> Deferred<()> {
        let host = Arc::clone(&self.host);
        Box::pin(async move { Ok(host.remove(&tab_ids).await?) })
    }

    fn update(&self, tab_id: Option<TabId>, props: UpdateProperties) -> Deferred<Tab> {
        let host = Arc::clone(&self.host);
        Box::pin(async move {
            let raw = host.update(tab_id, &props).await?;
            normalize(&raw, &STANDARD_FIELDS)
        })
    }

    fn query(&self, info: QueryInfo) -> Deferred<Vec<Tab>> {
        let host = Arc::clone(&self.host);
        Box::pin(async move {
            let raws = host.query(&info).await?;
            normalize_all(&raws, &STANDARD_FIELDS)
        })
    }

    fn on_updated(&self) -> &dyn UpdateEvent {
        self.host.on_updated()
    }
}
