//! `onUpdated` subscription — listeners compared by identity.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::tab::{ChangeInfo, Tab, TabId};

type ListenerFn = dyn Fn(TabId, &ChangeInfo, &Tab) + Send + Sync;

/// A tab-updated callback.
///
/// Clones share identity: `has_listener` / `remove_listener` find a listener
/// by the allocation it was created from, not by behaviour.
#[derive(Clone)]
pub struct UpdateListener(Arc<ListenerFn>);

impl UpdateListener {
    pub fn new(f: impl Fn(TabId, &ChangeInfo, &Tab) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Invoke the callback.
    pub fn call(&self, tab_id: TabId, change: &ChangeInfo, tab: &Tab) {
        (self.0)(tab_id, change, tab)
    }

    /// Whether `other` is a clone of this listener.
    pub fn same(&self, other: &UpdateListener) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for UpdateListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UpdateListener")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

/// A subscribable tab-updated event.
pub trait UpdateEvent: Send + Sync {
    fn add_listener(&self, listener: UpdateListener);

    fn has_listener(&self, listener: &UpdateListener) -> bool;

    fn remove_listener(&self, listener: &UpdateListener);
}

/// An in-process listener set, for hosts without a native update event.
#[derive(Default)]
pub struct ListenerSet {
    listeners: Mutex<Vec<UpdateListener>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one change to every current listener.
    ///
    /// Listeners are snapshotted first so a callback may add or remove
    /// listeners without deadlocking.
    pub fn emit(&self, tab_id: TabId, change: &ChangeInfo, tab: &Tab) -> usize {
        let snapshot = self
            .listeners
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default();
        for listener in &snapshot {
            listener.call(tab_id, change, tab);
        }
        snapshot.len()
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UpdateEvent for ListenerSet {
    fn add_listener(&self, listener: UpdateListener) {
        if let Ok(mut listeners) = self.listeners.lock() {
            if !listeners.iter().any(|l| l.same(&listener)) {
                listeners.push(listener);
            }
        }
    }

    fn has_listener(&self, listener: &UpdateListener) -> bool {
        self.listeners
            .lock()
            .map(|l| l.iter().any(|existing| existing.same(listener)))
            .unwrap_or(false)
    }

    fn remove_listener(&self, listener: &UpdateListener) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.retain(|existing| !existing.same(listener));
        }
    }
}
