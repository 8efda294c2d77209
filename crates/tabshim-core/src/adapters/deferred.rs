//! Turns the callback + last-error protocol into a deferred result.
//!
//! This is the only code that knows about the last-error slot.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::Deferred;
use crate::error::TabsError;
use crate::host::{Callback, CallbackTabsHost};

/// Call `invoke` with a completion callback and return its outcome.
///
/// When the callback fires, a set last-error slot rejects the deferred with
/// the host's message verbatim; otherwise it resolves with the callback's
/// argument. The slot is read inside the callback, the only window in which
/// the host guarantees it is meaningful.
pub fn adapt<F>(host: &Arc<dyn CallbackTabsHost>, invoke: F) -> Deferred<Value>
where
    F: FnOnce(&dyn CallbackTabsHost, Callback),
{
    let (tx, rx) = oneshot::channel();
    let slot = Arc::clone(host);
    let callback: Callback = Box::new(move |result| {
        let outcome = match slot.last_error() {
            Some(message) => Err(TabsError::Host(message)),
            None => Ok(result),
        };
        let _ = tx.send(outcome);
    });

    invoke(host.as_ref(), callback);

    Box::pin(async move { rx.await.map_err(|_| TabsError::CallbackDropped)? })
}
