//! Controller half of the agent bridge.
//!
//! Issues correlated requests to agents and completes them from one shared
//! dispatcher that drains everything the host's agents send back.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tabshim_config::BridgeConfig;

use super::pending::{PendingTable, next_return_id};
use super::wire::{BridgeMessage, READY_STATE_CHANGE, ResponsePayload};
use crate::Deferred;
use crate::error::TabsError;
use crate::event::ListenerSet;
use crate::host::{InboundMessage, MessagingHost};
use crate::normalize::{MESSAGING_FIELDS, normalize};
use crate::tab::{ChangeInfo, TabId, TabStatus};

/// Sends requests to injected agents and hands out their deferred results.
pub struct BridgeController {
    host: Arc<dyn MessagingHost>,
    pending: Arc<PendingTable>,
    listeners: Arc<ListenerSet>,
    request_timeout: Option<Duration>,
}

/// Drains inbound agent messages: completes pending requests and fans
/// lifecycle messages out to `onUpdated` listeners.
pub struct BridgeDispatcher {
    inbound: mpsc::UnboundedReceiver<InboundMessage>,
    pending: Arc<PendingTable>,
    listeners: Arc<ListenerSet>,
}

impl BridgeController {
    /// Attach to `host` and return the controller with its dispatcher.
    ///
    /// The dispatcher must be run (usually spawned) for any request to
    /// complete.
    pub fn new(host: Arc<dyn MessagingHost>, config: &BridgeConfig) -> (Self, BridgeDispatcher) {
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        host.add_message_listener(inbound_tx);

        let pending = Arc::new(PendingTable::new());
        let listeners = Arc::new(ListenerSet::new());

        let controller = Self {
            host,
            pending: Arc::clone(&pending),
            listeners: Arc::clone(&listeners),
            request_timeout: config.request_timeout(),
        };
        let dispatcher = BridgeDispatcher {
            inbound,
            pending,
            listeners,
        };
        (controller, dispatcher)
    }

    /// Ask the agent in `target` (or in the active tab) to run `operation`.
    ///
    /// The request is dispatched before this returns; the deferred completes
    /// whenever the matching response arrives. Without a configured timeout
    /// it waits forever.
    pub fn run_agent_request(
        &self,
        target: Option<TabId>,
        operation: &str,
        args: Vec<Value>,
    ) -> Deferred<Value> {
        let target = match target {
            Some(id) => id,
            None => match self.host.active_tab() {
                Some(page) => page.id,
                None => return Box::pin(async { Err(TabsError::NoActiveTab) }),
            },
        };

        let return_id = next_return_id();
        let completion = self.pending.register(&return_id);

        let request = BridgeMessage::request(operation, args, &return_id);
        if let Err(err) = self.host.dispatch(target, request) {
            self.pending.cancel(&return_id);
            return Box::pin(async move { Err(err.into()) });
        }
        debug!(return_id = %return_id, operation, tab_id = target, "Agent request dispatched");

        let pending = Arc::clone(&self.pending);
        let timeout = self.request_timeout;
        Box::pin(async move {
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, completion).await {
                    Ok(received) => received,
                    Err(_) => {
                        pending.cancel(&return_id);
                        warn!(return_id = %return_id, ?limit, "Agent request timed out");
                        return Err(TabsError::NoResponse {
                            return_id,
                            elapsed: limit,
                        });
                    }
                },
                None => completion.await,
            };
            outcome.map_err(|_| TabsError::BridgeClosed)?
        })
    }

    /// The synthetic `onUpdated` listener set.
    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    pub fn host(&self) -> &Arc<dyn MessagingHost> {
        &self.host
    }

    /// Number of requests still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop every outstanding request; their deferreds fail with
    /// [`TabsError::BridgeClosed`].
    pub fn close(&self) -> usize {
        self.pending.close_all()
    }
}

impl BridgeDispatcher {
    /// Run until every inbound sender is gone.
    pub async fn run(mut self) {
        info!("Agent bridge dispatcher started");

        while let Some(inbound) = self.inbound.recv().await {
            self.handle(inbound);
        }

        let dropped = self.pending.close_all();
        info!(dropped, "Agent bridge dispatcher stopped");
    }

    /// Route one inbound message.
    pub fn handle(&self, inbound: InboundMessage) {
        let InboundMessage { source, message } = inbound;

        if message.name == READY_STATE_CHANGE {
            if !message.is_ready_complete() {
                return;
            }
            match normalize(&source.to_raw(), &MESSAGING_FIELDS) {
                Ok(tab) => {
                    let delivered = self.listeners.emit(
                        source.id,
                        &ChangeInfo::status(TabStatus::Complete),
                        &tab,
                    );
                    debug!(tab_id = source.id, delivered, "Page load complete");
                }
                Err(err) => warn!(tab_id = source.id, %err, "Unusable lifecycle source"),
            }
            return;
        }

        if !self.pending.contains(&message.name) {
            // Stale, duplicate, or addressed to some other listener.
            debug!(name = %message.name, tab_id = source.id, "Dropping unmatched bridge message");
            return;
        }

        let outcome = serde_json::from_value::<ResponsePayload>(message.message)
            .map_err(TabsError::from)
            .and_then(|payload| payload.into_result().map_err(TabsError::Remote));
        if let Err(err) = &outcome {
            debug!(return_id = %message.name, %err, "Agent request failed");
        }
        self.pending.complete(&message.name, outcome);
    }
}
