//! Error types shared by every host adapter.

use std::time::Duration;

use crate::bridge::wire::SerializedError;

/// Errors surfaced by the public tab operations.
///
/// Host- and agent-reported failures are carried through verbatim; nothing
/// in the adapters swallows them.
#[derive(Debug, thiserror::Error)]
pub enum TabsError {
    /// No known host binding was present when the environment was inspected.
    #[error("host not detected: no tab API binding is available")]
    HostNotDetected,

    /// The caller passed arguments the operation can never accept.
    #[error("usage error: {0}")]
    Usage(String),

    /// The host reported a failure (rejected call or last-error slot).
    #[error("{0}")]
    Host(String),

    /// Evaluation inside the injected agent raised.
    #[error("{0}")]
    Remote(SerializedError),

    /// A host returned a tab record without one of the unconditional fields.
    #[error("malformed tab record: missing or invalid field {0:?}")]
    MalformedTab(&'static str),

    /// No explicit target was given and the host has no active tab.
    #[error("no active tab in the active window")]
    NoActiveTab,

    /// The callback host dropped the completion callback without calling it.
    #[error("host dropped the completion callback")]
    CallbackDropped,

    /// The bridge dispatcher stopped before the response arrived.
    #[error("agent bridge closed before a response arrived")]
    BridgeClosed,

    /// The configured request timeout elapsed.
    #[error("no response from agent for {return_id} after {elapsed:?}")]
    NoResponse { return_id: String, elapsed: Duration },

    /// The message-passing adapter needs a tokio runtime for its dispatcher.
    #[error("no async runtime available to run the agent bridge")]
    NoRuntime,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<SerializedError> for TabsError {
    fn from(err: SerializedError) -> Self {
        TabsError::Remote(err)
    }
}

/// A failure reported by a host boundary implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<HostError> for TabsError {
    fn from(err: HostError) -> Self {
        TabsError::Host(err.0)
    }
}
