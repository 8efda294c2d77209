//! Agent bridge — request/response RPC over a fire-and-forget message bus.
//!
//! ```text
//!  controller                                   page agent
//! ┌──────────────────┐  executeScript {args,    ┌──────────────────┐
//! │ BridgeController │──── returnId: return-N } ▶│      Agent       │
//! │   PendingTable   │                           │ ScriptEvaluator  │
//! │ BridgeDispatcher │◀── return-N {returnValue} │ ResourceLoader   │
//! │                  │◀── readystatechange ──────│                  │
//! └──────────────────┘                           └──────────────────┘
//! ```
//!
//! One dispatcher drains all inbound traffic; requests are matched to
//! responses purely by correlation id.

pub mod agent;
pub mod controller;
pub mod eval;
pub mod pending;
pub mod resource;
pub mod wire;

pub use agent::{Agent, AgentPort, ReadyState};
pub use controller::{BridgeController, BridgeDispatcher};
pub use eval::{QuickJsEvaluator, ScriptEvaluator};
pub use pending::{PendingTable, next_return_id};
pub use resource::{
    AgentError, DirResourceLoader, HttpResourceLoader, ResourceLoader, loader_from_config,
};
pub use wire::{BridgeMessage, ResponsePayload, SerializedError};
