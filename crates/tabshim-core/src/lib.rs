#![deny(unsafe_code)]

//! tabshim core — one tab API over three incompatible browser hosts.
//!
//! A host either returns deferred results natively, completes through a
//! callback plus a last-error slot, or has no tab API at all and must drive
//! an agent injected into each page over message passing. [`Tabs`] detects
//! which one is present and exposes `create`, `execute_script`, `remove`,
//! `update`, `query` and `on_updated` uniformly, with every tab normalized to
//! the same [`Tab`] shape.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future — the return type for trait
/// methods that must stay object-safe (`dyn Trait`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A deferred tab-operation result: returned immediately, completed later.
pub type Deferred<T> = BoxFuture<'static, Result<T, error::TabsError>>;

/// Host adapters behind the uniform [`adapters::TabsApi`] trait.
pub mod adapters;
/// The public tab API and its process-wide binding.
pub mod api;
/// Agent bridge: correlated RPC over message passing.
pub mod bridge;
/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
pub mod error;
/// `onUpdated` listener handling.
pub mod event;
/// Host boundaries and detection.
pub mod host;
/// Raw-record to [`Tab`] normalization.
pub mod normalize;
/// Query filtering for hosts without a native `query`.
pub mod query;
/// In-memory browser implementing all three hosts.
pub mod sim;
/// Canonical tab model and option bags.
pub mod tab;

pub use api::{Tabs, global, install};
pub use error::{HostError, TabsError};
pub use event::{UpdateEvent, UpdateListener};
pub use host::{Environment, HostModel, HostPreference};
pub use tab::{
    ChangeInfo, CreateProperties, QueryInfo, ScriptDetails, Tab, TabId, TabIds, TabStatus,
    UpdateProperties,
};
