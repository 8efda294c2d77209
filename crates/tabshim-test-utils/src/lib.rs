#![deny(unsafe_code)]

//! Shared test utilities for the tabshim workspace.
//!
//! Provides config builders, raw-tab fixtures, a browser harness bound to
//! any host model, a scripted message-passing host, and tracing helpers.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! tabshim-test-utils = { workspace = true }
//! ```

pub mod browser;
pub mod config;
pub mod fixtures;
pub mod scripted;
pub mod tracing_setup;
