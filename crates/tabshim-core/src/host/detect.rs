//! Host detection — which of the three host models is present.

use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};

use super::Environment;

/// The host model in use. Computed once, read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostModel {
    /// Tab calls return deferred results.
    PromiseNative,
    /// Tab calls complete through a callback plus a last-error slot.
    CallbackWithLastError,
    /// No tab API; an injected agent is driven over message passing.
    MessagePassingOnly,
}

impl HostModel {
    /// Detection order. The message-passing binding goes first: where it is
    /// present no native promise or callback API exists.
    pub const DETECTION_ORDER: [HostModel; 3] = [
        HostModel::MessagePassingOnly,
        HostModel::PromiseNative,
        HostModel::CallbackWithLastError,
    ];
}

impl fmt::Display for HostModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostModel::PromiseNative => write!(f, "promise"),
            HostModel::CallbackWithLastError => write!(f, "callback"),
            HostModel::MessagePassingOnly => write!(f, "message"),
        }
    }
}

/// Which host model to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostPreference {
    /// Use whatever is detected.
    #[default]
    Auto,
    /// Use exactly this model, or nothing if its binding is absent.
    Force(HostModel),
}

impl FromStr for HostPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(HostPreference::Auto),
            "promise" => Ok(HostPreference::Force(HostModel::PromiseNative)),
            "callback" => Ok(HostPreference::Force(HostModel::CallbackWithLastError)),
            "message" => Ok(HostPreference::Force(HostModel::MessagePassingOnly)),
            other => Err(format!("unknown host preference {other:?}")),
        }
    }
}

impl fmt::Display for HostPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostPreference::Auto => write!(f, "auto"),
            HostPreference::Force(model) => fmt::Display::fmt(model, f),
        }
    }
}

/// Inspect the environment's bindings. Pure: same environment, same answer.
pub fn detect(env: &Environment) -> Option<HostModel> {
    HostModel::DETECTION_ORDER
        .into_iter()
        .find(|model| env.has(*model))
}

/// Detect under a preference, logging the outcome.
pub fn select(preference: HostPreference, env: &Environment) -> Option<HostModel> {
    let selected = match preference {
        HostPreference::Auto => detect(env),
        HostPreference::Force(model) => env.has(model).then_some(model),
    };
    match selected {
        Some(model) => info!(host = %model, preference = %preference, "Tab host detected"),
        None => warn!(preference = %preference, ?env, "No tab host detected"),
    }
    selected
}
