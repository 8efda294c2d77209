#![deny(unsafe_code)]

//! Configuration loading and validation for tabshim.
//!
//! Loads TOML configuration files and validates them against expected schemas.
//! Provides the [`AppConfig`] type as the central configuration structure.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host detection configuration.
    #[serde(default)]
    pub host: HostConfig,

    /// Controller-side agent bridge configuration.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Agent-side configuration.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Host detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host model preference: "auto", "promise", "callback", or "message".
    ///
    /// Anything other than "auto" forces that model, provided its binding is
    /// present in the environment.
    #[serde(default = "default_host_preference")]
    pub preference: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            preference: default_host_preference(),
        }
    }
}

fn default_host_preference() -> String {
    "auto".to_string()
}

/// Agent bridge configuration (controller half).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// How long a dispatched request waits for its response, in seconds
    /// (0 = wait forever).
    #[serde(default)]
    pub request_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 0,
        }
    }
}

impl BridgeConfig {
    /// The request timeout, if one is configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

/// Agent configuration (content half).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Base resource root that `file` references are resolved against.
    ///
    /// Either an `http://` / `https://` URL or a local directory path.
    #[serde(default = "default_resource_root")]
    pub resource_root: String,

    /// Heap cap for each script evaluation, in bytes (0 = unlimited).
    #[serde(default)]
    pub memory_limit_bytes: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            resource_root: default_resource_root(),
            memory_limit_bytes: 0,
        }
    }
}

impl AgentConfig {
    /// Whether the resource root names a remote (HTTP) location.
    pub fn is_remote_root(&self) -> bool {
        self.resource_root.starts_with("http://") || self.resource_root.starts_with("https://")
    }

    /// The evaluation heap cap, if one is configured.
    pub fn memory_limit(&self) -> Option<usize> {
        (self.memory_limit_bytes > 0).then_some(self.memory_limit_bytes)
    }
}

fn default_resource_root() -> String {
    "http://localhost/".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Loading configuration");
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_preferences = ["auto", "promise", "callback", "message"];
        if !valid_preferences.contains(&self.host.preference.as_str()) {
            return Err(ConfigError::Validation(format!(
                "host.preference must be one of {:?}, got {:?}",
                valid_preferences, self.host.preference
            )));
        }

        if self.agent.resource_root.is_empty() {
            return Err(ConfigError::Validation(
                "agent.resource_root must not be empty".to_string(),
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }
}
