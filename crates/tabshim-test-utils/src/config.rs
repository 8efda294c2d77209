//! Configuration builders for tests.

use tabshim_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .host_preference("message")
///     .request_timeout_secs(2)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn host_preference(mut self, preference: &str) -> Self {
        self.config.host.preference = preference.to_string();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.bridge.request_timeout_secs = secs;
        self
    }

    pub fn memory_limit_bytes(mut self, bytes: usize) -> Self {
        self.config.agent.memory_limit_bytes = bytes;
        self
    }

    pub fn resource_root(mut self, root: &str) -> Self {
        self.config.agent.resource_root = root.to_string();
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
