//! A simulated browser with the public API bound to one host model.

use std::path::{Path, PathBuf};

use tabshim_config::AppConfig;
use tabshim_core::bridge::loader_from_config;
use tabshim_core::sim::SimBrowser;
use tabshim_core::{HostModel, Tabs};
use tempfile::TempDir;

/// A test-scoped browser whose resource root is an owned temp directory.
///
/// The directory is deleted when this value is dropped, even on panic.
/// Must be built inside a tokio runtime so pages get agents.
pub struct TestBrowser {
    pub browser: SimBrowser,
    pub tabs: Tabs,
    pub config: AppConfig,
    pub config_path: PathBuf,
    temp_dir: TempDir,
}

impl TestBrowser {
    /// Bind to `model` with default configuration.
    pub async fn new(model: HostModel) -> Self {
        Self::with_toml(model, "").await
    }

    /// Bind to `model` with configuration loaded from `toml_content`.
    ///
    /// Unless the TOML has an `[agent]` section, the resource root is
    /// pointed at the temp directory.
    pub async fn with_toml(model: HostModel, toml_content: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let config_path = temp_dir.path().join("tabshim.toml");

        let mut content = toml_content.to_string();
        if !content.contains("[agent]") {
            content.push_str(&format!(
                "\n[agent]\nresource_root = {:?}\n",
                temp_dir.path().display().to_string()
            ));
        }
        tokio::fs::write(&config_path, content)
            .await
            .expect("failed to write test config");

        let config = AppConfig::load(&config_path)
            .await
            .expect("failed to parse test config");
        let loader = loader_from_config(&config.agent).expect("failed to build resource loader");

        let browser = SimBrowser::new().with_resources(loader);
        let tabs = Tabs::new(&browser.environment(model), &config).expect("failed to bind host");

        Self {
            browser,
            tabs,
            config,
            config_path,
            temp_dir,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a script under the resource root; returns its `/`-rooted path.
    pub async fn write_script(&self, name: &str, source: &str) -> String {
        let path = self.root().join(name.trim_start_matches('/'));
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .expect("failed to create script dir");
        }
        tokio::fs::write(&path, source)
            .await
            .expect("failed to write script");
        format!("/{}", name.trim_start_matches('/'))
    }
}
