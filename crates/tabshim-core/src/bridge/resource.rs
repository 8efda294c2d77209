//! Loading script files relative to the extension's base resource root.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use reqwest::{Client, Url};
use tracing::debug;

use tabshim_config::AgentConfig;

use super::wire::SerializedError;
use crate::BoxFuture;

/// Errors an agent hits outside script evaluation.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("invalid resource root {root:?}: {reason}")]
    InvalidRoot { root: String, reason: String },

    #[error("resource path escapes the resource root: {0}")]
    PathEscape(String),

    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("failed to read resource: {0}")]
    Io(#[from] std::io::Error),

    #[error("file references are not supported by this agent")]
    NoResourceLoader,
}

impl From<AgentError> for SerializedError {
    fn from(err: AgentError) -> Self {
        let name = match err {
            AgentError::Fetch { .. } | AgentError::Io(_) => "NetworkError",
            _ => "Error",
        };
        SerializedError::new(name, err.to_string())
    }
}

/// Fetches script text by absolute path (`/scripts/a.js`).
pub trait ResourceLoader: Send + Sync {
    fn load<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<String, AgentError>>;
}

/// Fetches resources over HTTP(S) from a base URL.
pub struct HttpResourceLoader {
    client: Client,
    base: Url,
}

impl HttpResourceLoader {
    pub fn new(base: &str) -> Result<Self, AgentError> {
        let mut base = Url::parse(base).map_err(|e| AgentError::InvalidRoot {
            root: base.to_string(),
            reason: e.to_string(),
        })?;
        // Without a trailing slash `join` would replace the last segment.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base,
        })
    }

    /// The absolute URL for a resource path.
    ///
    /// The result always shares the base's origin and lies under its path.
    pub fn resolve(&self, path: &str) -> Result<Url, AgentError> {
        let escape = || AgentError::PathEscape(path.to_string());
        let url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|_| escape())?;
        if url.origin() != self.base.origin() || !url.path().starts_with(self.base.path()) {
            return Err(escape());
        }
        Ok(url)
    }
}

impl ResourceLoader for HttpResourceLoader {
    fn load<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<String, AgentError>> {
        Box::pin(async move {
            let url = self.resolve(path)?;
            debug!(%url, "Fetching script resource");

            let fetch_error = |e: reqwest::Error| AgentError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            };
            let resp = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(fetch_error)?;
            let resp = resp.error_for_status().map_err(fetch_error)?;
            resp.text().await.map_err(fetch_error)
        })
    }
}

/// Reads resources from a local directory.
pub struct DirResourceLoader {
    root: PathBuf,
}

impl DirResourceLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The file a resource path maps to. `..` segments are refused.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, AgentError> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(AgentError::PathEscape(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl ResourceLoader for DirResourceLoader {
    fn load<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<String, AgentError>> {
        Box::pin(async move {
            let file = self.resolve(path)?;
            debug!(path = %file.display(), "Reading script resource");
            Ok(tokio::fs::read_to_string(&file).await?)
        })
    }
}

/// Build the loader the agent config asks for.
pub fn loader_from_config(config: &AgentConfig) -> Result<Arc<dyn ResourceLoader>, AgentError> {
    if config.is_remote_root() {
        Ok(Arc::new(HttpResourceLoader::new(&config.resource_root)?))
    } else {
        Ok(Arc::new(DirResourceLoader::new(&config.resource_root)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_http_paths_resolve_under_root() {
        let loader = HttpResourceLoader::new("https://ext.test/assets").unwrap();
        assert_eq!(
            loader.resolve("/scripts/a.js").unwrap().as_str(),
            "https://ext.test/assets/scripts/a.js"
        );

        let loader = HttpResourceLoader::new("https://ext.test/").unwrap();
        assert_eq!(
            loader.resolve("/a.js").unwrap().as_str(),
            "https://ext.test/a.js"
        );
    }

    #[test]
    fn test_http_paths_cannot_leave_root() {
        let loader = HttpResourceLoader::new("https://ext.test/assets/").unwrap();
        for path in [
            "/https://evil.test/payload.js",
            "/http://ext.test/assets/a.js",
            "/../x.js",
            "/scripts/../../x.js",
            "/%2e%2e/x.js",
            "/javascript:alert(1)",
        ] {
            assert!(
                matches!(loader.resolve(path), Err(AgentError::PathEscape(_))),
                "{path} resolved to {:?}",
                loader.resolve(path)
            );
        }
        assert_eq!(
            loader.resolve("/scripts/../a.js").unwrap().as_str(),
            "https://ext.test/assets/a.js"
        );
        // Extra leading slashes never turn a path into a host.
        assert_eq!(
            loader.resolve("//evil.test/x.js").unwrap().as_str(),
            "https://ext.test/assets/evil.test/x.js"
        );
    }

    #[tokio::test]
    async fn test_http_loader_refuses_foreign_origin_before_fetching() {
        let loader = HttpResourceLoader::new("http://127.0.0.1:9/").unwrap();
        assert!(matches!(
            loader.load("/https://evil.test/payload.js").await,
            Err(AgentError::PathEscape(_))
        ));
    }

    #[test]
    fn test_invalid_http_root() {
        assert!(matches!(
            HttpResourceLoader::new("not a url"),
            Err(AgentError::InvalidRoot { .. })
        ));
    }

    #[test]
    fn test_dir_refuses_parent_segments() {
        let loader = DirResourceLoader::new("/srv/ext");
        assert_eq!(
            loader.resolve("/scripts/a.js").unwrap(),
            PathBuf::from("/srv/ext/scripts/a.js")
        );
        assert!(matches!(
            loader.resolve("/../etc/passwd"),
            Err(AgentError::PathEscape(_))
        ));
    }

    #[tokio::test]
    async fn test_dir_loader_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("scripts")).unwrap();
        std::fs::write(dir.path().join("scripts/title.js"), "document.title").unwrap();

        let loader = DirResourceLoader::new(dir.path());
        assert_eq!(
            loader.load("/scripts/title.js").await.unwrap(),
            "document.title"
        );
        assert!(matches!(
            loader.load("/scripts/missing.js").await,
            Err(AgentError::Io(_))
        ));
    }

    #[test]
    fn test_loader_from_config() {
        let remote = AgentConfig {
            resource_root: "http://localhost:8080/".to_string(),
            ..AgentConfig::default()
        };
        assert!(loader_from_config(&remote).is_ok());

        let local = AgentConfig {
            resource_root: "./ext".to_string(),
            ..AgentConfig::default()
        };
        assert!(loader_from_config(&local).is_ok());
    }

    #[test]
    fn test_agent_errors_serialize_for_the_wire() {
        let err: SerializedError = AgentError::NoResourceLoader.into();
        assert_eq!(err.name.as_deref(), Some("Error"));
        assert_eq!(err.message, "file references are not supported by this agent");
    }
}
