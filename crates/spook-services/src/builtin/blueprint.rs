//! `blueprint.import`: import a blueprint from a URL
//!
//! Fetching is delegated to a [`BlueprintSource`] and storage to a
//! [`BlueprintStore`]. Every failure surfaces as a service error with a
//! short user-facing message; the underlying cause is logged.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use spook_core::{Error, Hub, Result};

use crate::schema::{FieldKind, ServiceSchema};
use crate::service::{Service, ServiceCall};

/// Upper bound on fetching a blueprint
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub name: String,
    /// Integration the blueprint targets, e.g. `automation`
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default)]
    pub content: Value,
}

impl Blueprint {
    pub fn update_metadata(&mut self, source_url: &str) {
        self.source_url = Some(source_url.to_string());
    }
}

/// A fetched blueprint and where it would like to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedBlueprint {
    pub blueprint: Blueprint,
    pub suggested_filename: String,
}

#[derive(Error, Debug)]
pub enum BlueprintError {
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Retrieves blueprints from URLs
#[async_trait]
pub trait BlueprintSource: Send + Sync {
    /// `Ok(None)` when the URL is not one this source understands
    async fn fetch(&self, url: &str) -> std::result::Result<Option<ImportedBlueprint>, BlueprintError>;
}

/// Persists blueprints per domain
#[async_trait]
pub trait BlueprintStore: Send + Sync {
    fn supports(&self, domain: &str) -> bool;

    async fn add(
        &self,
        blueprint: &Blueprint,
        filename: &str,
    ) -> std::result::Result<PathBuf, BlueprintError>;
}

/// Stores blueprints as YAML under `<root>/<domain>/<filename>`
pub struct DirectoryBlueprintStore {
    root: PathBuf,
    domains: Vec<String>,
}

impl DirectoryBlueprintStore {
    pub fn new(root: impl AsRef<Path>, domains: &[&str]) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            domains: domains.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn target(&self, domain: &str, filename: &str) -> std::result::Result<PathBuf, BlueprintError> {
        let relative = Path::new(filename);
        let safe = relative.components().all(|c| matches!(c, Component::Normal(_)));
        if filename.is_empty() || !safe {
            return Err(BlueprintError::InvalidFilename(filename.to_string()));
        }

        let mut path = self.root.join(domain).join(relative);
        if path.extension().map_or(true, |ext| ext != "yaml") {
            let mut name = path.as_os_str().to_os_string();
            name.push(".yaml");
            path = PathBuf::from(name);
        }
        Ok(path)
    }
}

#[async_trait]
impl BlueprintStore for DirectoryBlueprintStore {
    fn supports(&self, domain: &str) -> bool {
        self.domains.iter().any(|d| d == domain)
    }

    async fn add(
        &self,
        blueprint: &Blueprint,
        filename: &str,
    ) -> std::result::Result<PathBuf, BlueprintError> {
        let path = self.target(&blueprint.domain, filename)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let yaml = serde_yaml::to_string(blueprint)?;
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(BlueprintError::FileAlreadyExists(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(yaml.as_bytes()).await?;
        file.flush().await?;

        info!("Stored blueprint '{}' at {}", blueprint.name, path.display());
        Ok(path)
    }
}

/// `blueprint.import`
pub struct BlueprintImport {
    source: Arc<dyn BlueprintSource>,
    store: Arc<dyn BlueprintStore>,
    timeout: Duration,
}

impl BlueprintImport {
    pub fn new(source: Arc<dyn BlueprintSource>, store: Arc<dyn BlueprintStore>) -> Self {
        Self {
            source,
            store,
            timeout: FETCH_TIMEOUT,
        }
    }

    async fn fetch(&self, url: &str) -> Result<ImportedBlueprint> {
        let fetched = match tokio::time::timeout(self.timeout, self.source.fetch(url)).await {
            Ok(Ok(fetched)) => fetched,
            Ok(Err(e)) => {
                debug!("Fetching blueprint from {} failed: {}", url, e);
                return Err(Error::service("Error fetching blueprint from URL"));
            }
            Err(_) => {
                debug!("Fetching blueprint from {} timed out", url);
                return Err(Error::service("Error fetching blueprint from URL"));
            }
        };
        fetched.ok_or_else(|| Error::service("This url is not supported"))
    }
}

#[async_trait]
impl Service for BlueprintImport {
    fn domain(&self) -> &str {
        "blueprint"
    }

    fn service(&self) -> &str {
        "import"
    }

    fn admin(&self) -> bool {
        true
    }

    fn schema(&self) -> ServiceSchema {
        ServiceSchema::empty().required("url", FieldKind::Url)
    }

    async fn handle(&self, _hub: &Hub, call: &ServiceCall) -> Result<Value> {
        let url = call.str("url")?;
        let mut imported = self.fetch(url).await?;

        let domain = imported.blueprint.domain.clone();
        if !self.store.supports(&domain) {
            return Err(Error::service(format!("Unsupported domain: {}", domain)));
        }

        imported.blueprint.update_metadata(url);

        match self
            .store
            .add(&imported.blueprint, &imported.suggested_filename)
            .await
        {
            Ok(path) => Ok(serde_json::json!({
                "domain": domain,
                "path": path.display().to_string(),
            })),
            Err(BlueprintError::FileAlreadyExists(_)) => Err(Error::service("File already exists")),
            Err(e) => {
                debug!("Writing blueprint failed: {}", e);
                Err(Error::service("Error writing file"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ServiceRegistry;
    use crate::service::CallContext;
    use serde_json::json;
    use std::collections::HashMap;

    const URL: &str = "https://example.com/motion_light.yaml";

    /// Serves blueprints from a fixed table
    #[derive(Default)]
    struct Table {
        entries: HashMap<String, ImportedBlueprint>,
        delay: Option<Duration>,
        fail: bool,
    }

    #[async_trait]
    impl BlueprintSource for Table {
        async fn fetch(
            &self,
            url: &str,
        ) -> std::result::Result<Option<ImportedBlueprint>, BlueprintError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(BlueprintError::Fetch("connection reset".to_string()));
            }
            Ok(self.entries.get(url).cloned())
        }
    }

    fn table(domain: &str) -> Table {
        let mut entries = HashMap::new();
        entries.insert(
            URL.to_string(),
            ImportedBlueprint {
                blueprint: Blueprint {
                    name: "Motion light".to_string(),
                    domain: domain.to_string(),
                    source_url: None,
                    content: json!({"trigger": []}),
                },
                suggested_filename: "homey/motion_light".to_string(),
            },
        );
        Table {
            entries,
            ..Default::default()
        }
    }

    async fn import(source: Table, root: &Path) -> Result<Value> {
        let store = Arc::new(DirectoryBlueprintStore::new(root, &["automation", "script"]));
        let registry = ServiceRegistry::new(Hub::new());
        registry
            .register(Arc::new(BlueprintImport::new(Arc::new(source), store)))
            .await
            .unwrap();
        registry
            .call("blueprint", "import", json!({ "url": URL }), CallContext::admin("root"))
            .await
    }

    #[tokio::test]
    async fn test_import_writes_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let result = import(table("automation"), dir.path()).await.unwrap();
        assert_eq!(result["domain"], "automation");

        let path = dir.path().join("automation/homey/motion_light.yaml");
        let stored: Blueprint =
            serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored.source_url.as_deref(), Some(URL));
        assert_eq!(stored.name, "Motion light");
    }

    #[tokio::test]
    async fn test_import_twice_reports_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        import(table("automation"), dir.path()).await.unwrap();
        let err = import(table("automation"), dir.path()).await.unwrap_err();
        assert_eq!(err.to_string(), "Service error: File already exists");
    }

    #[tokio::test]
    async fn test_unsupported_domain_and_url() {
        let dir = tempfile::tempdir().unwrap();
        let err = import(table("light"), dir.path()).await.unwrap_err();
        assert_eq!(err.to_string(), "Service error: Unsupported domain: light");

        let err = import(Table::default(), dir.path()).await.unwrap_err();
        assert_eq!(err.to_string(), "Service error: This url is not supported");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut slow = table("automation");
        slow.delay = Some(Duration::from_secs(30));
        let err = import(slow, dir.path()).await.unwrap_err();
        assert_eq!(err.to_string(), "Service error: Error fetching blueprint from URL");

        let mut failing = table("automation");
        failing.fail = true;
        let err = import(failing, dir.path()).await.unwrap_err();
        assert_eq!(err.to_string(), "Service error: Error fetching blueprint from URL");
    }

    #[test]
    fn test_target_rejects_escaping_paths() {
        let store = DirectoryBlueprintStore::new("/tmp/bp", &["automation"]);
        assert!(store.target("automation", "../evil").is_err());
        assert!(store.target("automation", "/etc/passwd").is_err());
        assert_eq!(
            store.target("automation", "a/b.yaml").unwrap(),
            PathBuf::from("/tmp/bp/automation/a/b.yaml")
        );
        assert_eq!(
            store.target("automation", "a/b").unwrap(),
            PathBuf::from("/tmp/bp/automation/a/b.yaml")
        );
    }
}
