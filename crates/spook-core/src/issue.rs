//! Issue registry: the sink repairs report diagnostic issues to
//!
//! Issues are keyed by `(domain, issue_id)`. Creating an issue that already
//! exists updates it in place and keeps its original creation time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::event::{EventBus, EVENT_ISSUE_REGISTRY_UPDATED};

/// How urgent an issue is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Info,
    #[default]
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueSeverity::Info => write!(f, "info"),
            IssueSeverity::Warning => write!(f, "warning"),
            IssueSeverity::Error => write!(f, "error"),
            IssueSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Request to create (or update) an issue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateIssue {
    /// Integration that owns the issue
    pub domain: String,
    pub issue_id: String,
    /// Integration the issue is about, if different from `domain`
    pub issue_domain: Option<String>,
    pub severity: IssueSeverity,
    pub is_fixable: bool,
    pub is_persistent: bool,
    pub data: Map<String, Value>,
    pub translation_key: String,
    pub translation_placeholders: HashMap<String, String>,
    pub breaks_in_version: Option<String>,
    pub learn_more_url: Option<String>,
}

/// A registered issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub domain: String,
    pub issue_id: String,
    pub issue_domain: Option<String>,
    pub severity: IssueSeverity,
    pub is_fixable: bool,
    pub is_persistent: bool,
    pub data: Map<String, Value>,
    pub translation_key: String,
    pub translation_placeholders: HashMap<String, String>,
    pub breaks_in_version: Option<String>,
    pub learn_more_url: Option<String>,
    pub created: DateTime<Utc>,
}

/// Where diagnostic issues are created, deleted and listed
#[async_trait]
pub trait IssueSink: Send + Sync {
    /// Create an issue, or update it if `(domain, issue_id)` already exists
    async fn create(&self, request: CreateIssue) -> Result<()>;

    /// Delete an issue; returns whether it existed
    async fn delete(&self, domain: &str, issue_id: &str) -> Result<bool>;

    /// Keys of every registered issue
    async fn list(&self) -> Result<Vec<(String, String)>>;

    /// Look up a single issue
    async fn get(&self, domain: &str, issue_id: &str) -> Result<Option<Issue>>;
}

/// In-memory issue registry
#[derive(Default)]
pub struct IssueRegistry {
    issues: RwLock<BTreeMap<(String, String), Issue>>,
    bus: Option<EventBus>,
}

impl IssueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce changes on `bus` as `issue_registry_updated` events
    pub fn with_bus(bus: EventBus) -> Self {
        Self {
            issues: RwLock::new(BTreeMap::new()),
            bus: Some(bus),
        }
    }

    /// Snapshot of every issue
    pub async fn issues(&self) -> Vec<Issue> {
        self.issues.read().await.values().cloned().collect()
    }

    pub async fn count(&self) -> usize {
        self.issues.read().await.len()
    }

    fn announce(&self, action: &str, domain: &str, issue_id: &str) {
        if let Some(bus) = &self.bus {
            bus.fire(
                EVENT_ISSUE_REGISTRY_UPDATED,
                serde_json::json!({
                    "action": action,
                    "domain": domain,
                    "issue_id": issue_id,
                }),
            );
        }
    }
}

#[async_trait]
impl IssueSink for IssueRegistry {
    async fn create(&self, request: CreateIssue) -> Result<()> {
        if request.domain.is_empty() || request.issue_id.is_empty() {
            return Err(Error::invalid_argument(
                "issue domain and issue_id must not be empty",
            ));
        }

        let key = (request.domain.clone(), request.issue_id.clone());
        let action = {
            let mut issues = self.issues.write().await;
            let created = issues.get(&key).map(|existing| existing.created);
            let action = if created.is_some() { "update" } else { "create" };
            issues.insert(
                key,
                Issue {
                    domain: request.domain.clone(),
                    issue_id: request.issue_id.clone(),
                    issue_domain: request.issue_domain,
                    severity: request.severity,
                    is_fixable: request.is_fixable,
                    is_persistent: request.is_persistent,
                    data: request.data,
                    translation_key: request.translation_key,
                    translation_placeholders: request.translation_placeholders,
                    breaks_in_version: request.breaks_in_version,
                    learn_more_url: request.learn_more_url,
                    created: created.unwrap_or_else(Utc::now),
                },
            );
            action
        };

        debug!("Issue {}: {}.{}", action, request.domain, request.issue_id);
        self.announce(action, &request.domain, &request.issue_id);
        Ok(())
    }

    async fn delete(&self, domain: &str, issue_id: &str) -> Result<bool> {
        let removed = self
            .issues
            .write()
            .await
            .remove(&(domain.to_string(), issue_id.to_string()))
            .is_some();

        if removed {
            debug!("Issue remove: {}.{}", domain, issue_id);
            self.announce("remove", domain, issue_id);
        }
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<(String, String)>> {
        Ok(self.issues.read().await.keys().cloned().collect())
    }

    async fn get(&self, domain: &str, issue_id: &str) -> Result<Option<Issue>> {
        Ok(self
            .issues
            .read()
            .await
            .get(&(domain.to_string(), issue_id.to_string()))
            .cloned())
    }
}
