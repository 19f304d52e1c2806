//! Core repair trait and types
//!
//! A repair is a diagnostic check identified by `(domain, repair)`. It raises
//! and clears issues through its [`RepairContext`], which namespaces every
//! issue id as `{repair}_{suffix}` under the [`DOMAIN`] integration so the
//! manager can find and remove a repair's issues by prefix at teardown.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use spook_core::{CreateIssue, Hub, IssueSeverity, Result, DOMAIN};

/// Unique identity of a repair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepairId {
    pub domain: String,
    pub repair: String,
}

impl RepairId {
    pub fn new(domain: impl Into<String>, repair: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            repair: repair.into(),
        }
    }

    /// Prefix shared by every issue id this repair creates
    pub fn issue_prefix(&self) -> String {
        format!("{}_", self.repair)
    }
}

impl fmt::Display for RepairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.repair)
    }
}

/// When a repair inspects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum InspectMode {
    /// Inspect once at activation and never again
    SingleShot,
    /// Debounced inspection at activation and whenever one of `events` fires
    Debounced { events: Vec<String> },
}

impl InspectMode {
    /// Debounced mode triggered by the given events
    pub fn on_events<I, S>(events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        InspectMode::Debounced {
            events: events.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for InspectMode {
    fn default() -> Self {
        InspectMode::Debounced { events: Vec::new() }
    }
}

/// Core trait every repair implements
#[async_trait]
pub trait Repair: Send + Sync {
    /// Domain the repair inspects
    fn domain(&self) -> &str;

    /// Repair name, unique across all domains
    fn repair(&self) -> &str;

    /// How inspections are triggered
    fn inspect_mode(&self) -> InspectMode {
        InspectMode::default()
    }

    /// Run the check, creating and deleting issues through `ctx`
    async fn inspect(&self, ctx: &RepairContext) -> Result<()>;

    /// Called once on deactivation, after event subscriptions are released
    async fn cleanup(&self, _ctx: &RepairContext) -> Result<()> {
        Ok(())
    }

    fn id(&self) -> RepairId {
        RepairId::new(self.domain(), self.repair())
    }
}

/// Shared repair handle
pub type BoxedRepair = Arc<dyn Repair>;

/// Issue raised by a repair; the id is a suffix, namespaced on creation
#[derive(Debug, Clone, Default)]
pub struct IssueSpec {
    pub issue_id: String,
    pub issue_domain: Option<String>,
    pub severity: IssueSeverity,
    pub is_fixable: bool,
    pub is_persistent: bool,
    pub data: Map<String, Value>,
    pub translation_placeholders: HashMap<String, String>,
    pub breaks_in_version: Option<String>,
    pub learn_more_url: Option<String>,
}

impl IssueSpec {
    pub fn new(issue_id: impl Into<String>) -> Self {
        Self {
            issue_id: issue_id.into(),
            ..Default::default()
        }
    }

    pub fn severity(mut self, severity: IssueSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn fixable(mut self) -> Self {
        self.is_fixable = true;
        self
    }

    pub fn persistent(mut self) -> Self {
        self.is_persistent = true;
        self
    }

    pub fn issue_domain(mut self, domain: impl Into<String>) -> Self {
        self.issue_domain = Some(domain.into());
        self
    }

    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn placeholder(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.translation_placeholders.insert(key.into(), value.into());
        self
    }

    pub fn breaks_in_version(mut self, version: impl Into<String>) -> Self {
        self.breaks_in_version = Some(version.into());
        self
    }

    pub fn learn_more_url(mut self, url: impl Into<String>) -> Self {
        self.learn_more_url = Some(url.into());
        self
    }
}

/// Everything a repair needs while inspecting
#[derive(Clone)]
pub struct RepairContext {
    hub: Hub,
    id: RepairId,
}

impl RepairContext {
    pub fn new(hub: Hub, id: RepairId) -> Self {
        Self { hub, id }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn id(&self) -> &RepairId {
        &self.id
    }

    /// Full issue id for `suffix`
    pub fn issue_id(&self, suffix: &str) -> String {
        format!("{}{}", self.id.issue_prefix(), suffix)
    }

    /// Create or update an issue owned by this repair
    pub async fn create_issue(&self, spec: IssueSpec) -> Result<()> {
        self.hub
            .issues()
            .create(CreateIssue {
                domain: DOMAIN.to_string(),
                issue_id: self.issue_id(&spec.issue_id),
                issue_domain: Some(spec.issue_domain.unwrap_or_else(|| self.id.domain.clone())),
                severity: spec.severity,
                is_fixable: spec.is_fixable,
                is_persistent: spec.is_persistent,
                data: spec.data,
                translation_key: self.id.repair.clone(),
                translation_placeholders: spec.translation_placeholders,
                breaks_in_version: spec.breaks_in_version,
                learn_more_url: spec.learn_more_url,
            })
            .await
    }

    /// Delete an issue owned by this repair; returns whether it existed
    pub async fn delete_issue(&self, suffix: &str) -> Result<bool> {
        self.hub.issues().delete(DOMAIN, &self.issue_id(suffix)).await
    }

    /// Suffixes of every issue currently registered under this repair's prefix
    pub async fn open_issues(&self) -> Result<Vec<String>> {
        let prefix = self.id.issue_prefix();
        Ok(self
            .hub
            .issues()
            .list()
            .await?
            .into_iter()
            .filter(|(domain, _)| domain == DOMAIN)
            .filter_map(|(_, issue_id)| issue_id.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(domain: &str, repair: &str) -> RepairContext {
        RepairContext::new(Hub::new(), RepairId::new(domain, repair))
    }

    #[tokio::test]
    async fn test_create_issue_namespaces_id() {
        let ctx = context("sensor", "battery");
        ctx.create_issue(
            IssueSpec::new("low_battery")
                .severity(IssueSeverity::Error)
                .placeholder("entity", "sensor.kitchen")
                .data("level", 3),
        )
        .await
        .unwrap();

        let issue = ctx
            .hub()
            .issues()
            .get(DOMAIN, "battery_low_battery")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(issue.issue_domain.as_deref(), Some("sensor"));
        assert_eq!(issue.translation_key, "battery");
        assert_eq!(issue.severity, IssueSeverity::Error);
        assert_eq!(issue.translation_placeholders["entity"], "sensor.kitchen");
        assert_eq!(issue.data["level"], 3);
    }

    #[tokio::test]
    async fn test_delete_issue_removes_only_that_issue() {
        let ctx = context("sensor", "battery");
        ctx.create_issue(IssueSpec::new("low_battery")).await.unwrap();
        ctx.create_issue(IssueSpec::new("dead_battery")).await.unwrap();

        assert!(ctx.delete_issue("low_battery").await.unwrap());

        let remaining = ctx.hub().issues().list().await.unwrap();
        assert_eq!(remaining, vec![(DOMAIN.to_string(), "battery_dead_battery".to_string())]);
    }

    #[tokio::test]
    async fn test_issue_domain_override() {
        let ctx = context("sensor", "battery");
        ctx.create_issue(IssueSpec::new("x").issue_domain("zha")).await.unwrap();

        let issue = ctx.hub().issues().get(DOMAIN, "battery_x").await.unwrap().unwrap();
        assert_eq!(issue.issue_domain.as_deref(), Some("zha"));
    }

    #[tokio::test]
    async fn test_open_issues_lists_suffixes() {
        let ctx = context("sensor", "battery");
        ctx.create_issue(IssueSpec::new("a")).await.unwrap();
        ctx.create_issue(IssueSpec::new("b")).await.unwrap();

        let mut open = ctx.open_issues().await.unwrap();
        open.sort();
        assert_eq!(open, vec!["a", "b"]);
    }

    #[test]
    fn test_inspect_mode_on_events() {
        let mode = InspectMode::on_events(["state_changed"]);
        assert_eq!(
            mode,
            InspectMode::Debounced {
                events: vec!["state_changed".to_string()]
            }
        );
        assert_eq!(InspectMode::default(), InspectMode::Debounced { events: vec![] });
    }
}
