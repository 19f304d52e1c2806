//! End-to-end behaviour of the repair manager against an in-memory hub

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use spook_core::event::EVENT_STATE_CHANGED;
use spook_core::{Device, DisabledBy, Error, Hub, IssueSink, Result, SpookConfig, DOMAIN};
use spook_repairs::{
    builtin_repairs, InspectMode, IssueSpec, Repair, RepairContext, RepairId, RepairManager,
    RepairState,
};

const COOLDOWN: Duration = Duration::from_secs(10);

/// Records every inspection and raises the issues it is told to
struct Recorder {
    domain: &'static str,
    repair: &'static str,
    mode: InspectMode,
    issues: Vec<&'static str>,
    inspect_time: Duration,
    fail_cleanup: bool,
    inspections: Mutex<Vec<Instant>>,
}

impl Recorder {
    fn new(domain: &'static str, repair: &'static str, mode: InspectMode) -> Self {
        Self {
            domain,
            repair,
            mode,
            issues: Vec::new(),
            inspect_time: Duration::ZERO,
            fail_cleanup: false,
            inspections: Mutex::new(Vec::new()),
        }
    }

    fn raising(mut self, issues: &[&'static str]) -> Self {
        self.issues = issues.to_vec();
        self
    }

    fn taking(mut self, inspect_time: Duration) -> Self {
        self.inspect_time = inspect_time;
        self
    }

    fn inspections(&self) -> Vec<Instant> {
        self.inspections.lock().unwrap().clone()
    }
}

#[async_trait]
impl Repair for Recorder {
    fn domain(&self) -> &str {
        self.domain
    }

    fn repair(&self) -> &str {
        self.repair
    }

    fn inspect_mode(&self) -> InspectMode {
        self.mode.clone()
    }

    async fn inspect(&self, ctx: &RepairContext) -> Result<()> {
        self.inspections.lock().unwrap().push(Instant::now());
        if !self.inspect_time.is_zero() {
            tokio::time::sleep(self.inspect_time).await;
        }
        for issue in &self.issues {
            ctx.create_issue(IssueSpec::new(*issue)).await?;
        }
        Ok(())
    }

    async fn cleanup(&self, _ctx: &RepairContext) -> Result<()> {
        if self.fail_cleanup {
            return Err(Error::repair("cleanup exploded"));
        }
        Ok(())
    }
}

/// Fails its first inspection
struct Broken;

#[async_trait]
impl Repair for Broken {
    fn domain(&self) -> &str {
        "test"
    }
    fn repair(&self) -> &str {
        "broken"
    }
    fn inspect_mode(&self) -> InspectMode {
        InspectMode::SingleShot
    }
    async fn inspect(&self, _ctx: &RepairContext) -> Result<()> {
        Err(Error::repair("cannot inspect"))
    }
}

fn manager(hub: &Hub) -> RepairManager {
    RepairManager::new(hub.clone(), SpookConfig::default())
}

#[tokio::test(start_paused = true)]
async fn event_burst_triggers_single_inspection() {
    let hub = Hub::new();
    let manager = manager(&hub);
    let recorder = Arc::new(Recorder::new(
        "test",
        "burst",
        InspectMode::on_events([EVENT_STATE_CHANGED]),
    ));
    manager.activate(recorder.clone()).await.unwrap();

    let mut last_event = Instant::now();
    for _ in 0..5 {
        hub.bus().fire(EVENT_STATE_CHANGED, serde_json::json!({}));
        last_event = Instant::now();
        tokio::time::sleep(Duration::from_millis(400)).await;
    }
    tokio::time::sleep(Duration::from_secs(60)).await;

    let inspections = recorder.inspections();
    assert_eq!(inspections.len(), 1);
    assert!(inspections[0] >= last_event + COOLDOWN);
}

#[tokio::test(start_paused = true)]
async fn events_after_cooldown_inspect_again() {
    let hub = Hub::new();
    let manager = manager(&hub);
    let recorder = Arc::new(Recorder::new(
        "test",
        "again",
        InspectMode::on_events([EVENT_STATE_CHANGED]),
    ));
    manager.activate(recorder.clone()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(recorder.inspections().len(), 1);

    hub.bus().fire(EVENT_STATE_CHANGED, serde_json::json!({}));
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(recorder.inspections().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn no_events_means_no_side_effects_on_deactivate() {
    let hub = Hub::new();
    let manager = manager(&hub);
    let recorder = Arc::new(Recorder::new("test", "quiet", InspectMode::default()));
    manager.activate(recorder.clone()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(recorder.inspections().len(), 1);
    assert_eq!(hub.bus().listener_count(EVENT_STATE_CHANGED), 0);

    manager.teardown().await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(recorder.inspections().len(), 1);
    assert!(hub.issues().list().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stopping_hub_skips_pending_inspection() {
    let hub = Hub::new();
    let manager = manager(&hub);
    let recorder = Arc::new(
        Recorder::new("test", "stopping", InspectMode::on_events([EVENT_STATE_CHANGED]))
            .raising(&["anything"]),
    );
    manager.activate(recorder.clone()).await.unwrap();

    hub.begin_stop();
    hub.bus().fire(EVENT_STATE_CHANGED, serde_json::json!({}));
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(recorder.inspections().is_empty());
    assert!(hub.issues().list().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn single_shot_inspects_at_activation_only() {
    let hub = Hub::new();
    let manager = manager(&hub);
    let recorder = Arc::new(Recorder::new("test", "once", InspectMode::SingleShot));
    manager.activate(recorder.clone()).await.unwrap();
    assert_eq!(recorder.inspections().len(), 1);

    hub.bus().fire(EVENT_STATE_CHANGED, serde_json::json!({}));
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(recorder.inspections().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn teardown_removes_only_owned_issues() {
    let hub = Hub::new();
    let manager = manager(&hub);
    let battery = Arc::new(
        Recorder::new("sensor", "battery", InspectMode::SingleShot).raising(&["low_battery"]),
    );
    let battery_low = Arc::new(
        Recorder::new("sensor", "battery_low", InspectMode::SingleShot).raising(&["kitchen"]),
    );
    manager.activate(battery).await.unwrap();
    manager.activate(battery_low).await.unwrap();

    // belongs to another integration
    hub.issues()
        .create(spook_core::CreateIssue {
            domain: "zwave".to_string(),
            issue_id: "battery_low_battery".to_string(),
            translation_key: "zwave".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let mut ids: Vec<String> = hub
        .issues()
        .list()
        .await
        .unwrap()
        .into_iter()
        .filter(|(domain, _)| domain == DOMAIN)
        .map(|(_, id)| id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["battery_low_battery", "battery_low_kitchen"]);

    manager.teardown().await;

    assert_eq!(manager.count().await, 0);
    assert!(manager.active().await.is_empty());
    assert_eq!(
        hub.issues().list().await.unwrap(),
        vec![("zwave".to_string(), "battery_low_battery".to_string())]
    );
    assert_eq!(
        manager.state(&RepairId::new("sensor", "battery")).await,
        Some(RepairState::Removed)
    );
}

#[tokio::test(start_paused = true)]
async fn teardown_waits_for_running_inspection() {
    let hub = Hub::new();
    let manager = manager(&hub);
    let battery = Arc::new(
        Recorder::new("sensor", "battery", InspectMode::default())
            .raising(&["low_battery"])
            .taking(Duration::from_secs(5)),
    );
    manager.activate(battery.clone()).await.unwrap();

    // first inspection starts at COOLDOWN and is still running
    tokio::time::sleep(COOLDOWN + Duration::from_secs(1)).await;
    assert_eq!(battery.inspections().len(), 1);

    manager.teardown().await;
    assert!(hub.issues().list().await.unwrap().is_empty());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(hub.issues().list().await.unwrap().is_empty());
    assert_eq!(battery.inspections().len(), 1);
    assert_eq!(manager.count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn create_and_delete_issue_by_suffix() {
    let hub = Hub::new();
    let ctx = RepairContext::new(hub.clone(), RepairId::new("sensor", "battery"));

    ctx.create_issue(IssueSpec::new("low_battery")).await.unwrap();
    ctx.create_issue(IssueSpec::new("other")).await.unwrap();
    assert!(hub
        .issues()
        .get(DOMAIN, "battery_low_battery")
        .await
        .unwrap()
        .is_some());

    assert!(ctx.delete_issue("low_battery").await.unwrap());
    assert_eq!(
        hub.issues().list().await.unwrap(),
        vec![(DOMAIN.to_string(), "battery_other".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn activation_failure_propagates() {
    let hub = Hub::new();
    let manager = manager(&hub);

    let err = manager.activate(Arc::new(Broken)).await.unwrap_err();
    assert!(matches!(err, Error::Repair(_)));
    assert_eq!(manager.count().await, 0);
    assert_eq!(
        manager.state(&RepairId::new("test", "broken")).await,
        Some(RepairState::Removed)
    );
}

#[tokio::test(start_paused = true)]
async fn duplicate_repair_name_is_rejected() {
    let hub = Hub::new();
    let manager = manager(&hub);
    manager
        .activate(Arc::new(Recorder::new("light", "dup", InspectMode::SingleShot)))
        .await
        .unwrap();

    let err = manager
        .activate(Arc::new(Recorder::new("switch", "dup", InspectMode::SingleShot)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyActive(_)));
    assert_eq!(manager.count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn failed_cleanup_does_not_stop_teardown() {
    let hub = Hub::new();
    let manager = manager(&hub);

    let mut failing = Recorder::new("test", "failing", InspectMode::SingleShot).raising(&["a"]);
    failing.fail_cleanup = true;
    let healthy = Recorder::new("test", "healthy", InspectMode::on_events([EVENT_STATE_CHANGED]))
        .raising(&["b"]);

    manager.activate(Arc::new(failing)).await.unwrap();
    manager.activate(Arc::new(healthy)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(hub.issues().list().await.unwrap().len(), 2);

    manager.teardown().await;

    assert!(hub.issues().list().await.unwrap().is_empty());
    assert_eq!(hub.bus().listener_count(EVENT_STATE_CHANGED), 0);
    assert_eq!(manager.count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn builtin_setup_respects_config() {
    let hub = Hub::new();
    hub.devices()
        .add(Device::new("d1", "Lamp").disabled(DisabledBy::User))
        .await;
    hub.devices()
        .add(Device::new("d2", "Fan").with_area("attic"))
        .await;

    let config = SpookConfig {
        disabled_repairs: vec!["homeassistant.disabled_devices".to_string()],
        ..Default::default()
    };
    let manager = RepairManager::new(hub.clone(), config);

    let activated = manager.setup_from(&builtin_repairs()).await.unwrap();
    assert_eq!(activated, builtin_repairs().len() - 1);
    assert!(
        manager
            .is_active(&RepairId::new("homeassistant", "unknown_area_references"))
            .await
    );

    tokio::time::sleep(Duration::from_secs(11)).await;
    let ids: Vec<String> = hub
        .issues()
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|(_, id)| id)
        .collect();
    assert_eq!(ids, vec!["unknown_area_references_d2"]);

    // fixing the area clears the issue after the next debounced inspection
    hub.areas().create("attic", "Attic").await.unwrap();
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(hub.issues().list().await.unwrap().is_empty());

    manager.teardown().await;
}
