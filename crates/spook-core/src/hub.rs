//! The hub: host services shared with every plugin

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::device::{AreaRegistry, DeviceRegistry};
use crate::event::{EventBus, EVENT_HUB_STOP};
use crate::issue::{IssueRegistry, IssueSink};

/// Integration domain that owns every issue raised by a repair
pub const DOMAIN: &str = "spook";

/// Lifecycle of the hub process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HostState {
    #[default]
    Running,
    Stopping,
    Stopped,
}

/// Handle to the host services; cheap to clone
#[derive(Clone)]
pub struct Hub {
    bus: EventBus,
    issues: Arc<dyn IssueSink>,
    devices: Arc<DeviceRegistry>,
    areas: Arc<AreaRegistry>,
    state: Arc<watch::Sender<HostState>>,
}

impl Hub {
    /// Create a hub with in-memory registries
    pub fn new() -> Self {
        let bus = EventBus::new();
        let issues = Arc::new(IssueRegistry::with_bus(bus.clone()));
        Self::with_issue_sink(bus, issues)
    }

    /// Create a hub reporting issues to a custom sink
    pub fn with_issue_sink(bus: EventBus, issues: Arc<dyn IssueSink>) -> Self {
        let (state, _) = watch::channel(HostState::Running);
        Self {
            devices: Arc::new(DeviceRegistry::new(bus.clone())),
            areas: Arc::new(AreaRegistry::new(bus.clone())),
            bus,
            issues,
            state: Arc::new(state),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn issues(&self) -> &Arc<dyn IssueSink> {
        &self.issues
    }

    pub fn devices(&self) -> &Arc<DeviceRegistry> {
        &self.devices
    }

    pub fn areas(&self) -> &Arc<AreaRegistry> {
        &self.areas
    }

    pub fn state(&self) -> HostState {
        *self.state.borrow()
    }

    /// True once shutdown has begun
    pub fn is_stopping(&self) -> bool {
        matches!(self.state(), HostState::Stopping | HostState::Stopped)
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<HostState> {
        self.state.subscribe()
    }

    /// Enter the stopping state and announce it on the bus
    pub fn begin_stop(&self) {
        if self.state.send_replace(HostState::Stopping) == HostState::Running {
            info!("Hub stopping");
            self.bus.fire(EVENT_HUB_STOP, serde_json::Value::Null);
        }
    }

    pub fn mark_stopped(&self) {
        self.state.send_replace(HostState::Stopped);
        info!("Hub stopped");
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
