//! Device and area registries

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::event::{EventBus, EVENT_AREA_REGISTRY_UPDATED, EVENT_DEVICE_REGISTRY_UPDATED};

/// Who disabled a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisabledBy {
    User,
    Integration,
    ConfigEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub area_id: Option<String>,
    #[serde(default)]
    pub disabled_by: Option<DisabledBy>,
}

impl Device {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            area_id: None,
            disabled_by: None,
        }
    }

    pub fn with_area(mut self, area_id: impl Into<String>) -> Self {
        self.area_id = Some(area_id.into());
        self
    }

    pub fn disabled(mut self, by: DisabledBy) -> Self {
        self.disabled_by = Some(by);
        self
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled_by.is_some()
    }
}

/// Registry of known devices; announces every change on the bus
pub struct DeviceRegistry {
    devices: RwLock<BTreeMap<String, Device>>,
    bus: EventBus,
}

impl DeviceRegistry {
    pub fn new(bus: EventBus) -> Self {
        Self {
            devices: RwLock::new(BTreeMap::new()),
            bus,
        }
    }

    /// Add a device, replacing any device with the same id
    pub async fn add(&self, device: Device) {
        let id = device.id.clone();
        let replaced = self.devices.write().await.insert(id.clone(), device).is_some();
        self.announce(if replaced { "update" } else { "create" }, &id);
    }

    pub async fn remove(&self, device_id: &str) -> Result<Device> {
        let device = self
            .devices
            .write()
            .await
            .remove(device_id)
            .ok_or_else(|| Error::not_found(format!("device '{}'", device_id)))?;
        self.announce("remove", device_id);
        Ok(device)
    }

    pub async fn get(&self, device_id: &str) -> Option<Device> {
        self.devices.read().await.get(device_id).cloned()
    }

    pub async fn list(&self) -> Vec<Device> {
        self.devices.read().await.values().cloned().collect()
    }

    /// Set or clear who disabled a device
    pub async fn update_disabled_by(
        &self,
        device_id: &str,
        disabled_by: Option<DisabledBy>,
    ) -> Result<Device> {
        self.update(device_id, |device| device.disabled_by = disabled_by)
            .await
    }

    pub async fn update_area(&self, device_id: &str, area_id: Option<String>) -> Result<Device> {
        self.update(device_id, |device| device.area_id = area_id).await
    }

    async fn update(&self, device_id: &str, apply: impl FnOnce(&mut Device)) -> Result<Device> {
        let updated = {
            let mut devices = self.devices.write().await;
            let device = devices
                .get_mut(device_id)
                .ok_or_else(|| Error::not_found(format!("device '{}'", device_id)))?;
            apply(device);
            device.clone()
        };
        self.announce("update", device_id);
        Ok(updated)
    }

    fn announce(&self, action: &str, device_id: &str) {
        debug!("Device registry {}: {}", action, device_id);
        self.bus.fire(
            EVENT_DEVICE_REGISTRY_UPDATED,
            serde_json::json!({ "action": action, "device_id": device_id }),
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub id: String,
    pub name: String,
}

/// Registry of known areas
pub struct AreaRegistry {
    areas: RwLock<BTreeMap<String, Area>>,
    bus: EventBus,
}

impl AreaRegistry {
    pub fn new(bus: EventBus) -> Self {
        Self {
            areas: RwLock::new(BTreeMap::new()),
            bus,
        }
    }

    pub async fn create(&self, id: impl Into<String>, name: impl Into<String>) -> Result<Area> {
        let area = Area {
            id: id.into(),
            name: name.into(),
        };
        {
            let mut areas = self.areas.write().await;
            if areas.contains_key(&area.id) {
                return Err(Error::invalid_argument(format!(
                    "area '{}' already exists",
                    area.id
                )));
            }
            areas.insert(area.id.clone(), area.clone());
        }
        self.announce("create", &area.id);
        Ok(area)
    }

    pub async fn delete(&self, area_id: &str) -> Result<Area> {
        let area = self
            .areas
            .write()
            .await
            .remove(area_id)
            .ok_or_else(|| Error::not_found(format!("area '{}'", area_id)))?;
        self.announce("remove", area_id);
        Ok(area)
    }

    pub async fn get(&self, area_id: &str) -> Option<Area> {
        self.areas.read().await.get(area_id).cloned()
    }

    pub async fn contains(&self, area_id: &str) -> bool {
        self.areas.read().await.contains_key(area_id)
    }

    pub async fn list(&self) -> Vec<Area> {
        self.areas.read().await.values().cloned().collect()
    }

    fn announce(&self, action: &str, area_id: &str) {
        debug!("Area registry {}: {}", action, area_id);
        self.bus.fire(
            EVENT_AREA_REGISTRY_UPDATED,
            serde_json::json!({ "action": action, "area_id": area_id }),
        );
    }
}
