//! Services to enable and disable devices

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use spook_core::{DisabledBy, Hub, Result};

use crate::schema::{FieldKind, ServiceSchema};
use crate::service::{BoxedService, Service, ServiceCall};

/// `homeassistant.enable_device`
pub struct EnableDevice;

impl EnableDevice {
    pub fn boxed() -> BoxedService {
        Arc::new(Self)
    }
}

#[async_trait]
impl Service for EnableDevice {
    fn domain(&self) -> &str {
        "homeassistant"
    }

    fn service(&self) -> &str {
        "enable_device"
    }

    fn admin(&self) -> bool {
        true
    }

    fn schema(&self) -> ServiceSchema {
        ServiceSchema::empty().required("device_id", FieldKind::String)
    }

    async fn handle(&self, hub: &Hub, call: &ServiceCall) -> Result<Value> {
        let device = hub
            .devices()
            .update_disabled_by(call.str("device_id")?, None)
            .await?;
        Ok(serde_json::to_value(device)?)
    }
}

/// `homeassistant.disable_device`
pub struct DisableDevice;

impl DisableDevice {
    pub fn boxed() -> BoxedService {
        Arc::new(Self)
    }
}

#[async_trait]
impl Service for DisableDevice {
    fn domain(&self) -> &str {
        "homeassistant"
    }

    fn service(&self) -> &str {
        "disable_device"
    }

    fn admin(&self) -> bool {
        true
    }

    fn schema(&self) -> ServiceSchema {
        ServiceSchema::empty().required("device_id", FieldKind::String)
    }

    async fn handle(&self, hub: &Hub, call: &ServiceCall) -> Result<Value> {
        let device = hub
            .devices()
            .update_disabled_by(call.str("device_id")?, Some(DisabledBy::User))
            .await?;
        Ok(serde_json::to_value(device)?)
    }
}
