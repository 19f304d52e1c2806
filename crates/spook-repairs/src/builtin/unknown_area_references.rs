//! Flags devices assigned to an area that does not exist

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use spook_core::event::{EVENT_AREA_REGISTRY_UPDATED, EVENT_DEVICE_REGISTRY_UPDATED};
use spook_core::{IssueSeverity, Result};

use crate::repair::{BoxedRepair, InspectMode, IssueSpec, Repair, RepairContext};

pub struct UnknownAreaReferences;

impl UnknownAreaReferences {
    pub fn boxed() -> BoxedRepair {
        Arc::new(Self)
    }
}

#[async_trait]
impl Repair for UnknownAreaReferences {
    fn domain(&self) -> &str {
        "homeassistant"
    }

    fn repair(&self) -> &str {
        "unknown_area_references"
    }

    fn inspect_mode(&self) -> InspectMode {
        InspectMode::on_events([EVENT_DEVICE_REGISTRY_UPDATED, EVENT_AREA_REGISTRY_UPDATED])
    }

    async fn inspect(&self, ctx: &RepairContext) -> Result<()> {
        let hub = ctx.hub();
        let mut broken = HashSet::new();

        for device in hub.devices().list().await {
            let Some(area_id) = &device.area_id else {
                continue;
            };
            if hub.areas().contains(area_id).await {
                continue;
            }
            ctx.create_issue(
                IssueSpec::new(&device.id)
                    .severity(IssueSeverity::Warning)
                    .placeholder("device", &device.name)
                    .placeholder("area_id", area_id)
                    .data("device_id", device.id.as_str()),
            )
            .await?;
            broken.insert(device.id);
        }

        for suffix in ctx.open_issues().await? {
            if !broken.contains(&suffix) {
                ctx.delete_issue(&suffix).await?;
            }
        }
        Ok(())
    }
}
