//! Reports, once at startup, every device that is disabled

use async_trait::async_trait;
use std::sync::Arc;

use spook_core::{IssueSeverity, Result};

use crate::repair::{BoxedRepair, InspectMode, IssueSpec, Repair, RepairContext};

const ISSUE: &str = "found";

pub struct DisabledDevices;

impl DisabledDevices {
    pub fn boxed() -> BoxedRepair {
        Arc::new(Self)
    }
}

#[async_trait]
impl Repair for DisabledDevices {
    fn domain(&self) -> &str {
        "homeassistant"
    }

    fn repair(&self) -> &str {
        "disabled_devices"
    }

    fn inspect_mode(&self) -> InspectMode {
        InspectMode::SingleShot
    }

    async fn inspect(&self, ctx: &RepairContext) -> Result<()> {
        let disabled: Vec<_> = ctx
            .hub()
            .devices()
            .list()
            .await
            .into_iter()
            .filter(|d| d.is_disabled())
            .collect();

        if disabled.is_empty() {
            ctx.delete_issue(ISSUE).await?;
            return Ok(());
        }

        let names: Vec<&str> = disabled.iter().map(|d| d.name.as_str()).collect();
        let ids: Vec<&str> = disabled.iter().map(|d| d.id.as_str()).collect();
        ctx.create_issue(
            IssueSpec::new(ISSUE)
                .severity(IssueSeverity::Info)
                .placeholder("devices", names.join(", "))
                .data("count", disabled.len())
                .data("device_ids", ids),
        )
        .await
    }
}
