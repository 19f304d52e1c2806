//! Activation and deactivation of a single repair
//!
//! [`ManagedRepair`] turns a [`Repair`] into a running check according to its
//! [`InspectMode`]:
//!
//! - `SingleShot`: `activate` runs `inspect` once; `deactivate` only runs the
//!   repair's cleanup hook.
//! - `Debounced`: `activate` builds a [`Debouncer`] around `inspect`, makes
//!   one initial debounced call and subscribes the debouncer to every listed
//!   event. `deactivate` releases the subscriptions and cancels a pending
//!   inspection.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use spook_core::{Hub, Result, Subscription};

use crate::debounce::Debouncer;
use crate::repair::{BoxedRepair, InspectMode, RepairContext, RepairId};

/// Lifecycle of a managed repair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairState {
    Discovered,
    Activating,
    Active,
    Deactivating,
    Removed,
}

/// A repair plus the resources it holds while active
pub struct ManagedRepair {
    repair: BoxedRepair,
    ctx: Arc<RepairContext>,
    cooldown: Duration,
    state: RepairState,
    debouncer: Option<Arc<Debouncer>>,
    subscriptions: Vec<Subscription>,
}

impl ManagedRepair {
    pub fn new(hub: Hub, repair: BoxedRepair, cooldown: Duration) -> Self {
        let ctx = Arc::new(RepairContext::new(hub, repair.id()));
        Self {
            repair,
            ctx,
            cooldown,
            state: RepairState::Discovered,
            debouncer: None,
            subscriptions: Vec::new(),
        }
    }

    pub fn id(&self) -> &RepairId {
        self.ctx.id()
    }

    pub fn state(&self) -> RepairState {
        self.state
    }

    pub fn context(&self) -> &RepairContext {
        &self.ctx
    }

    /// Number of event subscriptions currently held
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Start the repair. Errors from a single-shot inspection propagate.
    pub async fn activate(&mut self) -> Result<()> {
        self.state = RepairState::Activating;
        match self.repair.inspect_mode() {
            InspectMode::SingleShot => {
                debug!("Single-shot inspection of {}", self.id());
                if let Err(e) = self.repair.inspect(&self.ctx).await {
                    self.state = RepairState::Removed;
                    return Err(e);
                }
            }
            InspectMode::Debounced { events } => {
                let debouncer = Arc::new(self.build_debouncer());
                debouncer.call().await;

                for event in &events {
                    let debouncer = Arc::clone(&debouncer);
                    let subscription = self.ctx.hub().bus().listen(event, move |_event| {
                        let debouncer = Arc::clone(&debouncer);
                        async move { debouncer.call().await }
                    });
                    self.subscriptions.push(subscription);
                }
                debug!(
                    "Activated {} with {} inspect events",
                    self.id(),
                    self.subscriptions.len()
                );
                self.debouncer = Some(debouncer);
            }
        }
        self.state = RepairState::Active;
        Ok(())
    }

    fn build_debouncer(&self) -> Debouncer {
        let repair = Arc::clone(&self.repair);
        let ctx = Arc::clone(&self.ctx);
        Debouncer::new(self.id().to_string(), self.cooldown, false, move || {
            let repair = Arc::clone(&repair);
            let ctx = Arc::clone(&ctx);
            async move {
                if ctx.hub().is_stopping() {
                    debug!("Hub stopping, skipping inspection of {}", ctx.id());
                    return Ok(());
                }
                repair.inspect(&ctx).await
            }
        })
    }

    /// Stop the repair.
    ///
    /// Subscriptions and the pending inspection are always released, even
    /// after a failed or partial activation. Only the repair's own cleanup
    /// hook can fail.
    pub async fn deactivate(&mut self) -> Result<()> {
        self.state = RepairState::Deactivating;

        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        if let Some(debouncer) = self.debouncer.take() {
            debouncer.shutdown().await;
        }

        let result = self.repair.cleanup(&self.ctx).await;
        self.state = RepairState::Removed;
        result
    }
}
