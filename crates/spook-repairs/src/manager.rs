//! Repair manager: discovers, activates and tears down repairs
//!
//! Issues raised by a repair are not tracked individually. At teardown the
//! manager scans the issue sink and removes every issue of the [`DOMAIN`]
//! integration whose id starts with `{repair}_`. When two repair names are
//! prefixes of one another (`battery` and `battery_low`), an issue belongs to
//! the longest matching name only.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use spook_core::{Error, Hub, Result, SpookConfig, DOMAIN};

use crate::builtin::{builtin_repairs, RepairFactory};
use crate::lifecycle::{ManagedRepair, RepairState};
use crate::repair::{BoxedRepair, RepairId};

/// Owns every active repair of the integration
pub struct RepairManager {
    hub: Hub,
    config: SpookConfig,
    repairs: RwLock<Vec<ManagedRepair>>,
    states: RwLock<HashMap<RepairId, RepairState>>,
}

impl RepairManager {
    pub fn new(hub: Hub, config: SpookConfig) -> Self {
        debug!("Repair manager initialized");
        Self {
            hub,
            config,
            repairs: RwLock::new(Vec::new()),
            states: RwLock::new(HashMap::new()),
        }
    }

    fn cooldown(&self) -> Duration {
        self.config.inspect_cooldown()
    }

    /// Activate every built-in repair not disabled in the config
    pub async fn setup(&self) -> Result<usize> {
        self.setup_from(&builtin_repairs()).await
    }

    /// Activate every repair produced by `factories`.
    ///
    /// Stops at the first activation failure and returns it.
    pub async fn setup_from(&self, factories: &[RepairFactory]) -> Result<usize> {
        debug!("Setting up repairs");
        let mut activated = 0;
        for factory in factories {
            let repair = factory();
            if self.config.is_repair_disabled(repair.domain(), repair.repair()) {
                info!("Repair {} disabled by configuration", repair.id());
                continue;
            }
            self.activate(repair).await?;
            activated += 1;
        }
        info!("Activated {} repairs", activated);
        Ok(activated)
    }

    /// Activate one repair and add it to the active set.
    ///
    /// Rejects a repair whose name is already taken by an active repair,
    /// since issue ids are namespaced by name alone.
    pub async fn activate(&self, repair: BoxedRepair) -> Result<()> {
        let id = repair.id();
        debug!("Registering repair: {}", id);

        {
            let mut states = self.states.write().await;
            let taken = states.iter().any(|(other, state)| {
                other.repair == id.repair
                    && matches!(
                        state,
                        RepairState::Activating | RepairState::Active | RepairState::Deactivating
                    )
            });
            if taken {
                return Err(Error::AlreadyActive(id.to_string()));
            }
            states.insert(id.clone(), RepairState::Activating);
        }

        let mut managed = ManagedRepair::new(self.hub.clone(), repair, self.cooldown());
        if let Err(e) = managed.activate().await {
            warn!("Failed to activate repair {}: {}", id, e);
            if let Err(cleanup_err) = managed.deactivate().await {
                debug!("Cleanup after failed activation of {}: {}", id, cleanup_err);
            }
            self.states.write().await.insert(id, RepairState::Removed);
            return Err(e);
        }

        self.repairs.write().await.push(managed);
        self.states.write().await.insert(id, RepairState::Active);
        Ok(())
    }

    /// Deactivate every repair and delete the issues it owns.
    ///
    /// Failures are logged and never stop the remaining teardowns.
    pub async fn teardown(&self) {
        debug!("Tearing down repairs");
        let repairs: Vec<ManagedRepair> = self.repairs.write().await.drain(..).collect();
        let known: Vec<String> = repairs.iter().map(|r| r.id().repair.clone()).collect();

        for mut managed in repairs {
            let id = managed.id().clone();
            debug!("Unregistering repair: {}", id);
            self.states
                .write()
                .await
                .insert(id.clone(), RepairState::Deactivating);

            if let Err(e) = managed.deactivate().await {
                warn!("Failed to deactivate repair {}: {}", id, e);
            }

            match self.remove_issues(&id, &known).await {
                Ok(0) => {}
                Ok(removed) => debug!("Removed {} issues of {}", removed, id),
                Err(e) => warn!("Failed to remove issues of {}: {}", id, e),
            }

            self.states.write().await.insert(id, RepairState::Removed);
        }
        info!("Repairs torn down");
    }

    async fn remove_issues(&self, id: &RepairId, known: &[String]) -> Result<usize> {
        let issues = self.hub.issues().list().await?;
        let mut removed = 0;
        for (domain, issue_id) in issues {
            if domain != DOMAIN || !owns_issue(&id.repair, &issue_id, known) {
                continue;
            }
            if self.hub.issues().delete(&domain, &issue_id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Ids of every active repair
    pub async fn active(&self) -> Vec<RepairId> {
        self.repairs
            .read()
            .await
            .iter()
            .map(|r| r.id().clone())
            .collect()
    }

    pub async fn is_active(&self, id: &RepairId) -> bool {
        self.state(id).await == Some(RepairState::Active)
    }

    pub async fn state(&self, id: &RepairId) -> Option<RepairState> {
        self.states.read().await.get(id).copied()
    }

    pub async fn count(&self) -> usize {
        self.repairs.read().await.len()
    }
}

/// Whether `issue_id` belongs to `repair`, given every known repair name.
///
/// The issue must start with `{repair}_` and no longer known name may claim it.
pub fn owns_issue(repair: &str, issue_id: &str, known: &[String]) -> bool {
    let claims = |name: &str| {
        issue_id
            .strip_prefix(name)
            .is_some_and(|rest| rest.starts_with('_'))
    };
    if !claims(repair) {
        return false;
    }
    !known
        .iter()
        .any(|other| other.len() > repair.len() && claims(other))
}
