//! Service manager: registers the built-in services with the hub's registry
//! and removes them again on unload.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use spook_core::{Result, SpookConfig};

use crate::builtin::{builtin_services, ServiceEnv, ServiceFactory};
use crate::registry::ServiceRegistry;
use crate::service::{BoxedService, ServiceId};

pub struct ServiceManager {
    registry: Arc<ServiceRegistry>,
    config: SpookConfig,
    env: ServiceEnv,
    registered: RwLock<Vec<ServiceId>>,
}

impl ServiceManager {
    pub fn new(registry: Arc<ServiceRegistry>, config: SpookConfig, env: ServiceEnv) -> Self {
        Self {
            registry,
            config,
            env,
            registered: RwLock::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Register every built-in service not disabled in the config
    pub async fn setup(&self) -> Result<usize> {
        self.setup_from(&builtin_services()).await
    }

    pub async fn setup_from(&self, factories: &[ServiceFactory]) -> Result<usize> {
        debug!("Setting up services");
        let mut count = 0;
        for factory in factories {
            let Some(service) = factory(&self.env) else {
                continue;
            };
            if self
                .config
                .is_service_disabled(service.domain(), service.service())
            {
                info!("Service {} disabled by configuration", service.id());
                continue;
            }
            self.register(service).await?;
            count += 1;
        }
        info!("Registered {} services", count);
        Ok(count)
    }

    /// Register one service and remember it for teardown
    pub async fn register(&self, service: BoxedService) -> Result<()> {
        let id = service.id();
        self.registry.register(service).await?;
        self.registered.write().await.push(id);
        Ok(())
    }

    /// Unregister every service this manager registered
    pub async fn teardown(&self) {
        debug!("Tearing down services");
        let ids: Vec<ServiceId> = self.registered.write().await.drain(..).collect();
        for id in ids {
            self.registry.unregister(&id.domain, &id.service).await;
        }
    }

    pub async fn registered(&self) -> Vec<ServiceId> {
        self.registered.read().await.clone()
    }
}
