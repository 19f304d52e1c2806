//! Service registry: the hub's dispatch table for service calls

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use spook_core::{Error, Hub, Result};

use crate::schema::ServiceSchema;
use crate::service::{BoxedService, CallContext, ServiceCall, ServiceId};

/// Listing entry for a registered service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub domain: String,
    pub service: String,
    pub admin: bool,
    pub schema: Value,
}

struct RegisteredService {
    service: BoxedService,
    schema: ServiceSchema,
    calls: AtomicU64,
    failures: AtomicU64,
}

/// Call statistics for one service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub calls: u64,
    pub failures: u64,
}

/// Registered services keyed by `domain.service`
pub struct ServiceRegistry {
    hub: Hub,
    services: RwLock<BTreeMap<ServiceId, Arc<RegisteredService>>>,
}

impl ServiceRegistry {
    pub fn new(hub: Hub) -> Self {
        Self {
            hub,
            services: RwLock::new(BTreeMap::new()),
        }
    }

    pub async fn register(&self, service: BoxedService) -> Result<()> {
        let id = service.id();
        let mut services = self.services.write().await;
        if services.contains_key(&id) {
            return Err(Error::AlreadyRegistered(format!("service {}", id)));
        }
        let schema = service.schema();
        services.insert(
            id.clone(),
            Arc::new(RegisteredService {
                service,
                schema,
                calls: AtomicU64::new(0),
                failures: AtomicU64::new(0),
            }),
        );
        debug!("Registered service: {}", id);
        Ok(())
    }

    /// Remove a service; returns whether it was registered
    pub async fn unregister(&self, domain: &str, service: &str) -> bool {
        let id = ServiceId::new(domain, service);
        let removed = self.services.write().await.remove(&id).is_some();
        if removed {
            debug!("Unregistered service: {}", id);
        }
        removed
    }

    pub async fn has(&self, domain: &str, service: &str) -> bool {
        self.services
            .read()
            .await
            .contains_key(&ServiceId::new(domain, service))
    }

    pub async fn list(&self) -> Vec<ServiceDefinition> {
        self.services
            .read()
            .await
            .iter()
            .map(|(id, registered)| ServiceDefinition {
                domain: id.domain.clone(),
                service: id.service.clone(),
                admin: registered.service.admin(),
                schema: registered.schema.to_json_schema(),
            })
            .collect()
    }

    pub async fn stats(&self, domain: &str, service: &str) -> Option<ServiceStats> {
        self.services
            .read()
            .await
            .get(&ServiceId::new(domain, service))
            .map(|r| ServiceStats {
                calls: r.calls.load(Ordering::Relaxed),
                failures: r.failures.load(Ordering::Relaxed),
            })
    }

    /// Validate `data` against the service schema and dispatch the call
    pub async fn call(
        &self,
        domain: &str,
        service: &str,
        data: Value,
        context: CallContext,
    ) -> Result<Value> {
        let id = ServiceId::new(domain, service);
        let registered = self
            .services
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::ServiceNotFound(id.to_string()))?;

        registered.calls.fetch_add(1, Ordering::Relaxed);
        let result = self.dispatch(&registered, &id, data, context).await;
        if let Err(e) = &result {
            registered.failures.fetch_add(1, Ordering::Relaxed);
            warn!("Service {} failed: {}", id, e);
        }
        result
    }

    async fn dispatch(
        &self,
        registered: &RegisteredService,
        id: &ServiceId,
        data: Value,
        context: CallContext,
    ) -> Result<Value> {
        if registered.service.admin() && !context.may_call_admin() {
            return Err(Error::Unauthorized(format!(
                "service {} requires an admin user",
                id
            )));
        }

        let data = registered.schema.validate(&data)?;
        let call = ServiceCall {
            domain: id.domain.clone(),
            service: id.service.clone(),
            data,
            context,
        };
        debug!("Calling service {} ({})", id, call.context.id);
        registered.service.handle(&self.hub, &call).await
    }
}
