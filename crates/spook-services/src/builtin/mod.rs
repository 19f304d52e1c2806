//! Built-in services
//!
//! [`builtin_services`] lists every service shipped with spook. Services that
//! need collaborators the hub was not given (such as a blueprint source) are
//! left out.

pub mod blueprint;
mod device;

pub use blueprint::{
    Blueprint, BlueprintError, BlueprintImport, BlueprintSource, BlueprintStore,
    DirectoryBlueprintStore, ImportedBlueprint,
};
pub use device::{DisableDevice, EnableDevice};

use std::sync::Arc;

use crate::service::BoxedService;

/// Collaborators available to built-in services
#[derive(Clone, Default)]
pub struct ServiceEnv {
    pub blueprint_source: Option<Arc<dyn BlueprintSource>>,
    pub blueprint_store: Option<Arc<dyn BlueprintStore>>,
}

/// Constructor of a service instance; `None` when its collaborators are missing
pub type ServiceFactory = fn(&ServiceEnv) -> Option<BoxedService>;

fn enable_device(_env: &ServiceEnv) -> Option<BoxedService> {
    Some(EnableDevice::boxed())
}

fn disable_device(_env: &ServiceEnv) -> Option<BoxedService> {
    Some(DisableDevice::boxed())
}

fn blueprint_import(env: &ServiceEnv) -> Option<BoxedService> {
    let source = env.blueprint_source.clone()?;
    let store = env.blueprint_store.clone()?;
    Some(Arc::new(BlueprintImport::new(source, store)))
}

/// All built-in services
pub fn builtin_services() -> Vec<ServiceFactory> {
    vec![enable_device, disable_device, blueprint_import]
}
