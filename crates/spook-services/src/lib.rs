//! spook-services: extra hub services
//!
//! Features:
//! - `Service` trait with declarative argument schemas
//! - `ServiceRegistry` dispatching calls with admin checks and validation
//! - Built-in device and blueprint services
//! - `ServiceManager` registering built-ins on setup and removing them on teardown

pub mod builtin;
pub mod manager;
pub mod registry;
pub mod schema;
pub mod service;

pub use builtin::{builtin_services, ServiceEnv, ServiceFactory};
pub use manager::ServiceManager;
pub use registry::{ServiceDefinition, ServiceRegistry, ServiceStats};
pub use schema::{Field, FieldKind, ServiceSchema};
pub use service::{BoxedService, CallContext, Service, ServiceCall, ServiceId};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::schema::{FieldKind, ServiceSchema};
    pub use super::service::{BoxedService, CallContext, Service, ServiceCall};
    pub use spook_core::{Hub, Result};
}
