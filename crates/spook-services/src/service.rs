//! Core service trait and call types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use spook_core::{Hub, Result};

use crate::schema::ServiceSchema;

/// Who issued a service call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    pub id: Uuid,
    /// `None` for calls made by the hub itself
    pub user_id: Option<String>,
    pub is_admin: bool,
}

impl CallContext {
    /// Internal call, not tied to a user
    pub fn system() -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: None,
            is_admin: false,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: Some(user_id.into()),
            is_admin: true,
        }
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: Some(user_id.into()),
            is_admin: false,
        }
    }

    /// Admin services accept internal calls and calls from admin users
    pub fn may_call_admin(&self) -> bool {
        self.user_id.is_none() || self.is_admin
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::system()
    }
}

/// A validated service call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCall {
    pub domain: String,
    pub service: String,
    pub data: Map<String, Value>,
    pub context: CallContext,
}

impl ServiceCall {
    /// String field that validation guarantees to be present
    pub fn str(&self, key: &str) -> Result<&str> {
        self.data
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| spook_core::Error::invalid_argument(format!("missing '{}'", key)))
    }
}

/// `domain.service` identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceId {
    pub domain: String,
    pub service: String,
}

impl ServiceId {
    pub fn new(domain: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.service)
    }
}

/// Core trait every service implements
#[async_trait]
pub trait Service: Send + Sync {
    /// Domain the service is registered under
    fn domain(&self) -> &str;

    /// Service name within the domain
    fn service(&self) -> &str;

    /// Admin-only services reject calls from non-admin users
    fn admin(&self) -> bool {
        false
    }

    fn schema(&self) -> ServiceSchema {
        ServiceSchema::empty()
    }

    /// Handle a call whose data already passed `schema`
    async fn handle(&self, hub: &Hub, call: &ServiceCall) -> Result<Value>;

    fn id(&self) -> ServiceId {
        ServiceId::new(self.domain(), self.service())
    }
}

/// Shared service handle
pub type BoxedService = Arc<dyn Service>;
