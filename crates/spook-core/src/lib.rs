//! Core types for spook
//!
//! # Modules
//!
//! - `config`: Environment loading and `SpookConfig`
//! - `device`: Device and area registries
//! - `error`: Error types and Result alias
//! - `event`: Event bus and subscriptions
//! - `hub`: The `Hub` handle passed to repairs and services
//! - `issue`: Issue registry and the `IssueSink` trait

pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod hub;
pub mod issue;

// Re-exports
pub use config::SpookConfig;
pub use device::{Area, AreaRegistry, Device, DeviceRegistry, DisabledBy};
pub use error::{Error, Result};
pub use event::{Event, EventBus, Subscription};
pub use hub::{HostState, Hub, DOMAIN};
pub use issue::{CreateIssue, Issue, IssueRegistry, IssueSeverity, IssueSink};
