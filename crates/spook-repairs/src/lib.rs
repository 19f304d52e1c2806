//! spook-repairs: diagnostic checks that surface actionable issues
//!
//! Features:
//! - `Repair` trait with single-shot and debounced inspection modes
//! - Trailing-edge `Debouncer` guarding inspections against event bursts
//! - `RepairManager` activating repairs from a static table and removing
//!   their issues on teardown

pub mod builtin;
pub mod debounce;
pub mod lifecycle;
pub mod manager;
pub mod repair;

pub use builtin::{builtin_repairs, RepairFactory};
pub use debounce::Debouncer;
pub use lifecycle::{ManagedRepair, RepairState};
pub use manager::RepairManager;
pub use repair::{BoxedRepair, InspectMode, IssueSpec, Repair, RepairContext, RepairId};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::repair::{BoxedRepair, InspectMode, IssueSpec, Repair, RepairContext};
    pub use spook_core::{Hub, IssueSeverity, Result};
}
