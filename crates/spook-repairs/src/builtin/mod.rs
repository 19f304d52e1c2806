//! Built-in repairs
//!
//! Every repair shipped with spook is listed in [`builtin_repairs`]; the
//! manager instantiates each entry once at setup.

mod disabled_devices;
mod unknown_area_references;

pub use disabled_devices::DisabledDevices;
pub use unknown_area_references::UnknownAreaReferences;

use crate::repair::BoxedRepair;

/// Constructor of a repair instance
pub type RepairFactory = fn() -> BoxedRepair;

/// All built-in repairs
pub fn builtin_repairs() -> Vec<RepairFactory> {
    vec![UnknownAreaReferences::boxed, DisabledDevices::boxed]
}
