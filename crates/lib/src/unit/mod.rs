//! Build units: the persisted record of one request's last execution.
//!
//! A unit stores the request it belongs to, every path and sub-build its body
//! required, every path it provided, and its terminal state. The build manager
//! compares these records against the current world to decide staleness.

mod store;
mod types;

pub use store::{UnitStore, UnitStoreError};
pub use types::{BuildDependency, BuildUnit, PathDependency, ResultStamp, UnitState};
