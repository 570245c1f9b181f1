//! metabuild-lib: a staged, incremental build engine for language
//! specification projects.
//!
//! - [`manager::BuildManager`] brings build requests up to date, re-running a
//!   builder only when a recorded input, sub-build result, or output changed.
//! - [`unit`] holds the persisted record of each request and the store it lives in.
//! - [`phase`] sequences a build into phases with hooks around each.
//! - [`langspec`] maps a project's `metabuild.yaml` onto concrete builders and
//!   exposes one entry point per phase.

pub mod builder;
pub mod consts;
pub mod fingerprint;
pub mod graph;
pub mod langspec;
pub mod manager;
pub mod phase;
pub mod store_lock;
pub mod tool;
pub mod unit;
pub mod util;
