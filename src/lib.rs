//! Name Registry - consensus-critical operation processing for a
//! blockchain-anchored name registry
//!
//! This is the root crate that provides workspace-level documentation.
//! Actual implementation is in the subcrates:
//! - `namereg-core`: Names, fees, scripts, records and consensus hashing
//! - `namereg-operations`: Operation handlers, the registry and replay

pub use namereg_core;
pub use namereg_operations;

/// Returns the version of the package.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
