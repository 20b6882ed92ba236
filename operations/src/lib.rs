//! # Name Registry Operations
//!
//! Consensus-critical processing of registry operations: wire codecs,
//! transaction extraction, fee validation, state-transition checks, the
//! commit/rollback contract and historical replay.
//!
//! Processing is block-sequential and single-threaded. Each transaction is
//! checked against the registry as left by every earlier transaction in
//! the same block.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod db;
pub mod framing;
pub mod memory;
pub mod operation;
pub mod registry;
pub mod replay;
pub mod revoke;

/// Re-export common types for ease of use
pub use db::{NameDb, NameStore};
pub use memory::{BlockEntry, HistoryEntry, MemoryNameDb};
pub use operation::NameOperation;
pub use registry::{BlockOutcome, OperationRegistry};
pub use revoke::NameRevoke;

/// Version of the operations crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
