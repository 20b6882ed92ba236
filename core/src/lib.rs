//! # Name Registry Core
//!
//! Core data structures and protocol rules for the name registry.
//! This crate provides the building blocks every operation type shares:
//! name validation, fee rules, script and address handling, the record and
//! field-set model, and domain-separated consensus hashing.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod crypto;
pub mod error;
pub mod fees;
pub mod models;
pub mod names;
pub mod script;
pub mod utils;

/// Re-export common types for ease of use
pub use config::{Network, ProtocolConfig};
pub use error::{CoreError, ExtractionError, Result};
pub use fees::FeePolicy;
pub use models::{
    FieldMask, FieldSets, FieldValue, Fees, NameField, NameRecord, NamespaceRecord, OpCode,
    OperationPayload, OperationRecord, StagedMutations, TransactionContext,
};
pub use names::NameRules;

/// Version of the core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Create a domain-separated secure hash
///
/// # Arguments
///
/// * `domain` - Domain prefix (e.g., "NAMEREG_RECORD", "NAMEREG_CONSENSUS")
/// * `data` - Data to hash
///
/// # Returns
///
/// A 32-byte secure hash with domain separation
pub fn secure_hash(domain: &str, data: &[u8]) -> [u8; 32] {
    crypto::secure_hash(domain, data)
}

/// Create a domain-separated secure hash of multiple inputs
///
/// # Arguments
///
/// * `domain` - Domain prefix (e.g., "NAMEREG_RECORD", "NAMEREG_CONSENSUS")
/// * `data` - Vector of data to hash
///
/// # Returns
///
/// A 32-byte secure hash with domain separation
pub fn secure_hash_multiple(domain: &str, data: &[&[u8]]) -> [u8; 32] {
    crypto::secure_hash_multiple(domain, data)
}
