//! Error types for the core crate
//!
//! Errors are split by how far they are allowed to travel. Operations that
//! are simply not valid registry operations never show up here: they are
//! reported as `false` or `None` by the codecs and validators. What remains
//! is structural breakage of a single transaction (`Extraction`), bad
//! caller input (`InvalidInput`), and programming defects
//! (`InvariantViolation`).

use thiserror::Error;
use std::io;

/// Failure to turn a confirmed transaction into an operation record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The transaction has no inputs, so there is no authorizing principal
    #[error("Transaction {0} has no senders")]
    NoSenders(String),

    /// The first input does not carry a scriptPubKey
    #[error("First input of transaction {0} has no script")]
    MissingScript(String),

    /// The first input does not decode to an address
    #[error("First input of transaction {0} has no address")]
    MissingAddress(String),

    /// The payload body did not parse for the claimed opcode
    #[error("Transaction {0} carries an invalid payload")]
    InvalidPayload(String),
}

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    /// Caller supplied data that cannot be encoded
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transaction could not be represented as an operation
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// A static protocol invariant does not hold
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Inputs do not cover the requested outputs and fees
    #[error("Insufficient funds: have {available}, need {required}")]
    InsufficientFunds {
        /// Total value of the inputs
        available: u64,
        /// Value of the outputs plus fees
        required: u64,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Bincode error
    #[error("Bincode error: {0}")]
    BincodeError(#[from] bincode::Error),

    /// Hex decoding error
    #[error("Hex decoding error: {0}")]
    HexError(#[from] hex::FromHexError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Registry state error
    #[error("State management error: {0}")]
    StateError(String),
}

/// Result type for the core crate
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Whether this error signals a defect rather than a bad transaction
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, CoreError::InvariantViolation(_))
    }
}
