//! In-flight operation representation
//!
//! An [`OperationRecord`] is what a confirmed transaction becomes once its
//! payload has been decoded. It is validated, possibly staged with field
//! mutations, committed, and then dropped; only its effect on the name
//! record is persisted.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use serde::{Serialize, Deserialize};

use super::field::{FieldMask, StagedMutations};

/// Operation codes of the registry protocol, with their wire bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OpCode {
    /// `?` commit to a name without revealing it
    NamePreorder,
    /// `:` reveal and register a preordered name
    NameRegistration,
    /// `+` point a name at new off-chain data
    NameUpdate,
    /// `>` hand a name to a new owner
    NameTransfer,
    /// `~` permanently disable a name
    NameRevoke,
    /// `;` import a name into a namespace being bootstrapped
    NameImport,
    /// `*` commit to a namespace without revealing it
    NamespacePreorder,
    /// `&` reveal a namespace and its pricing rules
    NamespaceReveal,
    /// `!` open a namespace for registrations
    NamespaceReady,
    /// `#` broadcast an announcement
    Announce,
}

impl OpCode {
    /// Every opcode
    pub const ALL: [OpCode; 10] = [
        OpCode::NamePreorder,
        OpCode::NameRegistration,
        OpCode::NameUpdate,
        OpCode::NameTransfer,
        OpCode::NameRevoke,
        OpCode::NameImport,
        OpCode::NamespacePreorder,
        OpCode::NamespaceReveal,
        OpCode::NamespaceReady,
        OpCode::Announce,
    ];

    /// Wire character
    pub const fn as_char(&self) -> char {
        match self {
            OpCode::NamePreorder => '?',
            OpCode::NameRegistration => ':',
            OpCode::NameUpdate => '+',
            OpCode::NameTransfer => '>',
            OpCode::NameRevoke => '~',
            OpCode::NameImport => ';',
            OpCode::NamespacePreorder => '*',
            OpCode::NamespaceReveal => '&',
            OpCode::NamespaceReady => '!',
            OpCode::Announce => '#',
        }
    }

    /// Wire byte
    pub const fn as_byte(&self) -> u8 {
        self.as_char() as u8
    }

    /// Look up an opcode by wire character
    pub fn from_char(c: char) -> Option<OpCode> {
        OpCode::ALL.into_iter().find(|op| op.as_char() == c)
    }

    /// Look up an opcode by wire byte
    pub fn from_byte(b: u8) -> Option<OpCode> {
        OpCode::from_char(b as char)
    }

    /// Protocol name, e.g. `NAME_REVOKE`
    pub const fn name(&self) -> &'static str {
        match self {
            OpCode::NamePreorder => "NAME_PREORDER",
            OpCode::NameRegistration => "NAME_REGISTRATION",
            OpCode::NameUpdate => "NAME_UPDATE",
            OpCode::NameTransfer => "NAME_TRANSFER",
            OpCode::NameRevoke => "NAME_REVOKE",
            OpCode::NameImport => "NAME_IMPORT",
            OpCode::NamespacePreorder => "NAMESPACE_PREORDER",
            OpCode::NamespaceReveal => "NAMESPACE_REVEAL",
            OpCode::NamespaceReady => "NAMESPACE_READY",
            OpCode::Announce => "ANNOUNCE",
        }
    }
}

/// Decoded payload fields, one variant per implemented operation type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationPayload {
    /// `NAME_REVOKE`: the body is the raw fully-qualified name
    Revoke {
        /// Name being revoked
        name: String,
    },
}

impl OperationPayload {
    /// Opcode this payload belongs to
    pub fn opcode(&self) -> OpCode {
        match self {
            OperationPayload::Revoke { .. } => OpCode::NameRevoke,
        }
    }

    /// Name the operation acts on
    pub fn name(&self) -> &str {
        match self {
            OperationPayload::Revoke { name } => name,
        }
    }
}

/// Fees implied by a transaction's output shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fees {
    /// Minimum miner fee covering dust outputs and the data carrier
    pub dust_fee: u64,

    /// Operation-specific burn fee
    pub op_fee: u64,
}

/// One parsed, not yet committed operation
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Operation code
    pub opcode: OpCode,

    /// Decoded payload
    pub payload: OperationPayload,

    /// scriptPubKey (hex) of the first input, the authorizing principal
    pub sender: String,

    /// Address of the first input
    pub address: String,

    /// Public key of the sender, when recoverable
    pub sender_pubkey: Option<String>,

    /// Transaction id
    pub txid: String,

    /// Index of the transaction within its block
    pub vtxindex: u64,

    /// Height of the block containing the transaction
    pub block_id: u64,

    /// Mutations staged by a successful check
    pub staged: StagedMutations,
}

impl Debug for OperationRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("OperationRecord")
            .field("op", &self.opcode.name())
            .field("name", &self.payload.name())
            .field("address", &self.address)
            .field("txid", &self.txid)
            .field("block", &self.block_id)
            .field("vtxindex", &self.vtxindex)
            .field("staged", &self.staged.len())
            .finish()
    }
}

impl OperationRecord {
    /// Create an operation record with nothing staged
    pub fn new(
        payload: OperationPayload,
        sender: String,
        address: String,
        sender_pubkey: Option<String>,
        txid: String,
        vtxindex: u64,
        block_id: u64,
        mutate_fields: FieldMask,
    ) -> Self {
        OperationRecord {
            opcode: payload.opcode(),
            payload,
            sender,
            address,
            sender_pubkey,
            txid,
            vtxindex,
            block_id,
            staged: StagedMutations::new(mutate_fields),
        }
    }

    /// Name the operation acts on
    pub fn name(&self) -> &str {
        self.payload.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_wire_bytes_are_unique() {
        for op in OpCode::ALL {
            assert_eq!(OpCode::from_byte(op.as_byte()), Some(op));
        }
        assert_eq!(OpCode::NameRevoke.as_byte(), b'~');
        assert_eq!(OpCode::from_byte(b'z'), None);
    }

    #[test]
    fn test_payload_accessors() {
        let payload = OperationPayload::Revoke { name: "alice.id".to_string() };
        assert_eq!(payload.opcode(), OpCode::NameRevoke);
        assert_eq!(payload.name(), "alice.id");
    }

    #[test]
    fn test_operation_record_starts_unstaged() {
        let op = OperationRecord::new(
            OperationPayload::Revoke { name: "alice.id".to_string() },
            "76a914aa88ac".to_string(),
            "1Alice".to_string(),
            None,
            "ab".to_string(),
            2,
            500,
            FieldMask::EMPTY,
        );
        assert_eq!(op.opcode, OpCode::NameRevoke);
        assert_eq!(op.name(), "alice.id");
        assert!(op.staged.is_empty());
    }
}
