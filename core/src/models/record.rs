//! Name and namespace records
//!
//! The registry's persistent state. Records are created by registration or
//! import and afterwards only change through committed operations.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use serde::{Serialize, Deserialize};

use crate::crypto;
use crate::error::{CoreError, Result};
use super::domains;
use super::field::{FieldValue, NameField};
use super::operation::OpCode;

/// The registry's unit of state for one name
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRecord {
    /// Fully-qualified name
    pub name: String,

    /// Hash of the off-chain data (hex); cleared on revocation
    pub value_hash: Option<String>,

    /// Owner scriptPubKey (hex)
    pub sender: String,

    /// Owner public key (hex)
    pub sender_pubkey: Option<String>,

    /// Owner address
    pub address: String,

    /// Block the record was created in
    pub block_number: u64,

    /// Block the name was last preordered in
    pub preorder_block_number: u64,

    /// Block the current owner registered the name in
    pub first_registered: u64,

    /// Block the name was last renewed in
    pub last_renewed: u64,

    /// First block at which the name counts as expired
    pub expire_block: u64,

    /// Whether the name has been revoked
    pub revoked: bool,

    /// Opcode of the last operation applied
    pub op: OpCode,

    /// Transaction id of the last operation applied
    pub txid: String,

    /// Index within its block of the last operation's transaction
    pub vtxindex: u64,

    /// Burn fee paid by the last fee-paying operation
    pub op_fee: u64,

    /// Importer scriptPubKey, for imported names
    pub importer: Option<String>,

    /// Importer address, for imported names
    pub importer_address: Option<String>,

    /// Namespace identifier
    pub namespace_id: String,

    /// Consensus hash (hex) at the last operation
    pub consensus_hash: Option<String>,
}

impl Debug for NameRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("NameRecord")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("revoked", &self.revoked)
            .field("op", &self.op)
            .field("block_number", &self.block_number)
            .field("expire_block", &self.expire_block)
            .field("vtxindex", &self.vtxindex)
            .finish()
    }
}

impl NameRecord {
    /// Create the record of a freshly registered name
    pub fn registered(
        name: &str,
        namespace_id: &str,
        sender: &str,
        address: &str,
        block_number: u64,
        lifetime: u64,
        txid: &str,
        vtxindex: u64,
    ) -> Self {
        NameRecord {
            name: name.to_string(),
            value_hash: None,
            sender: sender.to_string(),
            sender_pubkey: None,
            address: address.to_string(),
            block_number,
            preorder_block_number: block_number,
            first_registered: block_number,
            last_renewed: block_number,
            expire_block: block_number.saturating_add(lifetime),
            revoked: false,
            op: OpCode::NameRegistration,
            txid: txid.to_string(),
            vtxindex,
            op_fee: 0,
            importer: None,
            importer_address: None,
            namespace_id: namespace_id.to_string(),
            consensus_hash: None,
        }
    }

    /// Read a field as a typed value
    pub fn field(&self, field: NameField) -> FieldValue {
        match field {
            NameField::Name => FieldValue::Text(self.name.clone()),
            NameField::ValueHash => FieldValue::from_opt_text(self.value_hash.as_deref()),
            NameField::Sender => FieldValue::Text(self.sender.clone()),
            NameField::SenderPubkey => FieldValue::from_opt_text(self.sender_pubkey.as_deref()),
            NameField::Address => FieldValue::Text(self.address.clone()),
            NameField::BlockNumber => FieldValue::Integer(self.block_number),
            NameField::PreorderBlockNumber => FieldValue::Integer(self.preorder_block_number),
            NameField::FirstRegistered => FieldValue::Integer(self.first_registered),
            NameField::LastRenewed => FieldValue::Integer(self.last_renewed),
            NameField::ExpireBlock => FieldValue::Integer(self.expire_block),
            NameField::Revoked => FieldValue::Boolean(self.revoked),
            NameField::Op => FieldValue::Text(self.op.as_char().to_string()),
            NameField::Txid => FieldValue::Text(self.txid.clone()),
            NameField::Vtxindex => FieldValue::Integer(self.vtxindex),
            NameField::OpFee => FieldValue::Integer(self.op_fee),
            NameField::Importer => FieldValue::from_opt_text(self.importer.as_deref()),
            NameField::ImporterAddress => FieldValue::from_opt_text(self.importer_address.as_deref()),
            NameField::NamespaceId => FieldValue::Text(self.namespace_id.clone()),
            NameField::ConsensusHash => FieldValue::from_opt_text(self.consensus_hash.as_deref()),
        }
    }

    /// Overwrite a field with a typed value
    ///
    /// A value of the wrong type means an operation staged something its
    /// field declaration cannot hold.
    pub fn set_field(&mut self, field: NameField, value: FieldValue) -> Result<()> {
        let mismatch = |value: &FieldValue| {
            CoreError::InvariantViolation(format!(
                "cannot store {} value in field {}",
                value.type_name(),
                field.as_str()
            ))
        };

        match (field, value) {
            (NameField::Name, FieldValue::Text(v)) => self.name = v,
            (NameField::Sender, FieldValue::Text(v)) => self.sender = v,
            (NameField::Address, FieldValue::Text(v)) => self.address = v,
            (NameField::Txid, FieldValue::Text(v)) => self.txid = v,
            (NameField::NamespaceId, FieldValue::Text(v)) => self.namespace_id = v,
            (NameField::Op, FieldValue::Text(v)) => {
                self.op = v
                    .chars()
                    .next()
                    .and_then(OpCode::from_char)
                    .ok_or_else(|| CoreError::InvariantViolation(format!("unknown opcode {:?}", v)))?;
            }
            (NameField::ValueHash, v @ (FieldValue::Text(_) | FieldValue::Null)) => {
                self.value_hash = opt_text(v)
            }
            (NameField::SenderPubkey, v @ (FieldValue::Text(_) | FieldValue::Null)) => {
                self.sender_pubkey = opt_text(v)
            }
            (NameField::Importer, v @ (FieldValue::Text(_) | FieldValue::Null)) => {
                self.importer = opt_text(v)
            }
            (NameField::ImporterAddress, v @ (FieldValue::Text(_) | FieldValue::Null)) => {
                self.importer_address = opt_text(v)
            }
            (NameField::ConsensusHash, v @ (FieldValue::Text(_) | FieldValue::Null)) => {
                self.consensus_hash = opt_text(v)
            }
            (NameField::BlockNumber, FieldValue::Integer(v)) => self.block_number = v,
            (NameField::PreorderBlockNumber, FieldValue::Integer(v)) => self.preorder_block_number = v,
            (NameField::FirstRegistered, FieldValue::Integer(v)) => self.first_registered = v,
            (NameField::LastRenewed, FieldValue::Integer(v)) => self.last_renewed = v,
            (NameField::ExpireBlock, FieldValue::Integer(v)) => self.expire_block = v,
            (NameField::Vtxindex, FieldValue::Integer(v)) => self.vtxindex = v,
            (NameField::OpFee, FieldValue::Integer(v)) => self.op_fee = v,
            (NameField::Revoked, FieldValue::Boolean(v)) => self.revoked = v,
            (_, other) => return Err(mismatch(&other)),
        }

        Ok(())
    }

    /// Snapshot the given fields, in the order given
    pub fn snapshot(&self, fields: impl IntoIterator<Item = NameField>) -> Vec<(NameField, FieldValue)> {
        fields.into_iter().map(|f| (f, self.field(f))).collect()
    }

    /// Whether the name is expired at `block_id`
    pub fn is_expired_at(&self, block_id: u64) -> bool {
        block_id >= self.expire_block
    }

    /// Domain-separated digest over `fields`, in the order given
    pub fn consensus_digest(&self, fields: &[NameField]) -> [u8; 32] {
        let encoded: Vec<Vec<u8>> = fields.iter().map(|f| self.field(*f).to_bytes()).collect();
        let slices: Vec<&[u8]> = encoded.iter().map(|e| e.as_slice()).collect();
        crypto::secure_hash_multiple(domains::NAME_RECORD, &slices)
    }
}

fn opt_text(value: FieldValue) -> Option<String> {
    match value {
        FieldValue::Text(v) => Some(v),
        _ => None,
    }
}

/// A namespace and its lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceRecord {
    /// Namespace identifier
    pub namespace_id: String,

    /// Block the namespace was revealed in
    pub reveal_block: u64,

    /// Block the namespace was launched in, once ready
    pub ready_block: Option<u64>,

    /// How many blocks a registration lasts
    pub lifetime: u64,
}

impl NamespaceRecord {
    /// A namespace that has been revealed but not launched
    pub fn revealed(namespace_id: &str, reveal_block: u64, lifetime: u64) -> Self {
        NamespaceRecord {
            namespace_id: namespace_id.to_string(),
            reveal_block,
            ready_block: None,
            lifetime,
        }
    }

    /// A namespace that is open for ordinary registrations
    pub fn ready(namespace_id: &str, reveal_block: u64, ready_block: u64, lifetime: u64) -> Self {
        NamespaceRecord {
            namespace_id: namespace_id.to_string(),
            reveal_block,
            ready_block: Some(ready_block),
            lifetime,
        }
    }

    /// Whether the namespace has left the import phase
    pub fn is_ready(&self) -> bool {
        self.ready_block.is_some()
    }
}
