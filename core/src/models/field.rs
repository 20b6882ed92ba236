//! Name record fields and the per-operation field sets
//!
//! Every attribute of a [`NameRecord`](super::NameRecord) is named by a
//! [`NameField`]. Operation types declare three static sets over these:
//! the ordered consensus fields, the fields they may mutate, and the fields
//! the registry must snapshot before applying them.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use serde::{Serialize, Deserialize};

use crate::error::{CoreError, Result};

/// A name record attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum NameField {
    /// The fully-qualified name
    Name = 0,
    /// Hash of the off-chain data the name points at
    ValueHash = 1,
    /// Owner scriptPubKey (hex)
    Sender = 2,
    /// Owner public key (hex), when known
    SenderPubkey = 3,
    /// Owner address
    Address = 4,
    /// Block the record was created in
    BlockNumber = 5,
    /// Block the name was last preordered in
    PreorderBlockNumber = 6,
    /// Block the current owner registered the name in
    FirstRegistered = 7,
    /// Block the name was last renewed in
    LastRenewed = 8,
    /// First block at which the name is expired
    ExpireBlock = 9,
    /// Whether the name is revoked
    Revoked = 10,
    /// Opcode of the last operation
    Op = 11,
    /// Transaction id of the last operation
    Txid = 12,
    /// Index in its block of the last operation's transaction
    Vtxindex = 13,
    /// Burn fee paid by the last fee-paying operation
    OpFee = 14,
    /// Importer scriptPubKey, for imported names
    Importer = 15,
    /// Importer address, for imported names
    ImporterAddress = 16,
    /// Namespace the name lives in
    NamespaceId = 17,
    /// Consensus hash at the time of the last operation
    ConsensusHash = 18,
}

impl NameField {
    /// Every field, in declaration order
    pub const ALL: [NameField; 19] = [
        NameField::Name,
        NameField::ValueHash,
        NameField::Sender,
        NameField::SenderPubkey,
        NameField::Address,
        NameField::BlockNumber,
        NameField::PreorderBlockNumber,
        NameField::FirstRegistered,
        NameField::LastRenewed,
        NameField::ExpireBlock,
        NameField::Revoked,
        NameField::Op,
        NameField::Txid,
        NameField::Vtxindex,
        NameField::OpFee,
        NameField::Importer,
        NameField::ImporterAddress,
        NameField::NamespaceId,
        NameField::ConsensusHash,
    ];

    /// Field name as it appears in archived records
    pub fn as_str(&self) -> &'static str {
        match self {
            NameField::Name => "name",
            NameField::ValueHash => "value_hash",
            NameField::Sender => "sender",
            NameField::SenderPubkey => "sender_pubkey",
            NameField::Address => "address",
            NameField::BlockNumber => "block_number",
            NameField::PreorderBlockNumber => "preorder_block_number",
            NameField::FirstRegistered => "first_registered",
            NameField::LastRenewed => "last_renewed",
            NameField::ExpireBlock => "expire_block",
            NameField::Revoked => "revoked",
            NameField::Op => "op",
            NameField::Txid => "txid",
            NameField::Vtxindex => "vtxindex",
            NameField::OpFee => "op_fee",
            NameField::Importer => "importer",
            NameField::ImporterAddress => "importer_address",
            NameField::NamespaceId => "namespace_id",
            NameField::ConsensusHash => "consensus_hash",
        }
    }

    const fn bit(self) -> u32 {
        1 << (self as u8)
    }
}

/// A typed field value
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Text (names, scripts, addresses, hex digests)
    Text(String),

    /// Unsigned integer (heights, indices, fees)
    Integer(u64),

    /// Boolean flag
    Boolean(bool),

    /// Absent optional value
    Null,
}

impl Debug for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FieldValue::Text(v) => {
                if v.len() > 20 {
                    let head: String = v.chars().take(20).collect();
                    write!(f, "Text(\"{}...\")", head)
                } else {
                    write!(f, "Text(\"{}\")", v)
                }
            }
            FieldValue::Integer(v) => write!(f, "Integer({})", v),
            FieldValue::Boolean(v) => write!(f, "Boolean({})", v),
            FieldValue::Null => write!(f, "Null"),
        }
    }
}

impl FieldValue {
    /// Wrap an optional string, mapping `None` to `Null`
    pub fn from_opt_text(value: Option<&str>) -> Self {
        match value {
            Some(v) => FieldValue::Text(v.to_string()),
            None => FieldValue::Null,
        }
    }

    /// Tagged byte encoding used for consensus hashing
    ///
    /// The leading tag keeps `Null`, `Text("")` and `Integer(0)` distinct.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            FieldValue::Null => vec![0],
            FieldValue::Text(v) => {
                let mut out = Vec::with_capacity(v.len() + 1);
                out.push(1);
                out.extend_from_slice(v.as_bytes());
                out
            }
            FieldValue::Integer(v) => {
                let mut out = vec![2];
                out.extend_from_slice(&v.to_be_bytes());
                out
            }
            FieldValue::Boolean(v) => vec![3, u8::from(*v)],
        }
    }

    /// Short type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Integer(_) => "integer",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Null => "null",
        }
    }
}

/// A set of fields, stored as a bitmask
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FieldMask(u32);

impl FieldMask {
    /// The empty set
    pub const EMPTY: FieldMask = FieldMask(0);

    /// Build a mask from a list of fields
    pub const fn of(fields: &[NameField]) -> Self {
        let mut bits = 0u32;
        let mut i = 0;
        while i < fields.len() {
            bits |= fields[i].bit();
            i += 1;
        }
        FieldMask(bits)
    }

    /// Set union
    pub const fn union(self, other: FieldMask) -> Self {
        FieldMask(self.0 | other.0)
    }

    /// Add a single field
    pub const fn with(self, field: NameField) -> Self {
        FieldMask(self.0 | field.bit())
    }

    /// Membership test
    pub const fn contains(&self, field: NameField) -> bool {
        self.0 & field.bit() != 0
    }

    /// Whether every field of `other` is also in `self`
    pub const fn is_superset_of(&self, other: &FieldMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Number of fields in the set
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Fields in the set, in declaration order
    pub fn iter(&self) -> impl Iterator<Item = NameField> + '_ {
        NameField::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

impl Debug for FieldMask {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_set().entries(self.iter().map(|field| field.as_str())).finish()
    }
}

/// Consensus fields of a name record. Order is part of consensus.
pub const NAME_RECORD_CONSENSUS_FIELDS: &[NameField] = &[
    NameField::Name,
    NameField::ValueHash,
    NameField::Sender,
    NameField::SenderPubkey,
    NameField::Address,
    NameField::BlockNumber,
    NameField::PreorderBlockNumber,
    NameField::FirstRegistered,
    NameField::LastRenewed,
    NameField::Revoked,
    NameField::Op,
    NameField::Txid,
    NameField::Vtxindex,
    NameField::OpFee,
    NameField::Importer,
    NameField::ImporterAddress,
];

/// Fields every name operation rewrites
pub const NAME_RECORD_MUTATE_FIELDS: FieldMask =
    FieldMask::of(&[NameField::Op, NameField::Txid, NameField::Vtxindex]);

/// Fields every name operation snapshots before mutating
pub const NAME_RECORD_BACKUP_FIELDS: FieldMask = FieldMask::EMPTY;

/// The static field declarations of one operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSets {
    /// Ordered consensus-hash fields
    pub consensus: &'static [NameField],

    /// Fields the operation may change
    pub mutate: FieldMask,

    /// Fields to archive before applying the operation
    pub backup: FieldMask,
}

impl FieldSets {
    /// Check the declaration invariants
    ///
    /// A failure here is a defect in the operation type, never a property
    /// of chain data, so it is reported as an invariant violation.
    pub fn validate(&self) -> Result<()> {
        if !self.backup.is_superset_of(&self.mutate) {
            let missing: Vec<&str> = self
                .mutate
                .iter()
                .filter(|f| !self.backup.contains(*f))
                .map(|f| f.as_str())
                .collect();
            return Err(CoreError::InvariantViolation(format!(
                "backup fields do not cover mutate fields: missing {:?}",
                missing
            )));
        }

        if self.consensus.is_empty() {
            return Err(CoreError::InvariantViolation(
                "consensus field list is empty".to_string(),
            ));
        }

        let mut seen = FieldMask::EMPTY;
        for field in self.consensus {
            if seen.contains(*field) {
                return Err(CoreError::InvariantViolation(format!(
                    "consensus field {} listed twice",
                    field.as_str()
                )));
            }
            seen = seen.with(*field);
        }

        Ok(())
    }
}

/// Field mutations staged by a successful state-transition check
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StagedMutations {
    allowed: FieldMask,
    changes: Vec<(NameField, FieldValue)>,
}

impl StagedMutations {
    /// Create an empty staging area limited to `allowed`
    pub fn new(allowed: FieldMask) -> Self {
        StagedMutations {
            allowed,
            changes: Vec::new(),
        }
    }

    /// Stage a new value for `field`, replacing any earlier one
    pub fn stage(&mut self, field: NameField, value: FieldValue) -> Result<()> {
        if !self.allowed.contains(field) {
            return Err(CoreError::InvariantViolation(format!(
                "field {} is not declared as mutable by this operation",
                field.as_str()
            )));
        }

        match self.changes.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = value,
            None => self.changes.push((field, value)),
        }
        Ok(())
    }

    /// Value staged for `field`, if any
    pub fn get(&self, field: NameField) -> Option<&FieldValue> {
        self.changes
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v)
    }

    /// Staged changes in staging order
    pub fn iter(&self) -> impl Iterator<Item = &(NameField, FieldValue)> {
        self.changes.iter()
    }

    /// Fields this staging area accepts
    pub fn allowed(&self) -> FieldMask {
        self.allowed
    }

    /// Number of staged changes
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Whether nothing has been staged
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Drop all staged changes
    pub fn clear(&mut self) {
        self.changes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_fields_have_distinct_bits() {
        let mask = FieldMask::of(&NameField::ALL);
        assert_eq!(mask.len(), NameField::ALL.len());
        assert_eq!(mask.iter().collect::<Vec<_>>(), NameField::ALL.to_vec());
    }

    #[test]
    fn test_mask_operations() {
        let a = FieldMask::of(&[NameField::Revoked, NameField::ValueHash]);
        let b = FieldMask::of(&[NameField::Revoked]);

        assert!(a.is_superset_of(&b));
        assert!(!b.is_superset_of(&a));
        assert!(a.is_superset_of(&FieldMask::EMPTY));
        assert!(a.union(b) == a);
        assert!(b.with(NameField::ValueHash) == a);
        assert!(!a.contains(NameField::Name));
        assert!(FieldMask::EMPTY.is_empty());
    }

    #[test]
    fn test_mask_iterates_in_declaration_order() {
        let mask = FieldMask::of(&[NameField::Vtxindex, NameField::Name, NameField::Op]);
        let fields: Vec<_> = mask.iter().collect();
        assert_eq!(fields, vec![NameField::Name, NameField::Op, NameField::Vtxindex]);
    }

    #[test]
    fn test_field_sets_validation() {
        let good = FieldSets {
            consensus: NAME_RECORD_CONSENSUS_FIELDS,
            mutate: NAME_RECORD_MUTATE_FIELDS,
            backup: NAME_RECORD_MUTATE_FIELDS.with(NameField::ConsensusHash),
        };
        assert!(good.validate().is_ok());

        let uncovered = FieldSets {
            consensus: NAME_RECORD_CONSENSUS_FIELDS,
            mutate: NAME_RECORD_MUTATE_FIELDS.with(NameField::Revoked),
            backup: NAME_RECORD_MUTATE_FIELDS,
        };
        let err = uncovered.validate().unwrap_err();
        assert!(err.is_invariant_violation());
        assert!(err.to_string().contains("revoked"));

        let duplicated = FieldSets {
            consensus: &[NameField::Name, NameField::Name],
            mutate: FieldMask::EMPTY,
            backup: FieldMask::EMPTY,
        };
        assert!(duplicated.validate().is_err());
    }

    #[test]
    fn test_staging_respects_mask() {
        let mut staged = StagedMutations::new(FieldMask::of(&[NameField::Revoked]));
        staged.stage(NameField::Revoked, FieldValue::Boolean(true)).unwrap();
        staged.stage(NameField::Revoked, FieldValue::Boolean(false)).unwrap();

        assert_eq!(staged.len(), 1);
        assert_eq!(staged.get(NameField::Revoked), Some(&FieldValue::Boolean(false)));

        let err = staged.stage(NameField::Sender, FieldValue::Null).unwrap_err();
        assert!(err.is_invariant_violation());
        assert_eq!(staged.len(), 1);

        staged.clear();
        assert!(staged.is_empty());
    }

    #[test]
    fn test_value_encoding_is_tagged() {
        assert_ne!(FieldValue::Null.to_bytes(), FieldValue::Text(String::new()).to_bytes());
        assert_ne!(FieldValue::Integer(0).to_bytes(), FieldValue::Boolean(false).to_bytes());
        assert_eq!(FieldValue::from_opt_text(None), FieldValue::Null);
        assert_eq!(
            FieldValue::from_opt_text(Some("ab")),
            FieldValue::Text("ab".to_string())
        );
    }
}
