//! Data models for the name registry
//!
//! This module provides the registry's persistent records, the in-flight
//! operation representation, the field-set model, and the transaction
//! metadata handed over by the chain-sync layer.

mod field;
mod record;
mod operation;
mod transaction;

pub use field::{
    FieldMask, FieldSets, FieldValue, NameField, StagedMutations,
    NAME_RECORD_BACKUP_FIELDS, NAME_RECORD_CONSENSUS_FIELDS, NAME_RECORD_MUTATE_FIELDS,
};
pub use record::{NameRecord, NamespaceRecord};
pub use operation::{Fees, OpCode, OperationPayload, OperationRecord};
pub use transaction::{ScriptType, SenderInfo, TransactionContext, TxInput, TxOutput, Unspent};

/// Domain constants for consensus hashing
pub mod domains {
    /// Domain for a name record's consensus digest
    pub const NAME_RECORD: &str = "NAMEREG_RECORD";

    /// Domain for a committed operation's digest
    pub const OPERATION: &str = "NAMEREG_OPERATION";

    /// Domain for the per-block rolling consensus hash
    pub const CONSENSUS: &str = "NAMEREG_CONSENSUS";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto;

    #[test]
    fn test_domain_separation() {
        let data = b"test data";

        let record_hash = crypto::secure_hash(domains::NAME_RECORD, data);
        let operation_hash = crypto::secure_hash(domains::OPERATION, data);
        let consensus_hash = crypto::secure_hash(domains::CONSENSUS, data);

        assert_ne!(record_hash, operation_hash);
        assert_ne!(record_hash, consensus_hash);
        assert_ne!(operation_hash, consensus_hash);
    }
}
