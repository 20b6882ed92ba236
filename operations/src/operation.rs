//! The operation handler interface
//!
//! Each operation type of the protocol implements [`NameOperation`]: the
//! wire codec, transaction extraction, fee rule, state-transition check,
//! field declarations and historical reconstruction for that one opcode.

use namereg_core::error::ExtractionError;
use namereg_core::models::domains;
use namereg_core::models::{TxInput, TxOutput};
use namereg_core::{
    crypto, FieldSets, FieldValue, Fees, NameField, NameRecord, OpCode, OperationPayload,
    OperationRecord, Result, TransactionContext,
};

use crate::db::NameDb;

/// Handler for one operation type
pub trait NameOperation: Send + Sync {
    /// Opcode this handler processes
    fn opcode(&self) -> OpCode;

    /// Static consensus, mutate and backup field sets
    fn field_sets(&self) -> FieldSets;

    /// Serialize a payload into its framed wire form
    fn build(&self, payload: &OperationPayload) -> Result<Vec<u8>>;

    /// Lowercase hex of [`build`](Self::build)
    fn build_hex(&self, payload: &OperationPayload) -> Result<String> {
        Ok(hex::encode(self.build(payload)?))
    }

    /// Decode an unframed body; `None` if it is not a valid payload
    fn parse(&self, body: &[u8]) -> Option<OperationPayload>;

    /// Turn a confirmed transaction into an operation record
    fn extract(
        &self,
        body: &[u8],
        tx: &TransactionContext,
    ) -> std::result::Result<OperationRecord, ExtractionError>;

    /// Fees implied by the transaction; `None` if the outputs are malformed
    fn get_fees(&self, inputs: &[TxInput], outputs: &[TxOutput]) -> Option<Fees>;

    /// Validate the operation against the registry and stage its mutations
    ///
    /// `Ok(false)` rejects the operation. `Err` is reserved for invariant
    /// violations.
    fn check(
        &self,
        db: &dyn NameDb,
        op: &mut OperationRecord,
        block_id: u64,
        checked_ops: &[OperationRecord],
    ) -> Result<bool>;

    /// Recover the payload an operation carried from the record it produced
    fn restore_delta(
        &self,
        record: &NameRecord,
        block_number: u64,
        history_index: usize,
        db: &dyn NameDb,
    ) -> Option<OperationPayload>;

    /// Extra fields folded into simplified name verification proofs
    fn snv_consensus_extras(
        &self,
        _record: &NameRecord,
        _block_id: u64,
        _chain_data: &[u8],
        _db: &dyn NameDb,
    ) -> Vec<(NameField, FieldValue)> {
        Vec::new()
    }
}

/// Digest of one committed operation
///
/// Covers the framed payload and the consensus fields of the record the
/// operation left behind.
pub fn operation_digest(wire: &[u8], record: &NameRecord, consensus: &[NameField]) -> [u8; 32] {
    let record_digest = record.consensus_digest(consensus);
    crypto::secure_hash_multiple(domains::OPERATION, &[wire, &record_digest[..]])
}

/// Rolling consensus hash of a block
///
/// Chains the previous block's hash, the block height and the digests of
/// the operations committed in the block, in commit order.
pub fn block_consensus_hash(prev: &[u8; 32], block_id: u64, digests: &[[u8; 32]]) -> [u8; 32] {
    let height = block_id.to_be_bytes();
    let mut parts: Vec<&[u8]> = Vec::with_capacity(digests.len() + 2);
    parts.push(prev);
    parts.push(&height);
    parts.extend(digests.iter().map(|d| &d[..]));
    crypto::secure_hash_multiple(domains::CONSENSUS, &parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use namereg_core::models::NAME_RECORD_CONSENSUS_FIELDS;

    fn record() -> NameRecord {
        NameRecord::registered("alice.id", "id", "76a914aa88ac", "1Alice", 100, 1000, "tx01", 1)
    }

    #[test]
    fn test_operation_digest_covers_wire_and_record() {
        let rec = record();
        let base = operation_digest(b"id~alice.id", &rec, NAME_RECORD_CONSENSUS_FIELDS);

        assert_ne!(base, operation_digest(b"eg~alice.id", &rec, NAME_RECORD_CONSENSUS_FIELDS));

        let mut revoked = rec.clone();
        revoked.revoked = true;
        assert_ne!(base, operation_digest(b"id~alice.id", &revoked, NAME_RECORD_CONSENSUS_FIELDS));

        // Fields outside the consensus list do not contribute
        let mut stamped = rec;
        stamped.consensus_hash = Some("00".repeat(32));
        assert_eq!(base, operation_digest(b"id~alice.id", &stamped, NAME_RECORD_CONSENSUS_FIELDS));
    }

    #[test]
    fn test_block_consensus_hash_is_order_sensitive() {
        let genesis = [0u8; 32];
        let a = [1u8; 32];
        let b = [2u8; 32];

        let ab = block_consensus_hash(&genesis, 500, &[a, b]);
        assert_eq!(ab, block_consensus_hash(&genesis, 500, &[a, b]));
        assert_ne!(ab, block_consensus_hash(&genesis, 500, &[b, a]));
        assert_ne!(ab, block_consensus_hash(&genesis, 501, &[a, b]));
        assert_ne!(ab, block_consensus_hash(&ab, 500, &[a, b]));

        // An empty block still advances the chain
        assert_ne!(block_consensus_hash(&genesis, 500, &[]), genesis);
    }
}
