//! Operation registry and block processing
//!
//! The registry maps opcodes to handlers and drives each transaction
//! through unframe, extract, fee validation, check and commit. Blocks are
//! processed strictly in transaction order, and every accepted operation
//! is committed before the next transaction is checked.

use std::collections::BTreeMap;

use log::{debug, info, warn};

use namereg_core::{
    CoreError, ExtractionError, OpCode, OperationRecord, ProtocolConfig, Result,
    TransactionContext,
};

use crate::db::NameStore;
use crate::framing;
use crate::operation::NameOperation;
use crate::revoke::NameRevoke;

/// Result of processing one block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockOutcome {
    /// Block height
    pub block_id: u64,

    /// Operations committed, in transaction order
    pub accepted: Vec<OperationRecord>,

    /// Transactions that were not valid registry operations
    pub rejected: usize,

    /// Transactions whose extraction failed (txid, error)
    pub faults: Vec<(String, ExtractionError)>,

    /// Consensus hash the block closed with
    pub consensus_hash: [u8; 32],
}

/// Opcode to handler dispatch
pub struct OperationRegistry {
    config: ProtocolConfig,
    handlers: BTreeMap<OpCode, Box<dyn NameOperation>>,
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("network", &self.config.network)
            .field("opcodes", &self.handlers.keys().map(OpCode::name).collect::<Vec<_>>())
            .finish()
    }
}

impl OperationRegistry {
    /// Create an empty registry
    pub fn new(config: ProtocolConfig) -> Self {
        OperationRegistry {
            config,
            handlers: BTreeMap::new(),
        }
    }

    /// Create a registry with every operation type this crate implements
    pub fn with_default_operations(config: ProtocolConfig) -> Result<Self> {
        let mut registry = Self::new(config);
        let revoke = NameRevoke::new(&registry.config);
        registry.register(Box::new(revoke))?;
        Ok(registry)
    }

    /// Register a handler
    ///
    /// Fails if its field sets are inconsistent or its opcode is taken.
    pub fn register(&mut self, handler: Box<dyn NameOperation>) -> Result<()> {
        let opcode = handler.opcode();

        handler.field_sets().validate().map_err(|e| {
            CoreError::InvariantViolation(format!("{}: {}", opcode.name(), e))
        })?;

        if self.handlers.contains_key(&opcode) {
            return Err(CoreError::InvariantViolation(format!(
                "{} is already registered",
                opcode.name()
            )));
        }

        debug!("Registered handler for {}", opcode.name());
        self.handlers.insert(opcode, handler);
        Ok(())
    }

    /// Handler for an opcode
    pub fn handler(&self, opcode: OpCode) -> Option<&dyn NameOperation> {
        self.handlers.get(&opcode).map(|h| h.as_ref())
    }

    /// Registered opcodes
    pub fn opcodes(&self) -> impl Iterator<Item = OpCode> + '_ {
        self.handlers.keys().copied()
    }

    /// Configuration the registry was built with
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Process one transaction against `db`
    ///
    /// Returns the committed operation, `Ok(None)` if the transaction is
    /// not a valid registry operation, and `Err` for extraction faults and
    /// invariant violations.
    pub fn process_transaction<D: NameStore>(
        &self,
        db: &mut D,
        tx: &TransactionContext,
        checked_ops: &[OperationRecord],
    ) -> Result<Option<OperationRecord>> {
        let Some((opcode, body)) = framing::unframe(self.config.magic_bytes(), &tx.nulldata) else {
            debug!("Transaction {} carries no registry payload", tx.txid);
            return Ok(None);
        };

        let Some(handler) = self.handler(opcode) else {
            debug!("No handler for {} in transaction {}", opcode.name(), tx.txid);
            return Ok(None);
        };

        let mut op = match handler.extract(body, tx) {
            Ok(op) => op,
            Err(ExtractionError::InvalidPayload(txid)) => {
                debug!("Transaction {} carries a malformed {}", txid, opcode.name());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if handler.get_fees(&tx.inputs, &tx.outputs).is_none() {
            debug!("Transaction {} has malformed outputs", tx.txid);
            return Ok(None);
        }

        if !handler.check(&*db, &mut op, tx.block_id, checked_ops)? {
            debug!("{} in transaction {} rejected", opcode.name(), tx.txid);
            return Ok(None);
        }

        db.commit(&op, &handler.field_sets(), &tx.nulldata)?;
        Ok(Some(op))
    }

    /// Process every transaction of a block, in order, and close it
    ///
    /// `txs` must be sorted by strictly increasing `vtxindex`. If a
    /// transaction fails with anything other than an extraction fault, the
    /// commits already made in the block are undone and the block is left
    /// unopened.
    pub fn process_block<D: NameStore>(
        &self,
        db: &mut D,
        block_id: u64,
        txs: &[TransactionContext],
    ) -> Result<BlockOutcome> {
        if let Some(tx) = txs.iter().find(|tx| tx.block_id != block_id) {
            return Err(CoreError::InvalidInput(format!(
                "Transaction {} belongs to block {}, not {}",
                tx.txid, tx.block_id, block_id
            )));
        }

        if let Some(pair) = txs.windows(2).find(|pair| pair[1].vtxindex <= pair[0].vtxindex) {
            return Err(CoreError::InvalidInput(format!(
                "Transaction {} at index {} follows index {} in block {}",
                pair[1].txid, pair[1].vtxindex, pair[0].vtxindex, block_id
            )));
        }

        db.begin_block(block_id)?;

        let mut accepted: Vec<OperationRecord> = Vec::new();
        let mut rejected = 0;
        let mut faults = Vec::new();

        for tx in txs {
            match self.process_transaction(db, tx, &accepted) {
                Ok(Some(op)) => accepted.push(op),
                Ok(None) => rejected += 1,
                Err(CoreError::Extraction(e)) => {
                    warn!("Skipping transaction {}: {}", tx.txid, e);
                    faults.push((tx.txid.clone(), e));
                }
                Err(e) => {
                    if let Err(abort) = db.abort_block(block_id) {
                        warn!("Could not abort block {}: {}", block_id, abort);
                    }
                    return Err(e);
                }
            }
        }

        let consensus_hash = db.end_block(block_id)?;

        info!(
            "Block {}: {} accepted, {} rejected, {} faults",
            block_id,
            accepted.len(),
            rejected,
            faults.len()
        );

        Ok(BlockOutcome {
            block_id,
            accepted,
            rejected,
            faults,
            consensus_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NameDb;
    use crate::memory::MemoryNameDb;
    use crate::revoke::REVOKE_MUTATE_FIELDS;
    use namereg_core::models::{ScriptType, SenderInfo, TxInput, TxOutput, NAME_RECORD_CONSENSUS_FIELDS};
    use namereg_core::{
        script, FieldMask, FieldSets, FieldValue, Fees, NameField, NameRecord, NamespaceRecord,
        OperationPayload,
    };

    const A_PUBKEY: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const B_PUBKEY: &str = "02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5";

    struct Party {
        pubkey: String,
        address: String,
        script: String,
    }

    fn party(pubkey_hex: &str) -> Party {
        let address = script::pubkey_to_address(&hex::decode(pubkey_hex).unwrap());
        Party {
            pubkey: pubkey_hex.to_string(),
            script: script::make_pay_to_address_script(&address).unwrap(),
            address,
        }
    }

    fn sig_script(pubkey_hex: &str) -> String {
        let pubkey = hex::decode(pubkey_hex).unwrap();
        let mut script = vec![71u8];
        script.extend_from_slice(&[0x30u8; 71]);
        script.push(pubkey.len() as u8);
        script.extend_from_slice(&pubkey);
        hex::encode(script)
    }

    fn revoke_tx(from: &Party, nulldata: &[u8], block_id: u64, vtxindex: u64) -> TransactionContext {
        TransactionContext {
            txid: format!("{:064x}", block_id * 1000 + vtxindex),
            block_id,
            vtxindex,
            senders: vec![SenderInfo {
                script_pubkey: Some(from.script.clone()),
                script_type: ScriptType::PubKeyHash,
                addresses: vec![from.address.clone()],
            }],
            inputs: vec![TxInput {
                prev_txid: "cd".repeat(32),
                prev_vout: 0,
                script_sig: Some(sig_script(&from.pubkey)),
            }],
            outputs: vec![
                TxOutput { script_hex: script::make_op_return_script(nulldata).unwrap(), value: 0 },
                TxOutput { script_hex: from.script.clone(), value: 50000 },
            ],
            nulldata: nulldata.to_vec(),
        }
    }

    fn registry() -> OperationRegistry {
        OperationRegistry::with_default_operations(ProtocolConfig::testing()).unwrap()
    }

    fn db_with(owner: &Party, names: &[&str]) -> MemoryNameDb {
        let mut db = MemoryNameDb::new();
        db.insert_namespace(NamespaceRecord::ready("id", 10, 20, 10000));
        for (i, name) in names.iter().enumerate() {
            let mut record = NameRecord::registered(
                name, "id", &owner.script, &owner.address, 100, 10000, "tx01", i as u64,
            );
            record.value_hash = Some("11".repeat(20));
            db.register_name(record).unwrap();
        }
        db
    }

    /// A handler whose field declarations break the backup rule
    struct Misdeclared;

    impl NameOperation for Misdeclared {
        fn opcode(&self) -> OpCode {
            OpCode::NameUpdate
        }

        fn field_sets(&self) -> FieldSets {
            FieldSets {
                consensus: NAME_RECORD_CONSENSUS_FIELDS,
                mutate: FieldMask::of(&[NameField::ValueHash]),
                backup: FieldMask::EMPTY,
            }
        }

        fn build(&self, _payload: &OperationPayload) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }

        fn parse(&self, _body: &[u8]) -> Option<OperationPayload> {
            None
        }

        fn extract(
            &self,
            _body: &[u8],
            tx: &TransactionContext,
        ) -> std::result::Result<OperationRecord, ExtractionError> {
            Err(ExtractionError::InvalidPayload(tx.txid.clone()))
        }

        fn get_fees(&self, _inputs: &[TxInput], _outputs: &[TxOutput]) -> Option<Fees> {
            None
        }

        fn check(
            &self,
            _db: &dyn NameDb,
            _op: &mut OperationRecord,
            _block_id: u64,
            _checked_ops: &[OperationRecord],
        ) -> Result<bool> {
            Ok(false)
        }

        fn restore_delta(
            &self,
            _record: &NameRecord,
            _block_number: u64,
            _history_index: usize,
            _db: &dyn NameDb,
        ) -> Option<OperationPayload> {
            None
        }
    }

    /// A revocation handler under another opcode that stages a field it
    /// never declared
    struct Overreaching(NameRevoke);

    impl NameOperation for Overreaching {
        fn opcode(&self) -> OpCode {
            OpCode::NameUpdate
        }

        fn field_sets(&self) -> FieldSets {
            self.0.field_sets()
        }

        fn build(&self, payload: &OperationPayload) -> Result<Vec<u8>> {
            self.0.build(payload)
        }

        fn parse(&self, body: &[u8]) -> Option<OperationPayload> {
            self.0.parse(body)
        }

        fn extract(
            &self,
            body: &[u8],
            tx: &TransactionContext,
        ) -> std::result::Result<OperationRecord, ExtractionError> {
            let mut op = self.0.extract(body, tx)?;
            op.opcode = OpCode::NameUpdate;
            Ok(op)
        }

        fn get_fees(&self, inputs: &[TxInput], outputs: &[TxOutput]) -> Option<Fees> {
            self.0.get_fees(inputs, outputs)
        }

        fn check(
            &self,
            _db: &dyn NameDb,
            op: &mut OperationRecord,
            _block_id: u64,
            _checked_ops: &[OperationRecord],
        ) -> Result<bool> {
            op.staged.stage(NameField::Sender, FieldValue::Null)?;
            Ok(true)
        }

        fn restore_delta(
            &self,
            _record: &NameRecord,
            _block_number: u64,
            _history_index: usize,
            _db: &dyn NameDb,
        ) -> Option<OperationPayload> {
            None
        }
    }

    #[test]
    fn test_registered_handlers_have_consistent_field_sets() {
        let registry = registry();
        assert_eq!(registry.opcodes().collect::<Vec<_>>(), vec![OpCode::NameRevoke]);

        for opcode in registry.opcodes() {
            let sets = registry.handler(opcode).unwrap().field_sets();
            assert!(sets.validate().is_ok());
            assert!(sets.backup.is_superset_of(&sets.mutate));
        }
    }

    #[test]
    fn test_register_rejects_bad_handlers() {
        let mut registry = registry();

        let err = registry.register(Box::new(Misdeclared)).unwrap_err();
        assert!(err.is_invariant_violation());
        assert!(registry.handler(OpCode::NameUpdate).is_none());

        let err = registry
            .register(Box::new(NameRevoke::new(&ProtocolConfig::testing())))
            .unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_end_to_end_revocation() {
        let _ = env_logger::builder().is_test(true).try_init();

        let a = party(A_PUBKEY);
        let b = party(B_PUBKEY);
        let registry = registry();
        let mut db = db_with(&a, &["alice.id"]);

        // A stranger cannot revoke
        let outcome = registry
            .process_block(&mut db, 500, &[revoke_tx(&b, b"id~alice.id", 500, 1)])
            .unwrap();
        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.rejected, 1);
        assert!(!db.is_name_revoked("alice.id"));

        // The owner can
        let outcome = registry
            .process_block(&mut db, 501, &[revoke_tx(&a, b"id~alice.id", 501, 1)])
            .unwrap();
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.consensus_hash, db.consensus_hash_at(501).unwrap());

        let record = db.get_name("alice.id").unwrap();
        assert!(record.revoked);
        assert_eq!(record.value_hash, None);
        assert_eq!(record.sender_pubkey.as_deref(), Some(A_PUBKEY));
        assert_eq!(record.op, OpCode::NameRevoke);
        assert_eq!(record.sender, a.script);

        // And cannot do it twice
        let outcome = registry
            .process_block(&mut db, 502, &[revoke_tx(&a, b"id~alice.id", 502, 1)])
            .unwrap();
        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.rejected, 1);
    }

    #[test]
    fn test_rejection_is_idempotent() {
        let a = party(A_PUBKEY);
        let b = party(B_PUBKEY);
        let registry = registry();
        let mut db = db_with(&a, &["alice.id"]);
        let before = db.get_name("alice.id");

        db.begin_block(500).unwrap();
        let tx = revoke_tx(&b, b"id~alice.id", 500, 1);
        for _ in 0..3 {
            assert_eq!(registry.process_transaction(&mut db, &tx, &[]).unwrap(), None);
            assert_eq!(db.get_name("alice.id"), before);
        }
        assert_eq!(db.history("alice.id").len(), 1);
    }

    #[test]
    fn test_ordering_within_a_block() {
        let a = party(A_PUBKEY);
        let registry = registry();

        // Revoke before the name exists, then register it: the revoke fails
        let mut db = db_with(&a, &[]);
        db.begin_block(500).unwrap();
        let revoke = revoke_tx(&a, b"id~alice.id", 500, 1);
        assert_eq!(registry.process_transaction(&mut db, &revoke, &[]).unwrap(), None);
        db.register_name(NameRecord::registered("alice.id", "id", &a.script, &a.address, 500, 10000, "tx02", 2))
            .unwrap();
        db.end_block(500).unwrap();
        assert!(!db.is_name_revoked("alice.id"));

        // Register first, then revoke: the revoke sees the registration
        let mut db = db_with(&a, &[]);
        db.begin_block(500).unwrap();
        db.register_name(NameRecord::registered("alice.id", "id", &a.script, &a.address, 500, 10000, "tx02", 1))
            .unwrap();
        let revoke = revoke_tx(&a, b"id~alice.id", 500, 2);
        assert!(registry.process_transaction(&mut db, &revoke, &[]).unwrap().is_some());
        db.end_block(500).unwrap();
        assert!(db.is_name_revoked("alice.id"));
    }

    #[test]
    fn test_second_revoke_in_same_block_sees_the_first() {
        let a = party(A_PUBKEY);
        let registry = registry();
        let mut db = db_with(&a, &["alice.id"]);

        let txs = vec![
            revoke_tx(&a, b"id~alice.id", 500, 1),
            revoke_tx(&a, b"id~alice.id", 500, 2),
        ];
        let outcome = registry.process_block(&mut db, 500, &txs).unwrap();

        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.accepted[0].vtxindex, 1);
        assert_eq!(outcome.rejected, 1);
        assert_eq!(outcome.accepted[0].staged.allowed(), REVOKE_MUTATE_FIELDS);
    }

    #[test]
    fn test_block_hash_depends_on_order() {
        let a = party(A_PUBKEY);
        let registry = registry();

        let forward = vec![
            revoke_tx(&a, b"id~alice.id", 500, 1),
            revoke_tx(&a, b"id~bob.id", 500, 2),
        ];
        let backward = vec![
            revoke_tx(&a, b"id~bob.id", 500, 1),
            revoke_tx(&a, b"id~alice.id", 500, 2),
        ];

        let mut db1 = db_with(&a, &["alice.id", "bob.id"]);
        let mut db2 = db_with(&a, &["alice.id", "bob.id"]);
        let h1 = registry.process_block(&mut db1, 500, &forward).unwrap().consensus_hash;
        let h2 = registry.process_block(&mut db2, 500, &backward).unwrap().consensus_hash;

        assert_ne!(h1, h2);
    }

    #[test]
    fn test_unordered_block_is_refused() {
        let a = party(A_PUBKEY);
        let registry = registry();
        let mut db = db_with(&a, &["alice.id", "bob.id"]);

        let swapped = vec![
            revoke_tx(&a, b"id~bob.id", 500, 2),
            revoke_tx(&a, b"id~alice.id", 500, 1),
        ];
        let repeated = vec![
            revoke_tx(&a, b"id~alice.id", 500, 1),
            revoke_tx(&a, b"id~bob.id", 500, 1),
        ];

        for txs in [swapped, repeated] {
            assert!(matches!(
                registry.process_block(&mut db, 500, &txs),
                Err(CoreError::InvalidInput(_))
            ));
            assert!(!db.is_name_revoked("alice.id"));
            assert!(!db.is_name_revoked("bob.id"));
            assert_eq!(db.consensus_hash_at(500), None);
        }

        // Nothing was opened, so the block can still be processed
        db.begin_block(500).unwrap();
        db.end_block(500).unwrap();
    }

    #[test]
    fn test_invariant_violation_aborts_the_block() {
        let a = party(A_PUBKEY);
        let mut registry = registry();
        registry
            .register(Box::new(Overreaching(NameRevoke::new(&ProtocolConfig::testing()))))
            .unwrap();
        let mut db = db_with(&a, &["alice.id", "bob.id"]);
        let before = db.get_name("alice.id");

        let txs = vec![
            revoke_tx(&a, b"id~alice.id", 500, 1),
            revoke_tx(&a, b"id+bob.id", 500, 2),
        ];
        let err = registry.process_block(&mut db, 500, &txs).unwrap_err();
        assert!(err.is_invariant_violation());

        // The revocation committed before the failure is undone
        assert_eq!(db.get_name("alice.id"), before);
        assert_eq!(db.history("alice.id").len(), 1);
        assert_eq!(db.consensus_hash_at(500), None);

        // And the block can be processed again
        let outcome = registry
            .process_block(&mut db, 500, &[revoke_tx(&a, b"id~alice.id", 500, 1)])
            .unwrap();
        assert_eq!(outcome.accepted.len(), 1);
        assert!(db.is_name_revoked("alice.id"));
    }

    #[test]
    fn test_foreign_and_malformed_payloads_are_rejected() {
        let a = party(A_PUBKEY);
        let registry = registry();
        let mut db = db_with(&a, &["alice.id"]);

        let mut bad_outputs = revoke_tx(&a, b"id~alice.id", 500, 5);
        bad_outputs.outputs.pop();

        let txs = vec![
            revoke_tx(&a, b"eg~alice.id", 500, 1),
            revoke_tx(&a, b"id:alice.id", 500, 2),
            revoke_tx(&a, b"id~ALICE", 500, 3),
            revoke_tx(&a, b"hello world", 500, 4),
            bad_outputs,
        ];

        let outcome = registry.process_block(&mut db, 500, &txs).unwrap();
        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.rejected, 5);
        assert!(outcome.faults.is_empty());
        assert!(!db.is_name_revoked("alice.id"));
    }

    #[test]
    fn test_extraction_fault_aborts_only_that_transaction() {
        let a = party(A_PUBKEY);
        let registry = registry();
        let mut db = db_with(&a, &["alice.id"]);

        let mut senderless = revoke_tx(&a, b"id~alice.id", 500, 1);
        senderless.senders.clear();

        let txs = vec![senderless, revoke_tx(&a, b"id~alice.id", 500, 2)];
        let outcome = registry.process_block(&mut db, 500, &txs).unwrap();

        assert_eq!(outcome.faults.len(), 1);
        assert_eq!(outcome.faults[0].1, ExtractionError::NoSenders(txs[0].txid.clone()));
        assert_eq!(outcome.accepted.len(), 1);
        assert!(db.is_name_revoked("alice.id"));
    }

    #[test]
    fn test_process_transaction_surfaces_extraction_errors() {
        let a = party(A_PUBKEY);
        let registry = registry();
        let mut db = db_with(&a, &["alice.id"]);
        db.begin_block(500).unwrap();

        let mut tx = revoke_tx(&a, b"id~alice.id", 500, 1);
        tx.senders[0].addresses.clear();

        match registry.process_transaction(&mut db, &tx, &[]) {
            Err(CoreError::Extraction(ExtractionError::MissingAddress(txid))) => assert_eq!(txid, tx.txid),
            other => panic!("Expected MissingAddress, got {:?}", other),
        }
    }

    #[test]
    fn test_expired_name_cannot_be_revoked() {
        let a = party(A_PUBKEY);
        let registry = registry();
        let mut db = db_with(&a, &["alice.id"]);

        // Registered at 100 for 10000 blocks
        let outcome = registry
            .process_block(&mut db, 10100, &[revoke_tx(&a, b"id~alice.id", 10100, 1)])
            .unwrap();
        assert!(outcome.accepted.is_empty());
    }

    #[test]
    fn test_mismatched_block_is_refused() {
        let a = party(A_PUBKEY);
        let registry = registry();
        let mut db = db_with(&a, &["alice.id"]);

        let result = registry.process_block(&mut db, 500, &[revoke_tx(&a, b"id~alice.id", 501, 1)]);
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
        assert!(db.consensus_hash_at(500).is_none());
    }
}
