//! `NAME_REVOKE`: permanently disable a name
//!
//! Wire format: `magic || '~' || fqn`. Only the current owner may revoke a
//! name, and only while the name is registered in a ready namespace. A
//! revoked name keeps its owner but loses its value hash and can no
//! longer be updated, transferred or renewed.

use log::debug;

use namereg_core::error::ExtractionError;
use namereg_core::models::{
    ScriptType, TxInput, TxOutput, NAME_RECORD_BACKUP_FIELDS, NAME_RECORD_CONSENSUS_FIELDS,
    NAME_RECORD_MUTATE_FIELDS,
};
use namereg_core::{
    names, script, CoreError, FeePolicy, FieldMask, FieldSets, FieldValue, Fees, NameField,
    NameRecord, NameRules, OpCode, OperationPayload, OperationRecord, ProtocolConfig, Result,
    TransactionContext,
};

use crate::db::NameDb;
use crate::framing::{self, MAX_OP_LENGTH};
use crate::operation::NameOperation;

/// Fields a revocation may change
pub const REVOKE_MUTATE_FIELDS: FieldMask = NAME_RECORD_MUTATE_FIELDS.union(FieldMask::of(&[
    NameField::Revoked,
    NameField::ValueHash,
    NameField::SenderPubkey,
]));

/// Fields archived before a revocation is applied
pub const REVOKE_BACKUP_FIELDS: FieldMask = NAME_RECORD_BACKUP_FIELDS
    .union(REVOKE_MUTATE_FIELDS)
    .with(NameField::ConsensusHash);

/// Field sets of a revocation
pub const REVOKE_FIELD_SETS: FieldSets = FieldSets {
    consensus: NAME_RECORD_CONSENSUS_FIELDS,
    mutate: REVOKE_MUTATE_FIELDS,
    backup: REVOKE_BACKUP_FIELDS,
};

/// Burn fee of a revocation
pub const REVOKE_OP_FEE: u64 = 0;

/// Revocation handler
#[derive(Debug, Clone)]
pub struct NameRevoke {
    magic: [u8; 2],
    rules: NameRules,
    fees: FeePolicy,
}

impl NameRevoke {
    /// Create a handler for the configured network
    pub fn new(config: &ProtocolConfig) -> Self {
        NameRevoke {
            magic: config.magic_bytes(),
            rules: config.names,
            fees: config.fees,
        }
    }

    /// Build the payload revoking `name`
    pub fn payload(name: &str) -> OperationPayload {
        OperationPayload::Revoke { name: name.to_string() }
    }
}

impl NameOperation for NameRevoke {
    fn opcode(&self) -> OpCode {
        OpCode::NameRevoke
    }

    fn field_sets(&self) -> FieldSets {
        REVOKE_FIELD_SETS
    }

    fn build(&self, payload: &OperationPayload) -> Result<Vec<u8>> {
        if payload.opcode() != OpCode::NameRevoke {
            return Err(CoreError::InvalidInput(format!(
                "{} payload handed to {}",
                payload.opcode().name(),
                OpCode::NameRevoke.name()
            )));
        }

        let name = payload.name();
        if !self.rules.is_name_valid(name) {
            return Err(CoreError::InvalidInput(format!("Invalid name '{}'", name)));
        }

        let wire = framing::frame(self.magic, OpCode::NameRevoke, name.as_bytes());
        if wire.len() > MAX_OP_LENGTH {
            return Err(CoreError::InvalidInput(format!(
                "Payload for '{}' is {} bytes, limit is {}",
                name,
                wire.len(),
                MAX_OP_LENGTH
            )));
        }

        Ok(wire)
    }

    fn parse(&self, body: &[u8]) -> Option<OperationPayload> {
        let Ok(name) = std::str::from_utf8(body) else {
            debug!("Revoke body is not UTF-8");
            return None;
        };

        if !self.rules.is_name_valid(name) {
            debug!("Revoke body '{}' is not a valid name", name);
            return None;
        }

        Some(NameRevoke::payload(name))
    }

    fn extract(
        &self,
        body: &[u8],
        tx: &TransactionContext,
    ) -> std::result::Result<OperationRecord, ExtractionError> {
        let principal = tx
            .principal()
            .ok_or_else(|| ExtractionError::NoSenders(tx.txid.clone()))?;

        let sender = principal
            .script_pubkey
            .clone()
            .ok_or_else(|| ExtractionError::MissingScript(tx.txid.clone()))?;

        let address = principal
            .addresses
            .first()
            .cloned()
            .ok_or_else(|| ExtractionError::MissingAddress(tx.txid.clone()))?;

        let payload = self
            .parse(body)
            .ok_or_else(|| ExtractionError::InvalidPayload(tx.txid.clone()))?;

        let sender_pubkey = match principal.script_type {
            ScriptType::PubKeyHash => {
                let pubkey = script::get_public_key_hex_from_inputs(&tx.inputs, &address);
                if pubkey.is_none() {
                    debug!("No public key for {} in transaction {}", address, tx.txid);
                }
                pubkey
            }
            _ => None,
        };

        Ok(OperationRecord::new(
            payload,
            sender,
            address,
            sender_pubkey,
            tx.txid.clone(),
            tx.vtxindex,
            tx.block_id,
            REVOKE_MUTATE_FIELDS,
        ))
    }

    fn get_fees(&self, inputs: &[TxInput], outputs: &[TxOutput]) -> Option<Fees> {
        let fees = self.fees.carrier_fees(inputs.len(), outputs, REVOKE_OP_FEE);
        if fees.is_none() {
            debug!("Revoke outputs are not [data carrier, change]");
        }
        fees
    }

    fn check(
        &self,
        db: &dyn NameDb,
        op: &mut OperationRecord,
        block_id: u64,
        _checked_ops: &[OperationRecord],
    ) -> Result<bool> {
        let name = op.name().to_string();

        if !names::is_plain_b38_name(&name) {
            debug!("Invalid name '{}'", name);
            return Ok(false);
        }

        if db.get_name(&name).is_none() {
            debug!("Name '{}' does not exist", name);
            return Ok(false);
        }

        let ready = names::get_namespace_from_name(&name)
            .map(|namespace_id| db.is_namespace_ready(namespace_id))
            .unwrap_or(false);
        if !ready {
            debug!("Namespace of '{}' is not ready", name);
            return Ok(false);
        }

        if db.is_name_revoked(&name) {
            debug!("Name '{}' is revoked", name);
            return Ok(false);
        }

        if db.is_name_expired(&name, block_id) {
            debug!("Name '{}' is expired", name);
            return Ok(false);
        }

        if !db.is_name_registered(&name) {
            debug!("Name '{}' is not registered", name);
            return Ok(false);
        }

        if !db.is_name_owner(&name, &op.sender) {
            debug!("Name '{}' is not owned by {}", name, op.sender);
            return Ok(false);
        }

        op.staged.stage(NameField::Revoked, FieldValue::Boolean(true))?;
        op.staged.stage(NameField::ValueHash, FieldValue::Null)?;
        if let Some(pubkey) = op.sender_pubkey.clone() {
            op.staged.stage(NameField::SenderPubkey, FieldValue::Text(pubkey))?;
        }

        Ok(true)
    }

    fn restore_delta(
        &self,
        record: &NameRecord,
        block_number: u64,
        history_index: usize,
        _db: &dyn NameDb,
    ) -> Option<OperationPayload> {
        let wire = match self.build(&NameRevoke::payload(&record.name)) {
            Ok(wire) => wire,
            Err(e) => {
                debug!(
                    "Cannot rebuild revoke of '{}' at {}/{}: {}",
                    record.name, block_number, history_index, e
                );
                return None;
            }
        };

        framing::strip_framing(&wire).and_then(|body| self.parse(body))
    }
}
