//! In-memory registry
//!
//! A complete [`NameStore`] that keeps per-name operation history, so that
//! any block can be rolled back or replayed against its recorded consensus
//! hash. Snapshots are bincode-encoded.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::{Serialize, Deserialize};

use namereg_core::{
    CoreError, FieldSets, FieldValue, NameField, NameRecord, NamespaceRecord, OpCode,
    OperationRecord, Result,
};
use namereg_core::models::NAME_RECORD_MUTATE_FIELDS;

use crate::db::{NameDb, NameStore};
use crate::operation::{block_consensus_hash, operation_digest};

/// One applied change to a name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Block the change was applied in
    pub block_id: u64,

    /// Index of the transaction within its block
    pub vtxindex: u64,

    /// Operation that made the change
    pub opcode: OpCode,

    /// Transaction id
    pub txid: String,

    /// Backup fields as they were before the change
    pub prior: Vec<(NameField, FieldValue)>,

    /// Whether the change created the record
    pub created: bool,
}

/// A history entry located within a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEntry {
    /// Name the entry belongs to
    pub name: String,

    /// Position among this name's entries in the same block
    pub history_index: usize,

    /// The entry itself
    pub entry: HistoryEntry,
}

/// In-memory name registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryNameDb {
    /// Name records (name -> record)
    names: BTreeMap<String, NameRecord>,

    /// Namespaces (namespace id -> record)
    namespaces: BTreeMap<String, NamespaceRecord>,

    /// Change history per name, oldest first
    history: BTreeMap<String, Vec<HistoryEntry>>,

    /// Consensus hash of every closed block
    consensus_hashes: BTreeMap<u64, [u8; 32]>,

    /// Height the registry has advanced to
    current_block: u64,

    /// Block currently accepting commits
    open_block: Option<u64>,

    /// Digests of the operations committed in the open block
    pending: Vec<[u8; 32]>,

    /// Transaction index of the last commit in the open block
    last_vtxindex: Option<u64>,

    /// Height to return to if the open block is aborted
    resume_block: u64,
}

impl MemoryNameDb {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Height the registry has advanced to
    pub fn current_block(&self) -> u64 {
        self.current_block
    }

    /// Number of names on record, revoked and expired ones included
    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    /// Add or replace a namespace
    pub fn insert_namespace(&mut self, namespace: NamespaceRecord) {
        debug!("Inserting namespace {}", namespace.namespace_id);
        self.namespaces.insert(namespace.namespace_id.clone(), namespace);
    }

    /// Add a name registered by an operation outside this crate
    ///
    /// The registration is recorded in the name's history so that rollback
    /// removes it, but it does not contribute to the block consensus hash.
    pub fn register_name(&mut self, record: NameRecord) -> Result<()> {
        if !self.namespaces.contains_key(&record.namespace_id) {
            return Err(CoreError::InvalidInput(format!(
                "Namespace '{}' does not exist",
                record.namespace_id
            )));
        }

        if self.names.contains_key(&record.name) {
            return Err(CoreError::InvalidInput(format!(
                "Name '{}' already exists",
                record.name
            )));
        }

        if let Some(last) = self.last_closed_block() {
            if record.block_number <= last {
                return Err(CoreError::StateError(format!(
                    "Cannot register '{}' at block {}, block {} is already closed",
                    record.name, record.block_number, last
                )));
            }
        }

        debug!("Registering {} at block {}", record.name, record.block_number);

        self.history.entry(record.name.clone()).or_default().push(HistoryEntry {
            block_id: record.block_number,
            vtxindex: record.vtxindex,
            opcode: record.op,
            txid: record.txid.clone(),
            prior: Vec::new(),
            created: true,
        });
        self.current_block = self.current_block.max(record.block_number);
        self.names.insert(record.name.clone(), record);

        Ok(())
    }

    /// Consensus hash of a closed block
    pub fn consensus_hash_at(&self, block_id: u64) -> Option<[u8; 32]> {
        self.consensus_hashes.get(&block_id).copied()
    }

    /// Consensus hash of the last closed block before `block_id`
    ///
    /// All zeros if there is none.
    pub fn previous_consensus_hash(&self, block_id: u64) -> [u8; 32] {
        self.consensus_hashes
            .range(..block_id)
            .next_back()
            .map(|(_, hash)| *hash)
            .unwrap_or([0u8; 32])
    }

    /// Height of the last closed block
    pub fn last_closed_block(&self) -> Option<u64> {
        self.consensus_hashes.keys().next_back().copied()
    }

    /// Change history of a name, oldest first
    pub fn history(&self, name: &str) -> &[HistoryEntry] {
        self.history.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every change applied in `block_id`, in transaction order
    pub fn block_entries(&self, block_id: u64) -> Vec<BlockEntry> {
        let mut entries: Vec<BlockEntry> = self
            .history
            .iter()
            .flat_map(|(name, changes)| {
                changes
                    .iter()
                    .filter(move |e| e.block_id == block_id)
                    .enumerate()
                    .map(move |(history_index, entry)| BlockEntry {
                        name: name.clone(),
                        history_index,
                        entry: entry.clone(),
                    })
            })
            .collect();

        entries.sort_by_key(|e| e.entry.vtxindex);
        entries
    }

    /// The record as it stood right after a given change
    ///
    /// `history_index` counts this name's changes within `block_id`.
    pub fn record_at(&self, name: &str, block_id: u64, history_index: usize) -> Option<NameRecord> {
        let changes = self.history.get(name)?;
        let (position, _) = changes
            .iter()
            .enumerate()
            .filter(|(_, e)| e.block_id == block_id)
            .nth(history_index)?;

        let mut record = self.names.get(name)?.clone();
        for change in changes[position + 1..].iter().rev() {
            if change.created {
                return None;
            }
            for (field, value) in &change.prior {
                record.set_field(*field, value.clone()).ok()?;
            }
        }

        Some(record)
    }

    /// Undo every change applied after `block_id`
    ///
    /// Returns the number of changes undone.
    pub fn rollback_to(&mut self, block_id: u64) -> Result<usize> {
        let undone = self.undo_while(|change| change.block_id > block_id)?;

        self.consensus_hashes.retain(|height, _| *height <= block_id);
        self.current_block = block_id;
        self.open_block = None;
        self.pending.clear();
        self.last_vtxindex = None;

        info!("Rolled back to block {}, undid {} changes", block_id, undone);
        Ok(undone)
    }

    /// Pop history entries from the tail of each name while `undo` holds,
    /// restoring the fields they backed up
    fn undo_while<F>(&mut self, undo: F) -> Result<usize>
    where
        F: Fn(&HistoryEntry) -> bool,
    {
        let mut undone = 0;
        let mut emptied = Vec::new();

        for (name, changes) in self.history.iter_mut() {
            while changes.last().map_or(false, |e| undo(e)) {
                let Some(change) = changes.pop() else {
                    break;
                };

                if change.created {
                    self.names.remove(name);
                } else {
                    let record = self.names.get_mut(name).ok_or_else(|| {
                        CoreError::StateError(format!("History of '{}' has no record", name))
                    })?;
                    for (field, value) in change.prior {
                        record.set_field(field, value)?;
                    }
                }
                undone += 1;
            }

            if changes.is_empty() {
                emptied.push(name.clone());
            }
        }

        for name in emptied {
            self.history.remove(&name);
        }

        Ok(undone)
    }

    /// Serialize the whole registry
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Restore a registry from [`snapshot`](Self::snapshot) bytes
    pub fn from_snapshot(bytes: &[u8]) -> Result<Self> {
        let db: MemoryNameDb = bincode::deserialize(bytes)?;
        if db.open_block.is_some() {
            return Err(CoreError::StateError(
                "Snapshot was taken in the middle of a block".to_string(),
            ));
        }
        Ok(db)
    }
}

impl NameDb for MemoryNameDb {
    fn get_name(&self, name: &str) -> Option<NameRecord> {
        self.names.get(name).cloned()
    }

    fn is_namespace_ready(&self, namespace_id: &str) -> bool {
        self.namespaces
            .get(namespace_id)
            .map_or(false, NamespaceRecord::is_ready)
    }

    fn is_name_revoked(&self, name: &str) -> bool {
        self.names.get(name).map_or(false, |r| r.revoked)
    }

    fn is_name_expired(&self, name: &str, block_id: u64) -> bool {
        self.names.get(name).map_or(false, |r| r.is_expired_at(block_id))
    }

    fn is_name_registered(&self, name: &str) -> bool {
        self.names
            .get(name)
            .map_or(false, |r| !r.revoked && !r.is_expired_at(self.current_block))
    }

    fn is_name_owner(&self, name: &str, sender: &str) -> bool {
        self.names.get(name).map_or(false, |r| r.sender == sender)
    }
}

impl NameStore for MemoryNameDb {
    fn begin_block(&mut self, block_id: u64) -> Result<()> {
        if let Some(open) = self.open_block {
            return Err(CoreError::StateError(format!("Block {} is still open", open)));
        }

        if let Some(last) = self.last_closed_block() {
            if block_id <= last {
                return Err(CoreError::StateError(format!(
                    "Block {} is not after closed block {}",
                    block_id, last
                )));
            }
        }

        self.resume_block = self.current_block;
        self.open_block = Some(block_id);
        self.current_block = block_id;
        self.pending.clear();
        self.last_vtxindex = None;
        Ok(())
    }

    fn commit(&mut self, op: &OperationRecord, sets: &FieldSets, wire: &[u8]) -> Result<()> {
        if self.open_block != Some(op.block_id) {
            return Err(CoreError::StateError(format!(
                "Cannot commit {} from block {}, open block is {:?}",
                op.opcode.name(),
                op.block_id,
                self.open_block
            )));
        }

        if let Some(last) = self.last_vtxindex.filter(|last| op.vtxindex <= *last) {
            return Err(CoreError::StateError(format!(
                "Cannot commit {} at {}/{} after transaction {}",
                op.opcode.name(),
                op.block_id,
                op.vtxindex,
                last
            )));
        }

        sets.validate()?;
        if !sets.mutate.is_superset_of(&NAME_RECORD_MUTATE_FIELDS) {
            return Err(CoreError::InvariantViolation(format!(
                "{} does not declare the op, txid and vtxindex fields as mutable",
                op.opcode.name()
            )));
        }
        if let Some((field, _)) = op.staged.iter().find(|(f, _)| !sets.mutate.contains(*f)) {
            return Err(CoreError::InvariantViolation(format!(
                "{} staged undeclared field {}",
                op.opcode.name(),
                field.as_str()
            )));
        }

        let previous_hash = self.previous_consensus_hash(op.block_id);
        let current = self.names.get(op.name()).ok_or_else(|| {
            CoreError::StateError(format!("No record for '{}'", op.name()))
        })?;

        let prior = current.snapshot(sets.backup.iter());
        let mut updated = current.clone();
        for (field, value) in op.staged.iter() {
            updated.set_field(*field, value.clone())?;
        }
        updated.op = op.opcode;
        updated.txid = op.txid.clone();
        updated.vtxindex = op.vtxindex;
        if sets.backup.contains(NameField::ConsensusHash) {
            updated.consensus_hash = Some(hex::encode(previous_hash));
        }

        let digest = operation_digest(wire, &updated, sets.consensus);

        debug!(
            "Committing {} of '{}' at {}/{}",
            op.opcode.name(),
            op.name(),
            op.block_id,
            op.vtxindex
        );

        self.history.entry(op.name().to_string()).or_default().push(HistoryEntry {
            block_id: op.block_id,
            vtxindex: op.vtxindex,
            opcode: op.opcode,
            txid: op.txid.clone(),
            prior,
            created: false,
        });
        self.names.insert(op.name().to_string(), updated);
        self.pending.push(digest);
        self.last_vtxindex = Some(op.vtxindex);

        Ok(())
    }

    fn end_block(&mut self, block_id: u64) -> Result<[u8; 32]> {
        if self.open_block != Some(block_id) {
            return Err(CoreError::StateError(format!(
                "Cannot close block {}, open block is {:?}",
                block_id, self.open_block
            )));
        }

        let previous_hash = self.previous_consensus_hash(block_id);
        let hash = block_consensus_hash(&previous_hash, block_id, &self.pending);

        info!(
            "Closed block {} with {} operations, consensus hash {}",
            block_id,
            self.pending.len(),
            hex::encode(hash)
        );

        self.consensus_hashes.insert(block_id, hash);
        self.open_block = None;
        self.pending.clear();
        self.last_vtxindex = None;
        Ok(hash)
    }

    fn abort_block(&mut self, block_id: u64) -> Result<()> {
        if self.open_block != Some(block_id) {
            return Err(CoreError::StateError(format!(
                "Cannot abort block {}, open block is {:?}",
                block_id, self.open_block
            )));
        }

        let undone = self.undo_while(|change| change.block_id == block_id && !change.created)?;

        self.open_block = None;
        self.current_block = self.resume_block;
        self.pending.clear();
        self.last_vtxindex = None;

        warn!("Aborted block {}, undid {} commits", block_id, undone);
        Ok(())
    }
}
