//! Historical replay
//!
//! Recomputes a closed block's consensus hash purely from the registry's
//! history: every change in the block is turned back into its wire payload
//! with the handler's `restore_delta` and re-digested against the record
//! it produced.

use log::{debug, warn};

use namereg_core::{crypto, CoreError, Result};

use crate::memory::MemoryNameDb;
use crate::operation::{block_consensus_hash, operation_digest};
use crate::registry::OperationRegistry;

/// Recompute the consensus hash of `block_id` from history
pub fn rebuild_block(db: &MemoryNameDb, registry: &OperationRegistry, block_id: u64) -> Result<[u8; 32]> {
    let mut digests = Vec::new();

    for located in db.block_entries(block_id) {
        let entry = &located.entry;
        if entry.created {
            // Registrations applied outside the registry are not hashed
            continue;
        }

        let handler = registry.handler(entry.opcode).ok_or_else(|| {
            CoreError::StateError(format!(
                "No handler for {} at {}/{}",
                entry.opcode.name(),
                block_id,
                entry.vtxindex
            ))
        })?;

        let record = db
            .record_at(&located.name, block_id, located.history_index)
            .ok_or_else(|| {
                CoreError::StateError(format!(
                    "Cannot reconstruct '{}' at {}/{}",
                    located.name, block_id, located.history_index
                ))
            })?;

        let payload = handler
            .restore_delta(&record, block_id, located.history_index, db)
            .ok_or_else(|| {
                CoreError::StateError(format!(
                    "Cannot restore {} of '{}' at {}/{}",
                    entry.opcode.name(),
                    located.name,
                    block_id,
                    entry.vtxindex
                ))
            })?;

        let wire = handler.build(&payload)?;
        debug!("Replayed {} of '{}' at {}/{}", entry.opcode.name(), located.name, block_id, entry.vtxindex);
        digests.push(operation_digest(&wire, &record, handler.field_sets().consensus));
    }

    Ok(block_consensus_hash(&db.previous_consensus_hash(block_id), block_id, &digests))
}

/// Check a closed block's stored consensus hash against its history
pub fn verify_block(db: &MemoryNameDb, registry: &OperationRegistry, block_id: u64) -> Result<bool> {
    let stored = db
        .consensus_hash_at(block_id)
        .ok_or_else(|| CoreError::StateError(format!("Block {} is not closed", block_id)))?;

    let rebuilt = rebuild_block(db, registry, block_id)?;
    let matches = crypto::verify_hash(&stored, &rebuilt);
    if !matches {
        warn!(
            "Block {} consensus hash mismatch: stored {}, rebuilt {}",
            block_id,
            hex::encode(stored),
            hex::encode(rebuilt)
        );
    }

    Ok(matches)
}
