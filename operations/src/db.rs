//! Registry query and commit interfaces
//!
//! Operation handlers only ever see [`NameDb`]: read-only lookups against
//! the registry as of the transaction being checked. The processing loop
//! drives a [`NameStore`], which adds the block lifecycle and the atomic
//! commit of staged mutations.

use namereg_core::{FieldSets, NameRecord, OperationRecord, Result};

/// Read-only view of the registry
#[cfg_attr(test, mockall::automock)]
pub trait NameDb {
    /// Current record for a fully-qualified name
    fn get_name(&self, name: &str) -> Option<NameRecord>;

    /// Whether the namespace has been revealed and readied
    fn is_namespace_ready(&self, namespace_id: &str) -> bool;

    /// Whether the name exists and is revoked
    fn is_name_revoked(&self, name: &str) -> bool;

    /// Whether the name exists and is expired at `block_id`
    fn is_name_expired(&self, name: &str, block_id: u64) -> bool;

    /// Whether the name exists, is not revoked and is not expired
    fn is_name_registered(&self, name: &str) -> bool;

    /// Whether `sender` (a scriptPubKey) owns the name
    fn is_name_owner(&self, name: &str, sender: &str) -> bool;
}

/// A registry that can apply operations block by block
pub trait NameStore: NameDb {
    /// Open `block_id` for commits
    fn begin_block(&mut self, block_id: u64) -> Result<()>;

    /// Apply an accepted operation
    ///
    /// Takes the backup snapshot first, then writes the staged mutations
    /// and the operation's own bookkeeping fields. `wire` is the framed
    /// payload the operation was decoded from.
    fn commit(&mut self, op: &OperationRecord, sets: &FieldSets, wire: &[u8]) -> Result<()>;

    /// Close `block_id` and return its consensus hash
    fn end_block(&mut self, block_id: u64) -> Result<[u8; 32]>;

    /// Discard every commit made since `begin_block(block_id)` and leave
    /// the block unopened
    fn abort_block(&mut self, block_id: u64) -> Result<()>;
}
