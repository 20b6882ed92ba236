//! Cryptographic primitives for the name registry
//!
//! Domain-separated SHA-256 for consensus hashing, plus the Bitcoin-style
//! digests (double SHA-256 and HASH160) needed to relate public keys,
//! scripts and addresses.

use sha2::{Sha256, Digest};
use ripemd::Ripemd160;
use constant_time_eq::constant_time_eq;

/// Create a domain-separated secure hash using SHA-256
///
/// # Arguments
///
/// * `domain` - Domain prefix (e.g., "NAMEREG_RECORD")
/// * `data` - Data to hash
///
/// # Returns
///
/// A 32-byte secure hash with domain separation
pub fn secure_hash(domain: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    // Domain length guards against prefix ambiguity between domains
    hasher.update([domain.len() as u8]);
    hasher.update(data);

    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Create a domain-separated secure hash of multiple inputs
///
/// Each element is length-prefixed, so `["ab", "c"]` and `["a", "bc"]`
/// never collide.
pub fn secure_hash_multiple(domain: &str, data: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    hasher.update([domain.len() as u8]);
    hasher.update((data.len() as u32).to_be_bytes());

    for element in data {
        hasher.update((element.len() as u32).to_be_bytes());
        hasher.update(element);
    }

    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// SHA-256 applied twice, as used by base58check and transaction ids
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut output = [0u8; 32];
    output.copy_from_slice(&second);
    output
}

/// RIPEMD-160 of SHA-256, the digest behind pay-to-pubkey-hash addresses
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    let mut output = [0u8; 20];
    output.copy_from_slice(&ripe);
    output
}

/// Verify a hash in constant time
///
/// # Returns
///
/// True if the hashes match, false otherwise
pub fn verify_hash(expected: &[u8; 32], actual: &[u8; 32]) -> bool {
    constant_time_eq(expected, actual)
}
