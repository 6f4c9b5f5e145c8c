//! Cryptographic hashing utilities for the ledger
//!
//! Provides the SHA-256 helpers used for block identifiers, transaction
//! identifiers and merkle tree construction, plus the difficulty target
//! test applied to candidate block hashes.

use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Checks whether a hash satisfies a difficulty budget.
///
/// The difficulty is a monotone hardness budget spent against the hash
/// bytes from the most significant end. Each byte consumes up to 255 units
/// of the remaining budget and must not exceed `255 - spent`; once the
/// budget is exhausted the remaining bytes are unconstrained. Values above
/// 255 therefore force full leading zero bytes, and the remainder
/// constrains exactly one more byte.
pub fn test_hash(hash: &[u8], difficulty: u32) -> bool {
    let mut budget = difficulty;

    for &byte in hash {
        if budget == 0 {
            return true;
        }

        let b = budget.min(255);
        if u32::from(byte) > 255 - b {
            return false;
        }
        budget -= b;
    }

    budget == 0
}
