//! Cryptographic utilities for the ledger
//!
//! This module provides:
//! - SHA-256 hashing and the difficulty budget test
//! - ECDSA signing primitives (secp256k1)
//! - Merkle tree construction over content identifiers

pub mod hash;
pub mod merkle;
pub mod signing;

pub use hash::{sha256, sha256_hex, test_hash};
pub use merkle::{build_tree, build_tree_with, merkle_root, MerkleNode};
pub use signing::{random_origin_key, verify_signature, KeyError, KeyPair, ORIGIN_KEY_LEN};
