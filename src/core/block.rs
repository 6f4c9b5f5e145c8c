//! Blocks and block headers
//!
//! A block owns a header, an unordered set of transactions and the root of
//! the merkle tree built over the transaction identifiers. The block
//! identifier is derived, not assigned: it is only set once the consensus
//! search confirms the header.

use crate::core::transaction::{Transaction, TransactionError};
use crate::crypto::{build_tree, sha256_hex, test_hash, MerkleNode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reserved previous-block key of the genesis block
pub const HEAD_KEY: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Block validation errors
#[derive(Error, Debug)]
pub enum BlockError {
    #[error("Block must contain at least one transaction")]
    Empty,
    #[error("Malformed hex field: {0}")]
    MalformedHex(String),
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

/// Confirmation state of a block header
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BlockStatus {
    /// Assembled but no proof of work found yet
    Unconfirmed,
    /// Proof of work found, identifier set
    Confirmed,
}

/// Block header containing chain metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockHeader {
    /// Derived identifier; empty until the header is confirmed
    pub id: String,
    /// Height in the chain, strictly increasing by one
    pub height: u64,
    /// Identifier of the previous block ([`HEAD_KEY`] for genesis)
    pub previous_id: String,
    /// Merkle root over the transaction identifiers
    pub merkle_root: String,
    /// Set when the consensus search confirms the header
    pub timestamp: DateTime<Utc>,
    /// Protocol version
    pub version: u32,
    /// Nonce found by the consensus search
    pub nonce: u64,
    /// Difficulty budget this block was mined against
    pub difficulty: u32,
    /// Confirmation state
    pub status: BlockStatus,
}

impl BlockHeader {
    /// Bytes hashed together with a nonce during the consensus search:
    /// merkle root, previous identifier, height and version.
    pub fn work_bytes(&self) -> Result<Vec<u8>, BlockError> {
        let mut bytes = hex::decode(&self.merkle_root)
            .map_err(|_| BlockError::MalformedHex(self.merkle_root.clone()))?;
        bytes.extend(
            hex::decode(&self.previous_id)
                .map_err(|_| BlockError::MalformedHex(self.previous_id.clone()))?,
        );
        bytes.extend_from_slice(&self.height.to_le_bytes());
        bytes.extend_from_slice(&self.version.to_le_bytes());
        Ok(bytes)
    }

    /// Recompute the identifier for this header's nonce
    pub fn compute_id(&self) -> Result<String, BlockError> {
        let mut bytes = self.work_bytes()?;
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        Ok(sha256_hex(&bytes))
    }

    /// Test the stored identifier against the declared difficulty
    pub fn meets_difficulty(&self) -> bool {
        match hex::decode(&self.id) {
            Ok(bytes) => test_hash(&bytes, self.difficulty),
            Err(_) => false,
        }
    }
}

/// A block in the ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    /// Root node of the merkle tree over the transaction identifiers
    pub merkle: MerkleNode,
}

impl Block {
    /// Assemble an unconfirmed candidate block.
    ///
    /// Callers guarantee at least one transaction (assembly always injects
    /// a blockbase transaction).
    pub fn assemble(
        height: u64,
        previous_id: String,
        version: u32,
        difficulty: u32,
        transactions: Vec<Transaction>,
    ) -> Result<Self, BlockError> {
        let merkle = Self::build_merkle(&transactions)?;
        let merkle_root = hex::encode(&merkle.value);

        let header = BlockHeader {
            id: String::new(),
            height,
            previous_id,
            merkle_root,
            timestamp: Utc::now(),
            version,
            nonce: 0,
            difficulty,
            status: BlockStatus::Unconfirmed,
        };

        Ok(Self {
            header,
            transactions,
            merkle,
        })
    }

    fn build_merkle(transactions: &[Transaction]) -> Result<MerkleNode, BlockError> {
        let mut keys = Vec::with_capacity(transactions.len());
        for txn in transactions {
            keys.push(hex::decode(&txn.id).map_err(|_| BlockError::MalformedHex(txn.id.clone()))?);
        }
        build_tree(&keys).ok_or(BlockError::Empty)
    }

    /// Block identifier (empty until confirmed)
    pub fn id(&self) -> &str {
        &self.header.id
    }

    /// Recompute the merkle root over the transaction identifiers and
    /// require it to match the declared root
    pub fn verify_merkle_root(&self) -> bool {
        match Self::build_merkle(&self.transactions) {
            Ok(root) => hex::encode(root.value) == self.header.merkle_root,
            Err(_) => false,
        }
    }

    /// Recompute the identifier from the header fields and nonce and
    /// require it to match the declared identifier
    pub fn verify_id(&self) -> bool {
        self.header
            .compute_id()
            .map(|id| id == self.header.id)
            .unwrap_or(false)
    }

    /// True if any transaction carries the given identifier
    pub fn contains_transaction(&self, txn_id: &str) -> bool {
        self.transactions.iter().any(|t| t.id == txn_id)
    }

    /// Number of coinbase instructions across all transactions
    pub fn coinbase_count(&self) -> usize {
        self.transactions.iter().map(|t| t.coinbase_count()).sum()
    }
}
