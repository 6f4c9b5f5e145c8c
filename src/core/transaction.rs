//! Transactions and signed instructions
//!
//! A transaction is a content-addressed bundle of instructions: its
//! identifier is the merkle root over its instruction identifiers, never
//! assigned by the creator. An instruction is a single signed operation
//! whose identifier is derived from a random per-signing origin key and the
//! signer's public key, binding identity to key material.

use crate::crypto::{merkle_root, random_origin_key, sha256_hex, verify_signature, KeyError, KeyPair};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transaction-related errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Transaction must contain at least one instruction")]
    Empty,
    #[error("Malformed hex field: {0}")]
    MalformedHex(String),
    #[error("Crypto error: {0}")]
    Crypto(#[from] KeyError),
}

/// Application payload carried by an instruction.
///
/// The tag is the extension point for new payload kinds; validation beyond
/// the signature is supplied by transaction rules registered at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstructionPayload {
    /// Miner reward, injected during block assembly
    Coinbase { to: String, amount: u64 },
    /// Value transfer to a recipient key
    Transfer { to: String, amount: u64 },
    /// Opaque application data
    Note { data: String },
}

impl InstructionPayload {
    /// Byte projection covered by the instruction signature
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        match self {
            Self::Coinbase { to, amount } => {
                bytes.push(0x00);
                bytes.extend_from_slice(to.as_bytes());
                bytes.extend_from_slice(&amount.to_le_bytes());
            }
            Self::Transfer { to, amount } => {
                bytes.push(0x01);
                bytes.extend_from_slice(to.as_bytes());
                bytes.extend_from_slice(&amount.to_le_bytes());
            }
            Self::Note { data } => {
                bytes.push(0x02);
                bytes.extend_from_slice(data.as_bytes());
            }
        }
        bytes
    }

    pub fn is_coinbase(&self) -> bool {
        matches!(self, Self::Coinbase { .. })
    }
}

/// A single signed operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instruction {
    /// Content-derived identifier: sha256(origin_key ∥ public_key)
    pub id: String,
    /// Random per-signing nonce, hex encoded
    pub origin_key: String,
    /// Signer's compressed public key, hex encoded
    pub public_key: String,
    /// Compact ECDSA signature over the payload projection, hex encoded
    pub signature: String,
    /// Application payload
    pub payload: InstructionPayload,
}

impl Instruction {
    /// Sign a payload, deriving a fresh identifier
    pub fn signed(payload: InstructionPayload, keys: &KeyPair) -> Result<Self, KeyError> {
        let origin_key = random_origin_key();
        let public_key = keys.public_key.serialize().to_vec();

        let mut id_input = origin_key.clone();
        id_input.extend_from_slice(&public_key);

        let signature = keys.sign(&payload.signable_bytes())?;

        Ok(Self {
            id: sha256_hex(&id_input),
            origin_key: hex::encode(origin_key),
            public_key: hex::encode(public_key),
            signature: hex::encode(signature),
            payload,
        })
    }

    /// Verify identifier derivation and signature.
    ///
    /// The identifier is recomputed from the origin key and public key
    /// before the signature check, so an instruction cannot claim an
    /// identifier that its key material does not produce.
    pub fn verify(&self) -> bool {
        let (Ok(origin_key), Ok(public_key), Ok(signature)) = (
            hex::decode(&self.origin_key),
            hex::decode(&self.public_key),
            hex::decode(&self.signature),
        ) else {
            return false;
        };

        let mut id_input = origin_key;
        id_input.extend_from_slice(&public_key);
        if sha256_hex(&id_input) != self.id {
            return false;
        }

        verify_signature(&public_key, &self.payload.signable_bytes(), &signature)
            .unwrap_or(false)
    }
}

/// A content-addressed bundle of instructions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// Merkle root over the instruction identifiers
    pub id: String,
    pub instructions: Vec<Instruction>,
}

impl Transaction {
    /// Build a transaction from instructions, deriving its identifier
    pub fn from_instructions(instructions: Vec<Instruction>) -> Result<Self, TransactionError> {
        let id = Self::compute_id(&instructions)?;
        Ok(Self { id, instructions })
    }

    /// Merkle root over the instruction identifiers of the given set
    pub fn compute_id(instructions: &[Instruction]) -> Result<String, TransactionError> {
        if instructions.is_empty() {
            return Err(TransactionError::Empty);
        }

        let mut keys = Vec::with_capacity(instructions.len());
        for instruction in instructions {
            let bytes = hex::decode(&instruction.id)
                .map_err(|_| TransactionError::MalformedHex(instruction.id.clone()))?;
            keys.push(bytes);
        }

        // Non-empty input always yields a root.
        Ok(hex::encode(merkle_root(&keys).unwrap_or_default()))
    }

    /// True if the declared identifier matches the instruction set
    pub fn verify_id(&self) -> bool {
        Self::compute_id(&self.instructions)
            .map(|id| id == self.id)
            .unwrap_or(false)
    }

    /// True if any instruction carries the given identifier
    pub fn contains_instruction(&self, instruction_id: &str) -> bool {
        self.instructions.iter().any(|i| i.id == instruction_id)
    }

    /// Number of coinbase instructions in this transaction
    pub fn coinbase_count(&self) -> usize {
        self.instructions
            .iter()
            .filter(|i| i.payload.is_coinbase())
            .count()
    }
}
