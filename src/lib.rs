//! tinyledger: a peer-to-peer proof-of-work ledger node
//!
//! This crate provides the consensus and chain-reorganization engine of a
//! small ledger network:
//! - Proof-of-work mining with a cancellable concurrent nonce search
//! - A block/transaction verification pipeline with pluggable rules
//! - A canonical chain store with fork storage, rewind and divergence search
//! - Fork rebase: reorganizing the tip onto a better competing branch
//! - An unconfirmed-transaction pool whose change events cancel in-flight
//!   mining
//!
//! Wire transport, peer discovery and durable storage engines live behind
//! small collaborator traits ([`network::Network`], [`chain::ChainStore`])
//! and are supplied by the embedding application.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tinyledger::chain::MemoryStore;
//! use tinyledger::config::ChainParams;
//! use tinyledger::crypto::KeyPair;
//! use tinyledger::mining::{Miner, RewardBlockbase, UnconfirmedPool};
//! use tinyledger::network::NullNetwork;
//! use tinyledger::node::{BlockVerifier, Node};
//!
//! # async fn run() {
//! let node = Arc::new(Node::new(
//!     ChainParams::default(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(UnconfirmedPool::new()),
//!     BlockVerifier::new(),
//!     Arc::new(NullNetwork),
//! ));
//!
//! let blockbase = Arc::new(RewardBlockbase::new(KeyPair::generate(), 50));
//! let miner = Miner::new(node, blockbase, true);
//! miner.run().await;
//! # }
//! ```

pub mod chain;
pub mod config;
pub mod core;
pub mod crypto;
pub mod mining;
pub mod network;
pub mod node;

// Re-export commonly used types
pub use chain::{calculate_difficulty, ChainStore, MemoryStore, SnapshotFile, StoreError};
pub use config::ChainParams;
pub use core::{Block, BlockHeader, BlockStatus, Instruction, InstructionPayload, Transaction, HEAD_KEY};
pub use crypto::KeyPair;
pub use mining::{Miner, RewardBlockbase, UnconfirmedPool};
pub use network::{Network, NullNetwork};
pub use node::{BlockVerifier, Node, NodeError, ReceiveOutcome};
