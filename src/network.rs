//! Network collaborator boundary
//!
//! The transport layer lives outside this crate; the core only needs a way
//! to broadcast accepted data and to ask peers for blocks it is missing.
//! Inbound traffic is delivered by the collaborator calling the node's
//! receive entry points.

use crate::core::{Block, Transaction};

/// Outbound network surface required by the consensus core
pub trait Network: Send + Sync {
    /// Announce a newly accepted tip block
    fn broadcast_tail(&self, block: &Block);

    /// Announce a newly accepted pending transaction
    fn broadcast_transaction(&self, txn: &Transaction);

    /// Ask peers for the block following `previous_id`
    fn request_next_block(&self, previous_id: &str);

    /// Ask peers for the main-chain block at a height
    fn request_block_by_height(&self, height: u64);

    /// Ask peers for a block by identifier
    fn request_block(&self, block_id: &str);
}

/// No-op network for standalone nodes and tests
#[derive(Default)]
pub struct NullNetwork;

impl Network for NullNetwork {
    fn broadcast_tail(&self, _block: &Block) {}
    fn broadcast_transaction(&self, _txn: &Transaction) {}
    fn request_next_block(&self, _previous_id: &str) {}
    fn request_block_by_height(&self, _height: u64) {}
    fn request_block(&self, _block_id: &str) {}
}
