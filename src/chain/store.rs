//! Chain repository contract
//!
//! Abstracts the two logical stores of a node over any storage engine: the
//! canonical main chain (one block per height, mutated only at the tip end)
//! and the fork store (detached blocks keyed by identifier, possibly
//! holding several competing chains), plus the append-only instruction
//! replay index used for cross-block replay protection.

use crate::core::{Block, BlockHeader};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Repository errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Block not found: {0}")]
    NotFound(String),
    #[error("Duplicate block: {0}")]
    Duplicate(String),
    #[error("Block at height {got} does not extend the tip at height {tip}")]
    NotAtTip { got: u64, tip: u64 },
    #[error("Previous-block pointer does not match the tip")]
    BrokenLink,
    #[error("Fork does not reconnect to the main chain")]
    Disconnected,
    #[error("Backend failure: {0}")]
    Backend(String),
}

/// Storage contract for the canonical chain, the fork store and the
/// instruction replay index.
///
/// Implementations serialize their own mutations; callers rely on each
/// operation being atomic (a commit either lands with its instruction
/// records or not at all).
pub trait ChainStore: Send + Sync {
    /// Commit a block to the main chain at its declared height.
    ///
    /// The block must extend the current tip (or be the genesis block of an
    /// empty store). Its instruction identifiers enter the replay index and
    /// any fork-store copy of the block is dropped.
    fn add_block(&self, block: Block) -> Result<(), StoreError>;

    /// Main-chain membership by identifier
    fn contains_block(&self, id: &str) -> bool;

    /// Fork-store membership by identifier
    fn contains_fork_block(&self, id: &str) -> bool;

    /// True if no block has ever been committed to the main chain
    fn is_empty(&self) -> bool;

    /// Header at the greatest height, if any
    fn best_header(&self) -> Option<BlockHeader>;

    /// Header by identifier, searching the main chain then the fork store
    fn header(&self, id: &str) -> Option<BlockHeader>;

    /// Full block by identifier, searching the main chain then the fork store
    fn block(&self, id: &str) -> Option<Block>;

    /// Main-chain header at an explicit height
    fn header_at(&self, height: u64) -> Option<BlockHeader>;

    /// Park a detached block in the fork store
    fn add_fork_block(&self, block: Block) -> Result<(), StoreError>;

    /// A fork-store header whose previous-block pointer equals `previous_id`
    fn fork_child(&self, previous_id: &str) -> Option<BlockHeader>;

    /// Mean inter-block time, in whole seconds, over main-chain blocks whose
    /// timestamps fall inside `[since, until]`; `None` with fewer than two
    /// samples
    fn average_interval(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Option<i64>;

    /// Move every main-chain block above the given block into the fork
    /// store, from highest height down, removing their instruction records.
    /// `divergent_id` must name a main-chain block; it stays in place.
    fn rewind_chain(&self, divergent_id: &str) -> Result<(), StoreError>;

    /// Walk previous-block pointers from a fork-store block until a block
    /// whose identifier exists in the main chain is found; `None` if the
    /// walk exhausts the fork store without reconnecting.
    fn divergent_header(&self, fork_tip_id: &str) -> Option<BlockHeader>;

    /// Collect the fork-store blocks from the divergence point (exclusive)
    /// to `fork_tip_id` (inclusive), ordered ascending by height.
    fn fork_path(&self, fork_tip_id: &str) -> Result<Vec<Block>, StoreError>;

    /// Replay-index membership for an instruction identifier
    fn have_instruction(&self, instruction_id: &str) -> bool;
}
