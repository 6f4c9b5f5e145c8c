//! Block miner
//!
//! Drives the assemble → search → submit loop: snapshot the pool, append a
//! freshly built blockbase transaction, run the consensus search, and hand
//! the confirmed block to the node through the same acceptance path used
//! for network-delivered blocks. Any pool mutation cancels the in-flight
//! search so mining always works on current content.

use crate::chain::difficulty::calculate_difficulty;
use crate::core::block::HEAD_KEY;
use crate::core::{Block, Instruction, InstructionPayload, Transaction, TransactionError};
use crate::crypto::KeyPair;
use crate::mining::consensus::build_consensus;
use crate::node::{Node, ReceiveOutcome};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Builds the blockbase transaction injected into every assembled block
pub trait BlockbaseBuilder: Send + Sync {
    fn build(&self, height: u64) -> Result<Transaction, TransactionError>;
}

/// Default blockbase: a signed coinbase reward to the miner's own key
pub struct RewardBlockbase {
    keys: KeyPair,
    amount: u64,
}

impl RewardBlockbase {
    pub fn new(keys: KeyPair, amount: u64) -> Self {
        Self { keys, amount }
    }
}

impl BlockbaseBuilder for RewardBlockbase {
    fn build(&self, _height: u64) -> Result<Transaction, TransactionError> {
        let instruction = Instruction::signed(
            InstructionPayload::Coinbase {
                to: self.keys.public_key_hex(),
                amount: self.amount,
            },
            &self.keys,
        )?;
        Transaction::from_instructions(vec![instruction])
    }
}

/// Mines blocks on top of the node's current tip until stopped
pub struct Miner {
    node: Arc<Node>,
    blockbase: Arc<dyn BlockbaseBuilder>,
    shutdown: CancellationToken,
    /// Synthesize a genesis block when the chain is empty
    genesis: bool,
}

impl Miner {
    pub fn new(node: Arc<Node>, blockbase: Arc<dyn BlockbaseBuilder>, genesis: bool) -> Self {
        Self {
            node,
            blockbase,
            shutdown: CancellationToken::new(),
            genesis,
        }
    }

    /// Cancel the mining loop and any in-flight search
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Run the mining loop until [`stop`](Self::stop) is called
    pub async fn run(&self) {
        let params = self.node.params().clone();
        let store = self.node.store();
        let pool = self.node.pool();
        let network = self.node.network();
        let retry = Duration::from_millis(params.retry_interval_ms);

        while !self.shutdown.is_cancelled() {
            let best = store.best_header();

            let (height, previous_id, reference) = match best {
                Some(b) => (b.height + 1, b.id, b.timestamp),
                None if self.genesis => (0, HEAD_KEY.to_string(), Utc::now()),
                None => {
                    // No chain yet and not the genesis miner; wait for peers.
                    tokio::time::sleep(retry).await;
                    continue;
                }
            };

            // Subscribe before snapshotting so no mutation slips between
            // the snapshot and the start of the search.
            let mut pool_changes = pool.subscribe();
            let mut transactions = pool.snapshot();

            let blockbase = match self.blockbase.build(height) {
                Ok(txn) => txn,
                Err(e) => {
                    log::warn!("blockbase assembly failed: {}", e);
                    tokio::time::sleep(retry).await;
                    continue;
                }
            };
            transactions.push(blockbase);

            let difficulty = calculate_difficulty(&*store, &params, reference);
            let candidate = match Block::assemble(
                height,
                previous_id,
                params.version,
                difficulty,
                transactions,
            ) {
                Ok(block) => block,
                Err(e) => {
                    log::warn!("block assembly failed: {}", e);
                    tokio::time::sleep(retry).await;
                    continue;
                }
            };

            let search = self.shutdown.child_token();
            let watcher = {
                let search = search.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = pool_changes.changed() => {
                            log::debug!("pool changed, cancelling consensus search");
                            search.cancel();
                        }
                        _ = search.cancelled() => {}
                    }
                })
            };

            let workers = params.consensus_workers;
            let mined = tokio::task::spawn_blocking({
                let search = search.clone();
                move || build_consensus(candidate, &search, workers)
            })
            .await
            .ok()
            .flatten();

            search.cancel();
            let _ = watcher.await;

            let Some(block) = mined else {
                // Cancelled: reassemble against the current pool and tip.
                continue;
            };

            log::info!(
                "mined block {} at height {} (difficulty {})",
                block.id(),
                block.header.height,
                block.header.difficulty
            );

            match self.node.receive_block(block.clone()).await {
                Ok(ReceiveOutcome::Relay) => network.broadcast_tail(&block),
                Ok(outcome) => log::debug!("mined block not relayed: {:?}", outcome),
                Err(e) => log::warn!("mined block submission failed: {}", e),
            }
        }
    }
}
