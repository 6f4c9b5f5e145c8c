//! Blockchain node acceptance state machine
//!
//! One serialized entry point decides what happens to every inbound block,
//! whether it was mined locally or delivered by a peer: commit to the main
//! chain, park in the fork store, trigger a rebase onto a better branch, or
//! reject. Serialization through a single lock linearizes reorg decisions;
//! the lock is taken with a bounded wait and an expired wait is a transient
//! failure, not corruption.

use crate::chain::difficulty::calculate_difficulty;
use crate::chain::store::{ChainStore, StoreError};
use crate::config::ChainParams;
use crate::core::block::HEAD_KEY;
use crate::core::{Block, BlockHeader, Transaction};
use crate::mining::pool::UnconfirmedPool;
use crate::network::Network;
use crate::node::rules::ACCEPT;
use crate::node::verifier::BlockVerifier;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Node errors (backend failures, not validation outcomes)
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Acceptance lock wait expired")]
    Busy,
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// What the caller should do with a received item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Not useful (duplicate, not yet connectable, not the tip); no trust
    /// signal
    Ignore,
    /// Accepted as the new tip; worth propagating
    Relay,
    /// Structurally or cryptographically invalid; signal the sender
    Demerit,
}

/// A ledger node: acceptance state machine plus fork rebase orchestration
pub struct Node {
    params: ChainParams,
    store: Arc<dyn ChainStore>,
    pool: Arc<UnconfirmedPool>,
    verifier: BlockVerifier,
    network: Arc<dyn Network>,
    accept: Mutex<()>,
}

impl Node {
    pub fn new(
        params: ChainParams,
        store: Arc<dyn ChainStore>,
        pool: Arc<UnconfirmedPool>,
        verifier: BlockVerifier,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            params,
            store,
            pool,
            verifier,
            network,
            accept: Mutex::new(()),
        }
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn store(&self) -> Arc<dyn ChainStore> {
        self.store.clone()
    }

    pub fn pool(&self) -> Arc<UnconfirmedPool> {
        self.pool.clone()
    }

    pub fn network(&self) -> Arc<dyn Network> {
        self.network.clone()
    }

    /// Receive a block, locally mined or delivered by a peer.
    ///
    /// Serialized: no two blocks are evaluated for placement concurrently.
    pub async fn receive_block(&self, block: Block) -> Result<ReceiveOutcome, NodeError> {
        let wait = Duration::from_millis(self.params.receive_timeout_ms);
        let _guard = tokio::time::timeout(wait, self.accept.lock())
            .await
            .map_err(|_| NodeError::Busy)?;
        self.apply_block(block)
    }

    /// Placement decision for one block. Runs under the acceptance lock;
    /// fork replay re-enters here directly.
    fn apply_block(&self, block: Block) -> Result<ReceiveOutcome, NodeError> {
        let id = block.header.id.clone();

        // Already canonical.
        if self.store.contains_block(&id) {
            return Ok(ReceiveOutcome::Ignore);
        }

        // Structural and cryptographic validity.
        if !self.verifier.verify(&block) {
            return Ok(ReceiveOutcome::Demerit);
        }

        // Tip-scope block rules.
        if !self.verifier.verify_block_rules(&block, true) {
            return Ok(ReceiveOutcome::Demerit);
        }

        let best = self.store.best_header();
        let previous = self.store.header(&block.header.previous_id);
        let is_tip = match &best {
            Some(b) => block.header.previous_id == b.id,
            None => block.header.previous_id == HEAD_KEY,
        };

        let (main_chain, rebase) = match &previous {
            Some(prev) => {
                // A block cannot precede its predecessor or skip a height.
                if block.header.timestamp < prev.timestamp
                    || block.header.height != prev.height + 1
                {
                    log::warn!(
                        "block {} at height {} is out of order with its predecessor",
                        id,
                        block.header.height
                    );
                    return Ok(ReceiveOutcome::Ignore);
                }

                let main_chain = is_tip
                    || (self.store.header_at(block.header.height).is_none()
                        && self.store.contains_block(&prev.id));

                if main_chain {
                    let expected =
                        calculate_difficulty(&*self.store, &self.params, prev.timestamp);
                    if block.header.difficulty < expected {
                        log::warn!(
                            "block {} declares difficulty {} below expected {}",
                            id,
                            block.header.difficulty,
                            expected
                        );
                        return Ok(ReceiveOutcome::Ignore);
                    }
                }

                let rebase = best
                    .as_ref()
                    .map(|b| block.header.height > b.height)
                    .unwrap_or(false)
                    && !main_chain;
                (main_chain, rebase)
            }
            None => {
                if self.store.is_empty() && block.header.previous_id == HEAD_KEY {
                    (true, false)
                } else {
                    // Unknown ancestry: park the block and chase the gap.
                    if !self.store.contains_fork_block(&id) {
                        self.store.add_fork_block(block.clone())?;
                    }
                    log::info!(
                        "block {} has unknown predecessor {}, requesting it",
                        id,
                        block.header.previous_id
                    );
                    self.network.request_block(&block.header.previous_id);
                    return Ok(ReceiveOutcome::Ignore);
                }
            }
        };

        if main_chain {
            if !self.verifier.verify_transactions(&block, &*self.store) {
                return Ok(ReceiveOutcome::Demerit);
            }
            let height = block.header.height;
            self.store.add_block(block.clone())?;
            self.pool.remove(&block.transactions);
            log::info!("committed block {} at height {}", id, height);

            // A parked descendant may have become connectable.
            if let Some(child) = self.store.fork_child(&id) {
                if let Some(next) = self.store.block(&child.id) {
                    self.apply_block(next)?;
                }
            }
        } else {
            if !self.store.contains_fork_block(&id) {
                self.store.add_fork_block(block.clone())?;
            }
            if rebase {
                match self.store.divergent_header(&id) {
                    Some(divergent) => self.rebase_chain(&divergent.id, &id)?,
                    None => {
                        // Fork does not reconnect yet; ask for the deepest
                        // missing ancestor.
                        if let Some(base) = self.find_known_forkbase(&id) {
                            self.network.request_block(&base.previous_id);
                        }
                    }
                }
            }
        }

        Ok(if is_tip {
            ReceiveOutcome::Relay
        } else {
            ReceiveOutcome::Ignore
        })
    }

    /// Reorganize the main chain onto the fork ending at `target_tip_id`.
    ///
    /// Rewinds to the divergence point, then replays the fork path through
    /// the acceptance logic in ascending height order. A replay failure
    /// abandons the fork and leaves the chain at the replayed prefix.
    fn rebase_chain(&self, divergent_id: &str, target_tip_id: &str) -> Result<(), NodeError> {
        log::info!(
            "rebasing chain onto fork {} diverging at {}",
            target_tip_id,
            divergent_id
        );

        self.store.rewind_chain(divergent_id)?;
        let path = self.store.fork_path(target_tip_id)?;

        for block in path {
            let height = block.header.height;
            if self.apply_block(block)? == ReceiveOutcome::Demerit {
                log::warn!(
                    "fork replay failed at height {}; keeping the replayed prefix",
                    height
                );
                break;
            }
        }

        Ok(())
    }

    /// Walk fork-store ancestry from a tip to the deepest block whose
    /// parent is unknown; that parent is what peers must supply next.
    fn find_known_forkbase(&self, fork_tip_id: &str) -> Option<BlockHeader> {
        let mut current = self.store.header(fork_tip_id)?;
        while self.store.contains_fork_block(&current.previous_id) {
            current = self.store.header(&current.previous_id)?;
        }
        Some(current)
    }

    /// Receive a pending transaction from a peer or a local submitter.
    ///
    /// Validated against the current pool contents as siblings; relayed
    /// only when it enters the pool for the first time.
    pub fn receive_transaction(&self, txn: Transaction) -> ReceiveOutcome {
        let pending = self.pool.snapshot();
        let siblings: Vec<&Transaction> = pending.iter().collect();

        let code = self.verifier.verify_transaction(&txn, &siblings, &*self.store);
        if code != ACCEPT {
            log::debug!("transaction {} rejected with code {}", txn.id, code);
            return ReceiveOutcome::Ignore;
        }

        if self.pool.add(txn) {
            ReceiveOutcome::Relay
        } else {
            ReceiveOutcome::Ignore
        }
    }
}
