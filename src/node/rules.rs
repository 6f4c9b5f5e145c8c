//! Pluggable validation rules
//!
//! Block and transaction rules are registered at node startup and run by
//! the verifier. A rule returns zero to accept; the first non-zero code
//! short-circuits validation and is surfaced as the rejection reason.

use crate::core::{Block, Transaction};
use crate::mining::pool::UnconfirmedPool;
use std::sync::Arc;

/// Return code meaning "rule passed"
pub const ACCEPT: u32 = 0;

/// Rejection code: block must carry exactly one coinbase instruction
pub const REJECT_COINBASE_COUNT: u32 = 100;
/// Rejection code: block covers too little of the pending pool
pub const REJECT_POOL_COVERAGE: u32 = 101;
/// Rejection code: payload amount must be positive
pub const REJECT_ZERO_AMOUNT: u32 = 110;

/// Which submissions a block rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    /// Only blocks competing to become the tip
    Tip,
    /// Every submission
    All,
}

/// Block-level validation rule
pub trait BlockRule: Send + Sync {
    fn scope(&self) -> RuleScope;
    fn validate(&self, block: &Block) -> u32;
}

/// Transaction-level validation rule, run with the transaction's siblings
/// (the other transactions of the same block, or the pending pool)
pub trait TransactionRule: Send + Sync {
    fn validate(&self, txn: &Transaction, siblings: &[&Transaction]) -> u32;
}

/// Requires exactly one coinbase instruction per block
pub struct SingleBlockbaseRule;

impl BlockRule for SingleBlockbaseRule {
    fn scope(&self) -> RuleScope {
        RuleScope::All
    }

    fn validate(&self, block: &Block) -> u32 {
        if block.coinbase_count() == 1 {
            ACCEPT
        } else {
            REJECT_COINBASE_COUNT
        }
    }
}

/// Requires a tip block to carry at least a configured fraction of the
/// locally pending pool. Trivially satisfied when the pool is empty, so
/// fork replays are not held to stale pool expectations.
pub struct PoolCoverageRule {
    pool: Arc<UnconfirmedPool>,
    coverage: f64,
}

impl PoolCoverageRule {
    pub fn new(pool: Arc<UnconfirmedPool>, coverage: f64) -> Self {
        Self { pool, coverage }
    }
}

impl BlockRule for PoolCoverageRule {
    fn scope(&self) -> RuleScope {
        RuleScope::Tip
    }

    fn validate(&self, block: &Block) -> u32 {
        let pending = self.pool.snapshot();
        let required = (pending.len() as f64 * self.coverage).ceil() as usize;
        let present = pending
            .iter()
            .filter(|t| block.contains_transaction(&t.id))
            .count();

        if present >= required {
            ACCEPT
        } else {
            REJECT_POOL_COVERAGE
        }
    }
}

/// Rejects transfer and coinbase payloads with a zero amount
pub struct PositiveAmountRule;

impl TransactionRule for PositiveAmountRule {
    fn validate(&self, txn: &Transaction, _siblings: &[&Transaction]) -> u32 {
        use crate::core::InstructionPayload::{Coinbase, Transfer};

        for instruction in &txn.instructions {
            match &instruction.payload {
                Coinbase { amount, .. } | Transfer { amount, .. } if *amount == 0 => {
                    return REJECT_ZERO_AMOUNT;
                }
                _ => {}
            }
        }
        ACCEPT
    }
}
