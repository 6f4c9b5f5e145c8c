//! Static consensus parameters
//!
//! All parameters are supplied at node startup and never renegotiated at
//! runtime. Nodes that disagree on these values will not converge.

use serde::{Deserialize, Serialize};

/// Protocol and tuning parameters shared by every component of a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainParams {
    /// Protocol version stamped into block headers
    pub version: u32,
    /// Difficulty assigned to the genesis block
    pub genesis_difficulty: u32,
    /// Linear step applied on each difficulty retarget
    pub difficulty_step: u32,
    /// Desired mean inter-block time in seconds
    pub target_interval_secs: i64,
    /// Trailing window used to measure the actual inter-block time
    pub sampling_window_secs: i64,
    /// Fraction of the locally pending pool a tip block must carry
    pub pool_coverage: f64,
    /// Concurrent workers used by the consensus nonce search
    pub consensus_workers: usize,
    /// Bounded wait for the node's acceptance lock, in milliseconds
    pub receive_timeout_ms: u64,
    /// Miner idle retry interval when no chain exists yet, in milliseconds
    pub retry_interval_ms: u64,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            version: 1,
            genesis_difficulty: 300,
            difficulty_step: 8,
            target_interval_secs: 10,
            sampling_window_secs: 3600,
            pool_coverage: 0.5,
            consensus_workers: 4,
            receive_timeout_ms: 2_000,
            retry_interval_ms: 500,
        }
    }
}
