//! Mining: pending pool, consensus search and the miner loop

pub mod consensus;
pub mod miner;
pub mod pool;

pub use consensus::{build_consensus, verify_consensus};
pub use miner::{BlockbaseBuilder, Miner, RewardBlockbase};
pub use pool::UnconfirmedPool;
