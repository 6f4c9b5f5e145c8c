//! Chain storage and retargeting
//!
//! This module contains:
//! - The chain repository contract (main chain + fork store + replay index)
//! - The in-memory store implementation
//! - JSON snapshot persistence
//! - Difficulty retargeting

pub mod difficulty;
pub mod memory;
pub mod snapshot;
pub mod store;

pub use difficulty::calculate_difficulty;
pub use memory::MemoryStore;
pub use snapshot::{SnapshotError, SnapshotFile};
pub use store::{ChainStore, StoreError};
