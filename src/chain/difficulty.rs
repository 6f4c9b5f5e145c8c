//! Adaptive difficulty retargeting
//!
//! Linear, bounded-step retargeting: the difficulty of the next block is
//! the tip difficulty nudged by one fixed step, driven by the mean
//! inter-block time measured over a trailing sampling window.

use crate::chain::store::ChainStore;
use crate::config::ChainParams;
use chrono::{DateTime, Duration, Utc};

/// Difficulty expected of a block whose predecessor was confirmed at
/// `reference`. Returns the genesis difficulty while no chain exists.
pub fn calculate_difficulty(
    store: &dyn ChainStore,
    params: &ChainParams,
    reference: DateTime<Utc>,
) -> u32 {
    let Some(best) = store.best_header() else {
        return params.genesis_difficulty;
    };

    let since = reference - Duration::seconds(params.sampling_window_secs);
    let Some(actual) = store.average_interval(since, reference) else {
        return best.difficulty;
    };

    if actual < params.target_interval_secs {
        // Blocks arriving too fast.
        best.difficulty.saturating_add(params.difficulty_step)
    } else if actual > params.target_interval_secs {
        best.difficulty
            .saturating_sub(params.difficulty_step)
            .max(1)
    } else {
        best.difficulty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::memory::MemoryStore;
    use crate::core::block::HEAD_KEY;
    use crate::core::{Block, BlockStatus, Instruction, InstructionPayload, Transaction};
    use crate::crypto::KeyPair;

    fn build_chain(intervals_secs: i64, length: u64, difficulty: u32) -> MemoryStore {
        let store = MemoryStore::new();
        let keys = KeyPair::generate();
        let base = Utc::now() - Duration::seconds(intervals_secs * length as i64);
        let mut previous = HEAD_KEY.to_string();

        for height in 0..length {
            let instruction = Instruction::signed(
                InstructionPayload::Note {
                    data: format!("block-{height}"),
                },
                &keys,
            )
            .unwrap();
            let txn = Transaction::from_instructions(vec![instruction]).unwrap();
            let mut block =
                Block::assemble(height, previous.clone(), 1, difficulty, vec![txn]).unwrap();
            block.header.timestamp = base + Duration::seconds(intervals_secs * height as i64);
            block.header.id = block.header.compute_id().unwrap();
            block.header.status = BlockStatus::Confirmed;
            previous = block.header.id.clone();
            store.add_block(block).unwrap();
        }

        store
    }

    #[test]
    fn test_empty_chain_uses_genesis_difficulty() {
        let store = MemoryStore::new();
        let params = ChainParams::default();
        assert_eq!(
            calculate_difficulty(&store, &params, Utc::now()),
            params.genesis_difficulty
        );
    }

    #[test]
    fn test_fast_blocks_raise_difficulty() {
        let params = ChainParams::default();
        let store = build_chain(params.target_interval_secs / 2, 6, 100);
        assert_eq!(
            calculate_difficulty(&store, &params, Utc::now()),
            100 + params.difficulty_step
        );
    }

    #[test]
    fn test_slow_blocks_lower_difficulty() {
        let params = ChainParams::default();
        let store = build_chain(params.target_interval_secs * 3, 6, 100);
        assert_eq!(
            calculate_difficulty(&store, &params, Utc::now()),
            100 - params.difficulty_step
        );
    }

    #[test]
    fn test_on_target_keeps_difficulty() {
        let params = ChainParams::default();
        let store = build_chain(params.target_interval_secs, 6, 100);
        assert_eq!(calculate_difficulty(&store, &params, Utc::now()), 100);
    }

    #[test]
    fn test_no_samples_keeps_tip_difficulty() {
        let params = ChainParams::default();
        let store = build_chain(params.target_interval_secs, 1, 100);
        assert_eq!(calculate_difficulty(&store, &params, Utc::now()), 100);
    }

    #[test]
    fn test_difficulty_never_drops_below_one() {
        let params = ChainParams::default();
        let store = build_chain(params.target_interval_secs * 3, 6, 2);
        assert_eq!(calculate_difficulty(&store, &params, Utc::now()), 1);
    }
}
