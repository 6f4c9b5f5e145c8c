//! Proof-of-work consensus search
//!
//! A bounded pool of workers consumes a shared, monotonically increasing
//! nonce sequence, hashing the header work bytes with each nonce until one
//! hash satisfies the difficulty budget. The first successful worker takes
//! the header lock, re-checks that the header is still unconfirmed, commits
//! identifier, nonce and timestamp, and cancels the remaining workers. The
//! caller's cancellation token aborts the whole search with no result.

use crate::core::{Block, BlockStatus};
use crate::crypto::{sha256, test_hash};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Search for a nonce that confirms the block.
///
/// Returns the confirmed block, or `None` if `cancel` fired before any
/// worker succeeded. Blocking; run on a dedicated thread when called from
/// async code.
pub fn build_consensus(
    mut block: Block,
    cancel: &CancellationToken,
    workers: usize,
) -> Option<Block> {
    let Ok(prefix) = block.header.work_bytes() else {
        return None;
    };
    let difficulty = block.header.difficulty;
    let nonces = AtomicU64::new(0);

    {
        let header = Mutex::new(&mut block.header);

        std::thread::scope(|scope| {
            for _ in 0..workers.max(1) {
                scope.spawn(|| {
                    let mut buffer = prefix.clone();
                    let nonce_offset = buffer.len();
                    buffer.extend_from_slice(&0u64.to_le_bytes());

                    while !cancel.is_cancelled() {
                        let nonce = nonces.fetch_add(1, Ordering::Relaxed);
                        buffer[nonce_offset..].copy_from_slice(&nonce.to_le_bytes());
                        let digest = sha256(&buffer);

                        if test_hash(&digest, difficulty) {
                            let mut header = header.lock().expect("header lock poisoned");
                            // Another worker may have succeeded first.
                            if header.status == BlockStatus::Unconfirmed {
                                header.nonce = nonce;
                                header.id = hex::encode(digest);
                                header.timestamp = Utc::now();
                                header.status = BlockStatus::Confirmed;
                                cancel.cancel();
                            }
                            return;
                        }
                    }
                });
            }
        });
    }

    if block.header.status == BlockStatus::Confirmed {
        Some(block)
    } else {
        None
    }
}

/// Re-test a confirmed header's identifier against its difficulty
pub fn verify_consensus(block: &Block) -> bool {
    block.header.status == BlockStatus::Confirmed && block.header.meets_difficulty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::HEAD_KEY;
    use crate::core::{Instruction, InstructionPayload, Transaction};
    use crate::crypto::KeyPair;

    fn candidate(difficulty: u32) -> Block {
        let keys = KeyPair::generate();
        let instruction = Instruction::signed(
            InstructionPayload::Note {
                data: "candidate".to_string(),
            },
            &keys,
        )
        .unwrap();
        let txn = Transaction::from_instructions(vec![instruction]).unwrap();
        Block::assemble(0, HEAD_KEY.to_string(), 1, difficulty, vec![txn]).unwrap()
    }

    #[test]
    fn test_search_confirms_block() {
        let cancel = CancellationToken::new();
        let block = build_consensus(candidate(8), &cancel, 2).unwrap();

        assert_eq!(block.header.status, BlockStatus::Confirmed);
        assert!(block.verify_id());
        assert!(block.header.meets_difficulty());
        assert!(verify_consensus(&block));
    }

    #[test]
    fn test_external_cancellation_yields_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        // An impossible difficulty would otherwise search forever.
        assert!(build_consensus(candidate(u32::MAX), &cancel, 2).is_none());
    }

    #[test]
    fn test_unconfirmed_block_fails_consensus_check() {
        assert!(!verify_consensus(&candidate(0)));
    }

    #[test]
    fn test_tampered_identifier_fails_consensus_check() {
        let cancel = CancellationToken::new();
        let mut block = build_consensus(candidate(300), &cancel, 2).unwrap();
        // Difficulty 300 forces a leading zero byte; all-0xFF cannot pass.
        block.header.id = "ff".repeat(32);
        assert!(!verify_consensus(&block));
    }
}
