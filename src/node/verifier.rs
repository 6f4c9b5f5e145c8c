//! Block and transaction verification pipeline
//!
//! Structural and cryptographic checks first, then the registered
//! pluggable rules. Expected validation failures are reported through
//! return values, never through panics or errors.

use crate::chain::store::ChainStore;
use crate::core::{Block, Transaction};
use crate::mining::consensus::verify_consensus;
use crate::node::rules::{BlockRule, RuleScope, TransactionRule, ACCEPT};
use std::sync::Arc;

/// Rejection code: instruction identifier duplicated within the block
pub const REJECT_DUPLICATE_INSTRUCTION: u32 = 1;
/// Rejection code: instruction identifier or signature invalid
pub const REJECT_BAD_SIGNATURE: u32 = 2;
/// Rejection code: instruction already recorded on the main chain
pub const REJECT_REPLAYED_INSTRUCTION: u32 = 3;
/// Rejection code: transaction identifier does not match its instructions
pub const REJECT_BAD_TXN_ID: u32 = 4;

/// Validates blocks and transactions against structure, crypto and rules
#[derive(Default)]
pub struct BlockVerifier {
    block_rules: Vec<Arc<dyn BlockRule>>,
    txn_rules: Vec<Arc<dyn TransactionRule>>,
}

impl BlockVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a block-level rule
    pub fn with_block_rule(mut self, rule: Arc<dyn BlockRule>) -> Self {
        self.block_rules.push(rule);
        self
    }

    /// Register a transaction-level rule
    pub fn with_transaction_rule(mut self, rule: Arc<dyn TransactionRule>) -> Self {
        self.txn_rules.push(rule);
        self
    }

    /// Structural and cryptographic block checks: proof of work against the
    /// declared difficulty, identifier recomputation, merkle recomputation.
    pub fn verify(&self, block: &Block) -> bool {
        if !verify_consensus(block) {
            log::warn!("block {} fails proof-of-work test", block.id());
            return false;
        }
        if !block.verify_id() {
            log::warn!("block {} declares an identifier it does not hash to", block.id());
            return false;
        }
        if !block.verify_merkle_root() {
            log::warn!("block {} declares a stale merkle root", block.id());
            return false;
        }
        true
    }

    /// Validate every transaction of a block against its siblings, the
    /// replay index and the registered transaction rules
    pub fn verify_transactions(&self, block: &Block, store: &dyn ChainStore) -> bool {
        for (index, txn) in block.transactions.iter().enumerate() {
            let siblings: Vec<&Transaction> = block
                .transactions
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(_, t)| t)
                .collect();

            let code = self.verify_transaction(txn, &siblings, store);
            if code != ACCEPT {
                log::warn!(
                    "block {} rejected: transaction {} failed with code {}",
                    block.id(),
                    txn.id,
                    code
                );
                return false;
            }
        }
        true
    }

    /// Validate one transaction against sibling transactions. Returns
    /// [`ACCEPT`] or the first failing code.
    pub fn verify_transaction(
        &self,
        txn: &Transaction,
        siblings: &[&Transaction],
        store: &dyn ChainStore,
    ) -> u32 {
        for instruction in &txn.instructions {
            if siblings.iter().any(|s| s.contains_instruction(&instruction.id)) {
                return REJECT_DUPLICATE_INSTRUCTION;
            }
            if !instruction.verify() {
                return REJECT_BAD_SIGNATURE;
            }
            if store.have_instruction(&instruction.id) {
                return REJECT_REPLAYED_INSTRUCTION;
            }
        }

        if !txn.verify_id() {
            return REJECT_BAD_TXN_ID;
        }

        for rule in &self.txn_rules {
            let code = rule.validate(txn, siblings);
            if code != ACCEPT {
                return code;
            }
        }

        ACCEPT
    }

    /// Run registered block rules, filtered by tip scope
    pub fn verify_block_rules(&self, block: &Block, tip: bool) -> bool {
        for rule in &self.block_rules {
            if rule.scope() == RuleScope::Tip && !tip {
                continue;
            }
            let code = rule.validate(block);
            if code != ACCEPT {
                log::warn!("block {} rejected by block rule, code {}", block.id(), code);
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::memory::MemoryStore;
    use crate::chain::store::ChainStore;
    use crate::core::block::HEAD_KEY;
    use crate::core::{Instruction, InstructionPayload};
    use crate::crypto::KeyPair;
    use crate::mining::consensus::build_consensus;
    use crate::node::rules::{PositiveAmountRule, SingleBlockbaseRule};
    use tokio_util::sync::CancellationToken;

    fn note_txn(data: &str) -> Transaction {
        let keys = KeyPair::generate();
        let instruction = Instruction::signed(
            InstructionPayload::Note {
                data: data.to_string(),
            },
            &keys,
        )
        .unwrap();
        Transaction::from_instructions(vec![instruction]).unwrap()
    }

    fn mined_block(transactions: Vec<Transaction>) -> Block {
        let candidate =
            Block::assemble(0, HEAD_KEY.to_string(), 1, 8, transactions).unwrap();
        build_consensus(candidate, &CancellationToken::new(), 2).unwrap()
    }

    #[test]
    fn test_verify_accepts_mined_block() {
        let verifier = BlockVerifier::new();
        assert!(verifier.verify(&mined_block(vec![note_txn("a")])));
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let verifier = BlockVerifier::new();

        let mut nonce_tampered = mined_block(vec![note_txn("a")]);
        nonce_tampered.header.nonce += 1;
        assert!(!verifier.verify(&nonce_tampered));

        let mut txn_tampered = mined_block(vec![note_txn("a")]);
        txn_tampered.transactions.push(note_txn("b"));
        assert!(!verifier.verify(&txn_tampered));
    }

    #[test]
    fn test_duplicate_instruction_across_siblings() {
        let verifier = BlockVerifier::new();
        let store = MemoryStore::new();

        let txn = note_txn("a");
        let mut clone_with_extra = txn.clone();
        clone_with_extra.instructions.push(note_txn("b").instructions[0].clone());
        let sibling = Transaction::from_instructions(clone_with_extra.instructions).unwrap();

        let code = verifier.verify_transaction(&txn, &[&sibling], &store);
        assert_eq!(code, REJECT_DUPLICATE_INSTRUCTION);
    }

    #[test]
    fn test_replayed_instruction_rejected() {
        let verifier = BlockVerifier::new();
        let store = MemoryStore::new();

        let txn = note_txn("a");
        let block = mined_block(vec![txn.clone()]);
        store.add_block(block).unwrap();

        let replay = Transaction::from_instructions(txn.instructions.clone()).unwrap();
        let code = verifier.verify_transaction(&replay, &[], &store);
        assert_eq!(code, REJECT_REPLAYED_INSTRUCTION);
    }

    #[test]
    fn test_transaction_id_must_match_contents() {
        let verifier = BlockVerifier::new();
        let store = MemoryStore::new();

        let mut txn = note_txn("a");
        txn.id = "00".repeat(32);
        assert_eq!(
            verifier.verify_transaction(&txn, &[], &store),
            REJECT_BAD_TXN_ID
        );
    }

    #[test]
    fn test_transaction_rules_short_circuit() {
        let verifier = BlockVerifier::new().with_transaction_rule(Arc::new(PositiveAmountRule));
        let store = MemoryStore::new();

        let keys = KeyPair::generate();
        let zero = Instruction::signed(
            InstructionPayload::Transfer {
                to: "x".to_string(),
                amount: 0,
            },
            &keys,
        )
        .unwrap();
        let txn = Transaction::from_instructions(vec![zero]).unwrap();

        assert_ne!(verifier.verify_transaction(&txn, &[], &store), ACCEPT);
    }

    #[test]
    fn test_block_rule_scope_filtering() {
        let verifier = BlockVerifier::new().with_block_rule(Arc::new(SingleBlockbaseRule));
        let block = mined_block(vec![note_txn("no coinbase")]);

        // SingleBlockbaseRule applies to all submissions.
        assert!(!verifier.verify_block_rules(&block, true));
        assert!(!verifier.verify_block_rules(&block, false));
    }
}
