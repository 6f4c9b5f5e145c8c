//! Node acceptance, verification and rules

pub mod node;
pub mod rules;
pub mod verifier;

pub use node::{Node, NodeError, ReceiveOutcome};
pub use rules::{
    BlockRule, PoolCoverageRule, PositiveAmountRule, RuleScope, SingleBlockbaseRule,
    TransactionRule, ACCEPT,
};
pub use verifier::BlockVerifier;
