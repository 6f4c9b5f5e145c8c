//! Core ledger data types
//!
//! This module contains the fundamental building blocks:
//! - Instructions (signed operations with content-derived identifiers)
//! - Transactions (content-addressed instruction bundles)
//! - Blocks (headers, transaction sets and their merkle binding)

pub mod block;
pub mod transaction;

pub use block::{Block, BlockError, BlockHeader, BlockStatus, HEAD_KEY};
pub use transaction::{Instruction, InstructionPayload, Transaction, TransactionError};
