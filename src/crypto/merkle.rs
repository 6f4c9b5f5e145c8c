//! Merkle tree construction over content identifiers
//!
//! Binds a set of byte keys into a single root hash. Keys are sorted before
//! every pairing round, so the same set always yields the same root
//! regardless of insertion order; block and transaction identifiers rely on
//! this to be reproducible across independent validators.
//!
//! An odd element at any level is paired with itself. This is kept for
//! protocol compatibility even though it weakens uniqueness for degenerate
//! duplicate inputs; changing it would require a version bump.

use super::hash::sha256;
use serde::{Deserialize, Serialize};

/// A node in the merkle tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MerkleNode {
    pub value: Vec<u8>,
    pub left: Option<Box<MerkleNode>>,
    pub right: Option<Box<MerkleNode>>,
}

impl MerkleNode {
    /// Create a leaf node
    pub fn leaf(value: Vec<u8>) -> Self {
        Self {
            value,
            left: None,
            right: None,
        }
    }

    /// Create an internal node from two children
    fn internal(value: Vec<u8>, left: MerkleNode, right: MerkleNode) -> Self {
        Self {
            value,
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
        }
    }

    /// True if this node has no children
    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// Build a merkle tree over the given keys using SHA-256
pub fn build_tree(keys: &[Vec<u8>]) -> Option<MerkleNode> {
    build_tree_with(keys, sha256)
}

/// Root value over the given keys, as returned by [`build_tree`]
pub fn merkle_root(keys: &[Vec<u8>]) -> Option<Vec<u8>> {
    build_tree(keys).map(|n| n.value)
}

/// Build a merkle tree with an explicit hash function.
///
/// Each round sorts the current level byte-lexicographically by node value,
/// pairs adjacent nodes (an odd trailing node pairs with a copy of itself)
/// and hashes `left ∥ right` into the parent, until one node remains.
/// Returns `None` only for empty input.
pub fn build_tree_with<F>(keys: &[Vec<u8>], hasher: F) -> Option<MerkleNode>
where
    F: Fn(&[u8]) -> Vec<u8>,
{
    if keys.is_empty() {
        return None;
    }

    let mut nodes: Vec<MerkleNode> = keys.iter().cloned().map(MerkleNode::leaf).collect();

    while nodes.len() > 1 {
        nodes.sort_by(|a, b| a.value.cmp(&b.value));

        let mut next_level = Vec::with_capacity(nodes.len().div_ceil(2));
        let mut iter = nodes.into_iter();

        while let Some(left) = iter.next() {
            let right = iter.next().unwrap_or_else(|| left.clone());

            let mut combined = left.value.clone();
            combined.extend_from_slice(&right.value);
            let value = hasher(&combined);

            next_level.push(MerkleNode::internal(value, left, right));
        }

        nodes = next_level;
    }

    nodes.into_iter().next()
}
