//! Generalized-index Merkle branch verification.
//!
//! A branch is verified by walking from the leaf to the root: at each step
//! the low bit of the gindex decides whether the next branch element is the
//! left or the right sibling, the pair is hashed with a single SHA-256
//! round, and the gindex is halved. The walk must land exactly on gindex 1
//! with the branch fully consumed.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Defects a branch can exhibit. The branch length must equal the depth
/// encoded in the gindex; both over- and under-supplying siblings is
/// detected before the root comparison.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MerkleError {
    /// The supplied branch has no elements at all.
    #[error("proof is empty")]
    EmptyProof,
    /// The gindex reached the root before the branch was exhausted.
    #[error("branch has an extra item")]
    BranchHasExtraItem,
    /// The branch was exhausted before the gindex reached the root.
    #[error("branch has a missing item")]
    BranchHasMissingItem,
    /// The reconstructed root does not match the expected root.
    #[error("invalid proof")]
    InvalidProof,
}

/// SHA-256 of the 64-byte concatenation of two nodes.
#[must_use]
pub fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Verify that `leaf` sits at `gindex` under `root`, given the bottom-up
/// sibling branch `proof`. Pure; succeeds silently.
///
/// # Errors
///
/// One of [`MerkleError`] per the branch-length and root checks above.
pub fn verify_proof(
    proof: &[[u8; 32]],
    root: &[u8; 32],
    leaf: &[u8; 32],
    gindex: u64,
) -> Result<(), MerkleError> {
    if proof.is_empty() {
        return Err(MerkleError::EmptyProof);
    }

    let mut node = *leaf;
    let mut index = gindex;
    for sibling in proof {
        if index <= 1 {
            return Err(MerkleError::BranchHasExtraItem);
        }
        node = if index & 1 == 1 {
            hash_pair(sibling, &node)
        } else {
            hash_pair(&node, sibling)
        };
        index >>= 1;
    }
    if index != 1 {
        return Err(MerkleError::BranchHasMissingItem);
    }
    if node != *root {
        return Err(MerkleError::InvalidProof);
    }
    Ok(())
}
