//! Composed validator-inclusion verification.
//!
//! Ties the trusted-root source, header self-hashing and generalized-index
//! branch verification together: a proof call either anchors a header
//! directly in the root source, or takes one extra hop through the
//! historical summaries to reach a header older than the retention window.

use crate::gindex;
use crate::merkle::{self, MerkleError};
use crate::roots::BeaconRootSource;
use crate::types::{
    BeaconBlockHeader, HistoricalHeaderWitness, ProvableBeaconBlockHeader, ValidatorWitness,
};
use thiserror::Error;

/// Proof-composition failures. Branch-level defects surface as
/// [`MerkleError`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProofError {
    /// No trusted root is recorded for the referenced timestamp.
    #[error("no trusted beacon root for timestamp {0}")]
    RootNotFound(u64),
    /// The supplied header does not hash to the trusted root.
    #[error("invalid block header")]
    InvalidBlockHeader,
    /// The caller-supplied historical gindex does not descend from the
    /// historical-summaries field.
    #[error("historical root gindex {0:#x} is outside the historical summaries subtree")]
    InvalidRootGIndex(u64),
    /// The inclusion branch failed.
    #[error(transparent)]
    Merkle(#[from] MerkleError),
}

/// Require that `header` hashes to `expected_root`. Used when the header
/// itself, not one of its sub-fields, must match a trusted root.
///
/// # Errors
///
/// [`ProofError::InvalidBlockHeader`] on mismatch.
pub fn verify_beacon_block_header(
    header: &BeaconBlockHeader,
    expected_root: &[u8; 32],
) -> Result<(), ProofError> {
    if header.hash_tree_root() == *expected_root {
        Ok(())
    } else {
        Err(ProofError::InvalidBlockHeader)
    }
}

/// Validator-inclusion verifier over a trusted root source.
#[derive(Debug, Clone)]
pub struct CLProofVerifier<R> {
    roots: R,
}

impl<R: BeaconRootSource> CLProofVerifier<R> {
    /// Wrap a trusted root source.
    pub fn new(roots: R) -> Self {
        Self { roots }
    }

    /// Shared access to the root source.
    pub fn roots(&self) -> &R {
        &self.roots
    }

    /// Exclusive access to the root source (e.g. to record roots).
    pub fn roots_mut(&mut self) -> &mut R {
        &mut self.roots
    }

    fn trusted_root(&self, timestamp: u64) -> Result<[u8; 32], ProofError> {
        self.roots
            .root_at(timestamp)
            .ok_or(ProofError::RootNotFound(timestamp))
    }

    /// Verify that the witnessed validator record is part of the registry
    /// committed to by `header`, which must itself hash to the trusted root
    /// recorded at `header.root_timestamp`.
    ///
    /// # Errors
    ///
    /// [`ProofError`] on a missing root, header mismatch or branch defect.
    pub fn verify_validator_proof(
        &self,
        header: &ProvableBeaconBlockHeader,
        witness: &ValidatorWitness,
    ) -> Result<(), ProofError> {
        let trusted = self.trusted_root(header.root_timestamp)?;
        verify_beacon_block_header(&header.header, &trusted)?;
        self.verify_validator_inclusion(&header.header.state_root, witness)?;
        tracing::debug!(
            validator_index = witness.validator_index,
            slot = header.header.slot,
            "validator inclusion proven"
        );
        Ok(())
    }

    /// Like [`Self::verify_validator_proof`], with one extra hop: the old
    /// header is first proven under the current block root at the
    /// caller-supplied historical gindex, then the validator is proven
    /// against the old header's state root.
    ///
    /// # Errors
    ///
    /// [`ProofError`], including [`ProofError::InvalidRootGIndex`] when the
    /// supplied gindex escapes the historical-summaries subtree.
    pub fn verify_historical_validator_proof(
        &self,
        header: &ProvableBeaconBlockHeader,
        historical: &HistoricalHeaderWitness,
        witness: &ValidatorWitness,
    ) -> Result<(), ProofError> {
        let trusted = self.trusted_root(header.root_timestamp)?;
        verify_beacon_block_header(&header.header, &trusted)?;

        if !gindex::is_ancestor(gindex::historical_summaries_gindex(), historical.root_gindex) {
            return Err(ProofError::InvalidRootGIndex(historical.root_gindex));
        }
        merkle::verify_proof(
            &historical.proof,
            &trusted,
            &historical.header.hash_tree_root(),
            historical.root_gindex,
        )?;

        self.verify_validator_inclusion(&historical.header.state_root, witness)?;
        tracing::debug!(
            validator_index = witness.validator_index,
            old_slot = historical.header.slot,
            slot = header.header.slot,
            "historical validator inclusion proven"
        );
        Ok(())
    }

    fn verify_validator_inclusion(
        &self,
        state_root: &[u8; 32],
        witness: &ValidatorWitness,
    ) -> Result<(), ProofError> {
        let leaf = witness.validator.hash_tree_root();
        merkle::verify_proof(
            &witness.proof,
            state_root,
            &leaf,
            gindex::validator_gindex(witness.validator_index),
        )?;
        Ok(())
    }
}
