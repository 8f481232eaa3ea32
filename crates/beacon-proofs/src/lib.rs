//! # Beacon Proofs
//!
//! Merkleization and proof verification for beacon chain validator records:
//! - generalized-index navigation ([`gindex`])
//! - hand-rolled SSZ hash-tree-roots for the two fixed records ([`ssz`],
//!   [`types`])
//! - generalized-index Merkle branch verification ([`merkle`])
//! - the trusted beacon-root source consumed during verification ([`roots`])
//! - the composed validator-inclusion verifier ([`verifier`])
//!
//! Only verification is exposed; the `test-utils` feature adds sparse fixture
//! builders for constructing witnesses in tests.

pub mod gindex;
pub mod merkle;
pub mod preset;
pub mod roots;
pub mod ssz;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod verifier;

pub use merkle::{verify_proof, MerkleError};
pub use roots::{BeaconRootSource, FixedWindowRoots, RootsError};
pub use types::{
    BeaconBlockHeader, HistoricalHeaderWitness, ProvableBeaconBlockHeader, Validator,
    ValidatorWitness,
};
pub use verifier::{verify_beacon_block_header, CLProofVerifier, ProofError};
