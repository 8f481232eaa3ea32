//! Hand-rolled SSZ merkleization primitives.
//!
//! Each record field is serialized into one 32-byte leaf (integers
//! little-endian, booleans as 0/1 in the leaf's first byte, the 48-byte
//! public key through a dedicated pad-and-hash rule), the leaf list is
//! padded to the next power of two with zero leaves, and adjacent leaves are
//! pairwise-hashed until a single root remains.

use crate::merkle::hash_pair;
use sha2::{Digest, Sha256};

/// Domain type of deposit-message signatures.
pub const DOMAIN_DEPOSIT: [u8; 4] = [0x03, 0x00, 0x00, 0x00];

/// A `uint64` leaf: little-endian in the low 8 bytes.
#[must_use]
pub fn uint64_leaf(value: u64) -> [u8; 32] {
    let mut leaf = [0u8; 32];
    leaf[..8].copy_from_slice(&value.to_le_bytes());
    leaf
}

/// A `boolean` leaf: 0 or 1 in the first byte.
#[must_use]
pub fn bool_leaf(value: bool) -> [u8; 32] {
    let mut leaf = [0u8; 32];
    leaf[0] = u8::from(value);
    leaf
}

/// The dedicated public-key rule: the 48 key bytes padded with 16 zero
/// bytes, hashed once.
#[must_use]
pub fn pubkey_root(pubkey: &[u8; 48]) -> [u8; 32] {
    let mut padded = [0u8; 64];
    padded[..48].copy_from_slice(pubkey);
    let mut hasher = Sha256::new();
    hasher.update(padded);
    hasher.finalize().into()
}

/// Merkleize a leaf list: pad with zero leaves to the next power of two,
/// then pairwise-hash until one root remains.
#[must_use]
pub fn merkleize(leaves: &[[u8; 32]]) -> [u8; 32] {
    match leaves.len() {
        0 => [0u8; 32],
        1 => leaves[0],
        n => {
            let width = n.next_power_of_two();
            let mut layer = leaves.to_vec();
            layer.resize(width, [0u8; 32]);
            while layer.len() > 1 {
                layer = layer
                    .chunks_exact(2)
                    .map(|pair| hash_pair(&pair[0], &pair[1]))
                    .collect();
            }
            layer[0]
        }
    }
}

/// Deposit signing domain for a fork version, with a zero
/// genesis-validators root: the domain type followed by the first 28 bytes
/// of the fork-data root.
#[must_use]
pub fn deposit_domain(fork_version: [u8; 4]) -> [u8; 32] {
    let mut version_leaf = [0u8; 32];
    version_leaf[..4].copy_from_slice(&fork_version);
    let fork_data_root = hash_pair(&version_leaf, &[0u8; 32]);

    let mut domain = [0u8; 32];
    domain[..4].copy_from_slice(&DOMAIN_DEPOSIT);
    domain[4..].copy_from_slice(&fork_data_root[..28]);
    domain
}

/// Hash-tree-root of a deposit message: pubkey root, withdrawal
/// credentials, little-endian gwei amount and a zero leaf.
#[must_use]
pub fn deposit_message_root(
    pubkey: &[u8; 48],
    withdrawal_credentials: &[u8; 32],
    amount_gwei: u64,
) -> [u8; 32] {
    merkleize(&[
        pubkey_root(pubkey),
        *withdrawal_credentials,
        uint64_leaf(amount_gwei),
        [0u8; 32],
    ])
}

/// Combine a message root with a signing domain.
#[must_use]
pub fn deposit_signing_root(message_root: &[u8; 32], domain: &[u8; 32]) -> [u8; 32] {
    hash_pair(message_root, domain)
}
