//! Sparse fixture builders for verification tests.
//!
//! Builds the pieces of a beacon state tree that proofs touch without ever
//! allocating full trees: absent subtrees collapse to precomputed zero
//! hashes, so even registry branches at depth 40 cost one hash per level.
//! Everything here produces witnesses for the verifier; nothing is part of
//! the shipped verification surface.

use crate::gindex;
use crate::merkle::hash_pair;
use crate::preset;
use crate::ssz;
use crate::types::{
    BeaconBlockHeader, HistoricalHeaderWitness, ProvableBeaconBlockHeader, Validator,
    ValidatorWitness,
};

/// Number of fields in the post-Electra beacon state.
pub const BEACON_STATE_FIELDS: usize = 37;

const MAX_DEPTH: usize = 64;

/// Precomputed roots of all-zero subtrees, indexed by subtree depth.
#[derive(Debug, Clone)]
pub struct ZeroHashes([[u8; 32]; MAX_DEPTH + 1]);

impl ZeroHashes {
    /// Build the table: level 0 is the zero leaf, each level hashes the
    /// previous one with itself.
    #[must_use]
    pub fn new() -> Self {
        let mut table = [[0u8; 32]; MAX_DEPTH + 1];
        for level in 1..=MAX_DEPTH {
            table[level] = hash_pair(&table[level - 1], &table[level - 1]);
        }
        Self(table)
    }

    /// Root of an all-zero subtree of the given depth.
    #[must_use]
    pub fn at(&self, depth: u32) -> [u8; 32] {
        self.0[depth as usize]
    }
}

impl Default for ZeroHashes {
    fn default() -> Self {
        Self::new()
    }
}

fn leaf_at(leaves: &[[u8; 32]], index: usize) -> [u8; 32] {
    leaves.get(index).copied().unwrap_or([0u8; 32])
}

/// Root of the subtree of `depth` levels whose leftmost leaf is
/// `leaves[start]`; leaves past the end of the slice are zero.
#[must_use]
pub fn subtree_root(leaves: &[[u8; 32]], start: usize, depth: u32, zh: &ZeroHashes) -> [u8; 32] {
    if start >= leaves.len() {
        return zh.at(depth);
    }
    if depth == 0 {
        return leaf_at(leaves, start);
    }
    let half = 1usize << (depth - 1);
    let left = subtree_root(leaves, start, depth - 1, zh);
    let right = subtree_root(leaves, start + half, depth - 1, zh);
    hash_pair(&left, &right)
}

/// Bottom-up sibling branch for `leaves[index]` in a tree of `depth`
/// levels.
#[must_use]
pub fn branch_for_leaf(
    leaves: &[[u8; 32]],
    index: usize,
    depth: u32,
    zh: &ZeroHashes,
) -> Vec<[u8; 32]> {
    assert!(index < (1usize << depth.min(63)), "leaf index out of range");
    let mut branch = Vec::with_capacity(depth as usize);
    let mut pos = index;
    for level in 0..depth {
        let sibling = pos ^ 1;
        branch.push(subtree_root(leaves, sibling << level, level, zh));
        pos >>= 1;
    }
    branch
}

/// The SSZ list length mix-in leaf.
#[must_use]
pub fn length_leaf(length: usize) -> [u8; 32] {
    ssz::uint64_leaf(length as u64)
}

/// A beacon state carrying only a validator registry, able to hand out
/// inclusion witnesses for any of its validators.
#[derive(Debug, Clone)]
pub struct RegistryFixture {
    validators: Vec<Validator>,
    validator_roots: Vec<[u8; 32]>,
    state_field_roots: Vec<[u8; 32]>,
    zh: ZeroHashes,
}

impl RegistryFixture {
    /// State whose registry holds exactly `validators`; all other state
    /// fields are zero subtrees.
    #[must_use]
    pub fn new(validators: Vec<Validator>) -> Self {
        let zh = ZeroHashes::new();
        let validator_roots: Vec<[u8; 32]> =
            validators.iter().map(Validator::hash_tree_root).collect();

        let data_root = subtree_root(
            &validator_roots,
            0,
            preset::VALIDATOR_REGISTRY_DEPTH,
            &zh,
        );
        let registry_root = hash_pair(&data_root, &length_leaf(validators.len()));

        let mut state_field_roots = vec![[0u8; 32]; BEACON_STATE_FIELDS];
        state_field_roots[11] = registry_root;

        Self {
            validators,
            validator_roots,
            state_field_roots,
            zh,
        }
    }

    /// The fixture's validators.
    #[must_use]
    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Overwrite one state field root (e.g. to splice in historical
    /// summaries).
    pub fn set_state_field_root(&mut self, field: usize, root: [u8; 32]) {
        self.state_field_roots[field] = root;
    }

    /// The state root over all field roots.
    #[must_use]
    pub fn state_root(&self) -> [u8; 32] {
        subtree_root(&self.state_field_roots, 0, 6, &self.zh)
    }

    /// A header at `slot` committing to this state.
    #[must_use]
    pub fn header(&self, slot: u64) -> BeaconBlockHeader {
        BeaconBlockHeader {
            slot,
            proposer_index: 7,
            parent_root: [0x70; 32],
            state_root: self.state_root(),
            body_root: [0x0b; 32],
        }
    }

    /// A header bundled with the timestamp it is trusted under.
    #[must_use]
    pub fn provable_header(&self, slot: u64, root_timestamp: u64) -> ProvableBeaconBlockHeader {
        ProvableBeaconBlockHeader {
            header: self.header(slot),
            root_timestamp,
        }
    }

    /// Inclusion witness for `validators[index]` against the state root.
    #[must_use]
    pub fn validator_witness(&self, index: usize) -> ValidatorWitness {
        let mut proof = branch_for_leaf(
            &self.validator_roots,
            index,
            preset::VALIDATOR_REGISTRY_DEPTH,
            &self.zh,
        );
        proof.push(length_leaf(self.validators.len()));
        proof.extend(branch_for_leaf(&self.state_field_roots, 11, 6, &self.zh));

        ValidatorWitness {
            validator_index: index as u64,
            validator: self.validators[index].clone(),
            proof,
        }
    }
}

/// Two chained states: an old header holding the registry, proven under a
/// current block root through a historical summary.
#[derive(Debug, Clone)]
pub struct HistoricalFixture {
    registry: RegistryFixture,
    old_header: BeaconBlockHeader,
    current_header: BeaconBlockHeader,
    root_gindex: u64,
    historical_proof: Vec<[u8; 32]>,
}

impl HistoricalFixture {
    /// Embed the registry state at `old_slot`, summarized at slot position
    /// `old_slot % SLOTS_PER_HISTORICAL_ROOT` of summary 0, under a current
    /// header at `current_slot`.
    #[must_use]
    pub fn new(validators: Vec<Validator>, old_slot: u64, current_slot: u64) -> Self {
        let zh = ZeroHashes::new();
        let registry = RegistryFixture::new(validators);
        let old_header = registry.header(old_slot);
        let old_root = old_header.hash_tree_root();

        let slot_index = (old_slot as usize) % preset::SLOTS_PER_HISTORICAL_ROOT;
        let mut block_roots = vec![[0u8; 32]; slot_index + 1];
        block_roots[slot_index] = old_root;
        let block_summary_root =
            subtree_root(&block_roots, 0, preset::BLOCK_ROOTS_DEPTH, &zh);

        let state_summary_root = [0x5a; 32];
        let summary_root = hash_pair(&block_summary_root, &state_summary_root);

        let summaries = [summary_root];
        let summaries_data_root =
            subtree_root(&summaries, 0, preset::HISTORICAL_SUMMARIES_DEPTH, &zh);
        let summaries_root = hash_pair(&summaries_data_root, &length_leaf(1));

        let mut state_field_roots = vec![[0u8; 32]; BEACON_STATE_FIELDS];
        state_field_roots[27] = summaries_root;
        let current_state_root = subtree_root(&state_field_roots, 0, 6, &zh);

        let current_header = BeaconBlockHeader {
            slot: current_slot,
            proposer_index: 11,
            parent_root: [0x71; 32],
            state_root: current_state_root,
            body_root: [0x0c; 32],
        };

        // Branch from the old block root leaf up to the current block root:
        // block_roots vector, summary fields, summaries list (data + length),
        // state fields, header fields.
        let mut proof =
            branch_for_leaf(&block_roots, slot_index, preset::BLOCK_ROOTS_DEPTH, &zh);
        proof.push(state_summary_root);
        proof.extend(branch_for_leaf(
            &summaries,
            0,
            preset::HISTORICAL_SUMMARIES_DEPTH,
            &zh,
        ));
        proof.push(length_leaf(1));
        proof.extend(branch_for_leaf(&state_field_roots, 27, 6, &zh));

        let header_field_roots = [
            ssz::uint64_leaf(current_header.slot),
            ssz::uint64_leaf(current_header.proposer_index),
            current_header.parent_root,
            current_header.state_root,
            current_header.body_root,
        ];
        proof.extend(branch_for_leaf(&header_field_roots, 3, 3, &zh));

        let root_gindex = gindex::historical_block_root_gindex(0, slot_index as u64);

        Self {
            registry,
            old_header,
            current_header,
            root_gindex,
            historical_proof: proof,
        }
    }

    /// Registry embedded in the old state.
    #[must_use]
    pub fn registry(&self) -> &RegistryFixture {
        &self.registry
    }

    /// The current header bundled with its trusted timestamp.
    #[must_use]
    pub fn provable_header(&self, root_timestamp: u64) -> ProvableBeaconBlockHeader {
        ProvableBeaconBlockHeader {
            header: self.current_header.clone(),
            root_timestamp,
        }
    }

    /// The historical hop witness for the old header.
    #[must_use]
    pub fn historical_witness(&self) -> HistoricalHeaderWitness {
        HistoricalHeaderWitness {
            header: self.old_header.clone(),
            root_gindex: self.root_gindex,
            proof: self.historical_proof.clone(),
        }
    }

    /// Inclusion witness for a validator of the old state's registry.
    #[must_use]
    pub fn validator_witness(&self, index: usize) -> ValidatorWitness {
        self.registry.validator_witness(index)
    }
}

/// A validator whose distinguishing byte is `tag`, credentialed to
/// `withdrawal_credentials`.
#[must_use]
pub fn sample_validator(tag: u8, withdrawal_credentials: [u8; 32]) -> Validator {
    let mut pubkey = [0u8; 48];
    pubkey[0] = 0xb0;
    pubkey[1] = tag;
    Validator {
        pubkey,
        withdrawal_credentials,
        effective_balance: 32_000_000_000,
        slashed: false,
        activation_eligibility_epoch: 0,
        activation_epoch: 1,
        exit_epoch: u64::MAX,
        withdrawable_epoch: u64::MAX,
    }
}
