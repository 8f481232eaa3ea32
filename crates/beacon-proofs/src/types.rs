//! Beacon chain record types and proof witnesses.
//!
//! The two fixed records are merkleized by hand (see [`crate::ssz`]); both
//! yield depth-3 trees. Witness types carry everything one proof call needs
//! and are never persisted.

use crate::ssz;
use serde::{Deserialize, Serialize};

/// Validator record from the beacon state registry. Mutated only by the
/// beacon chain itself; this crate only reads witnesses describing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// BLS public key (48 bytes)
    #[serde(with = "hex::serde")]
    pub pubkey: [u8; 48],
    /// Withdrawal credentials (32 bytes)
    #[serde(with = "hex::serde")]
    pub withdrawal_credentials: [u8; 32],
    /// Effective balance in gwei
    pub effective_balance: u64,
    /// Whether the validator is slashed
    pub slashed: bool,
    /// Epoch when the validator became eligible for activation
    pub activation_eligibility_epoch: u64,
    /// Epoch when the validator was activated
    pub activation_epoch: u64,
    /// Epoch when the validator will exit
    pub exit_epoch: u64,
    /// Epoch when the validator can withdraw
    pub withdrawable_epoch: u64,
}

// `[u8; 48]` has no `Default` impl (std only covers arrays up to 32), so
// `Default` cannot be derived. This hand-written impl reproduces exactly what
// `#[derive(Default)]` would generate: every field at its own default.
impl Default for Validator {
    fn default() -> Self {
        Self {
            pubkey: [0u8; 48],
            withdrawal_credentials: <[u8; 32]>::default(),
            effective_balance: u64::default(),
            slashed: bool::default(),
            activation_eligibility_epoch: u64::default(),
            activation_epoch: u64::default(),
            exit_epoch: u64::default(),
            withdrawable_epoch: u64::default(),
        }
    }
}

impl Validator {
    /// Hash-tree-root over the 8 field leaves.
    #[must_use]
    pub fn hash_tree_root(&self) -> [u8; 32] {
        ssz::merkleize(&[
            ssz::pubkey_root(&self.pubkey),
            self.withdrawal_credentials,
            ssz::uint64_leaf(self.effective_balance),
            ssz::bool_leaf(self.slashed),
            ssz::uint64_leaf(self.activation_eligibility_epoch),
            ssz::uint64_leaf(self.activation_epoch),
            ssz::uint64_leaf(self.exit_epoch),
            ssz::uint64_leaf(self.withdrawable_epoch),
        ])
    }
}

/// Beacon block header. Ephemeral: exists only for the duration of one
/// proof call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconBlockHeader {
    /// Slot number
    pub slot: u64,
    /// Proposer validator index
    pub proposer_index: u64,
    /// Root of the parent block
    #[serde(with = "hex::serde")]
    pub parent_root: [u8; 32],
    /// Root of the beacon state
    #[serde(with = "hex::serde")]
    pub state_root: [u8; 32],
    /// Root of the block body
    #[serde(with = "hex::serde")]
    pub body_root: [u8; 32],
}

impl BeaconBlockHeader {
    /// Hash-tree-root over the 5 field leaves, padded to 8.
    #[must_use]
    pub fn hash_tree_root(&self) -> [u8; 32] {
        ssz::merkleize(&[
            ssz::uint64_leaf(self.slot),
            ssz::uint64_leaf(self.proposer_index),
            self.parent_root,
            self.state_root,
            self.body_root,
        ])
    }
}

/// A header plus the child-block timestamp under which its root is
/// retrievable from the beacon-root source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvableBeaconBlockHeader {
    /// The header whose root must match the trusted root
    pub header: BeaconBlockHeader,
    /// Timestamp key for the beacon-root source lookup
    pub root_timestamp: u64,
}

/// Witness for one validator's inclusion in the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorWitness {
    /// Position in the validator registry
    pub validator_index: u64,
    /// The full validator record being proven
    pub validator: Validator,
    /// Sibling branch from the validator leaf up to the state root
    #[serde(with = "hex_branch")]
    pub proof: Vec<[u8; 32]>,
}

/// Witness proving an older header under the current block root's
/// historical summaries, extending provable range beyond the root source's
/// retention window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalHeaderWitness {
    /// The older header whose state holds the validator
    pub header: BeaconBlockHeader,
    /// Caller-supplied gindex of the older block root under the current
    /// block root; must descend from the historical-summaries field
    pub root_gindex: u64,
    /// Sibling branch from the older block root up to the current block root
    #[serde(with = "hex_branch")]
    pub proof: Vec<[u8; 32]>,
}

/// Serde adapter for sibling branches as 0x-prefixed hex strings.
mod hex_branch {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(branch: &[[u8; 32]], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded: Vec<String> = branch
            .iter()
            .map(|node| format!("0x{}", hex::encode(node)))
            .collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: Vec<String> = Vec::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|s| {
                let s = s.strip_prefix("0x").unwrap_or(&s);
                let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
                <[u8; 32]>::try_from(bytes.as_slice())
                    .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
            })
            .collect()
    }
}
