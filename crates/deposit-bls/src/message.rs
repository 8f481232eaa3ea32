//! Deposit message and its signing root.

use beacon_proofs::{preset, ssz};
use serde::{Deserialize, Serialize};

/// The record a validator key signs to authorize a deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositMessage {
    /// BLS public key of the validator (48 bytes)
    #[serde(with = "hex::serde")]
    pub pubkey: [u8; 48],
    /// Withdrawal credentials the deposit commits to
    #[serde(with = "hex::serde")]
    pub withdrawal_credentials: [u8; 32],
    /// Deposit amount in gwei
    pub amount_gwei: u64,
}

impl DepositMessage {
    /// Signing root under the deposit domain of the active preset's genesis
    /// fork version.
    #[must_use]
    pub fn signing_root(&self) -> [u8; 32] {
        self.signing_root_for_domain(&ssz::deposit_domain(preset::GENESIS_FORK_VERSION))
    }

    /// Signing root under an explicit domain.
    #[must_use]
    pub fn signing_root_for_domain(&self, domain: &[u8; 32]) -> [u8; 32] {
        let message_root = ssz::deposit_message_root(
            &self.pubkey,
            &self.withdrawal_credentials,
            self.amount_gwei,
        );
        ssz::deposit_signing_root(&message_root, domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_root_depends_on_every_field() {
        let base = DepositMessage {
            pubkey: [0x11; 48],
            withdrawal_credentials: [0x02; 32],
            amount_gwei: 1_000_000_000,
        };
        let root = base.signing_root();

        let mut other = base.clone();
        other.pubkey[47] ^= 1;
        assert_ne!(other.signing_root(), root);

        let mut other = base.clone();
        other.withdrawal_credentials[31] ^= 1;
        assert_ne!(other.signing_root(), root);

        let mut other = base.clone();
        other.amount_gwei += 1;
        assert_ne!(other.signing_root(), root);

        assert_eq!(base.signing_root(), root);
    }

    #[test]
    fn json_roundtrip() {
        let message = DepositMessage {
            pubkey: [0xaa; 48],
            withdrawal_credentials: [0x02; 32],
            amount_gwei: 32_000_000_000,
        };
        let json = serde_json::to_string(&message).unwrap();
        let decoded: DepositMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, message);
    }
}
