//! External capability seams: the staking vault and outgoing payouts.
//!
//! The vault contract itself lives outside this subsystem; operations here
//! only need its identities and its deposit relay. Fund transfers out of
//! the ledger go through [`Payouts`] so the host environment decides how
//! ether actually moves.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Withdrawal-credential prefix for execution-layer compounding
/// credentials.
pub const WC_PREFIX: u8 = 0x02;

/// Relay failures reported by the vault.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// Forwarding the batch to the deposit mechanism failed.
    #[error("deposit relay failed: {0}")]
    RelayFailed(String),
}

/// Outgoing transfer failures.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PayoutError {
    /// The host could not complete the transfer.
    #[error("transfer of {amount} to {recipient} failed")]
    TransferFailed { recipient: Address, amount: U256 },
}

/// One consensus-layer deposit entry, as relayed to the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorDeposit {
    /// BLS public key of the validator (48 bytes)
    #[serde(with = "hex::serde")]
    pub pubkey: [u8; 48],
    /// BLS signature over the deposit message (96 bytes)
    #[serde(with = "hex::serde")]
    pub signature: [u8; 96],
    /// Deposit value in wei
    pub amount: U256,
    /// Hash-tree-root of the full deposit data, checked by the deposit
    /// mechanism itself
    #[serde(with = "hex::serde")]
    pub deposit_data_root: [u8; 32],
}

/// The vault capability consumed by the guarantee.
pub trait StakingVault {
    /// The vault's own identity; withdrawal credentials derive from it.
    fn address(&self) -> Address;
    /// The node operator running the vault's validators.
    fn node_operator(&self) -> Address;
    /// The party funding the vault, entitled to disproven-collateral
    /// recovery.
    fn owner(&self) -> Address;
    /// Forward a deposit batch to the official deposit mechanism.
    ///
    /// # Errors
    ///
    /// [`VaultError::RelayFailed`] if the batch cannot be forwarded.
    fn relay_deposits(&mut self, deposits: &[ValidatorDeposit]) -> Result<(), VaultError>;
}

/// Outgoing fund transfers from the ledger to a recipient.
pub trait Payouts {
    /// Transfer `amount` to `recipient`.
    ///
    /// # Errors
    ///
    /// [`PayoutError::TransferFailed`] if the host rejects the transfer.
    fn pay(&mut self, recipient: Address, amount: U256) -> Result<(), PayoutError>;
}

/// The withdrawal credentials a vault's validators must carry: the 0x02
/// prefix, 11 zero bytes, then the vault address.
#[must_use]
pub fn withdrawal_credentials(vault: Address) -> [u8; 32] {
    let mut credentials = [0u8; 32];
    credentials[0] = WC_PREFIX;
    credentials[12..].copy_from_slice(vault.as_slice());
    credentials
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_embed_the_vault_address() {
        let vault = Address::repeat_byte(0xab);
        let credentials = withdrawal_credentials(vault);
        assert_eq!(credentials[0], 0x02);
        assert_eq!(&credentials[1..12], &[0u8; 11]);
        assert_eq!(&credentials[12..], vault.as_slice());
    }

    #[test]
    fn distinct_vaults_get_distinct_credentials() {
        assert_ne!(
            withdrawal_credentials(Address::repeat_byte(1)),
            withdrawal_credentials(Address::repeat_byte(2))
        );
    }

    #[test]
    fn deposit_json_roundtrip() {
        let deposit = ValidatorDeposit {
            pubkey: [0x0a; 48],
            signature: [0x0b; 96],
            amount: U256::from(10u64.pow(18)),
            deposit_data_root: [0x0c; 32],
        };
        let json = serde_json::to_string(&deposit).unwrap();
        let decoded: ValidatorDeposit = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, deposit);
    }
}
