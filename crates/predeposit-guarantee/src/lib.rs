//! # Predeposit Guarantee
//!
//! The stateful protocol that lets a node operator bond collateral and claim
//! a validator's consensus-layer identity with one fixed-size predeposit,
//! releasing the bond only once a beacon chain proof shows the validator's
//! withdrawal credentials point at the expected vault.
//!
//! The crate holds the collateral ledger ([`ledger`]), the vault and payout
//! capability seams ([`vault`]) and the validator-status state machine with
//! its operations ([`guarantee`]). Proof checking is delegated to
//! [`beacon_proofs`] and [`deposit_bls`].

pub mod guarantee;
pub mod ledger;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod vault;

pub use guarantee::{
    pubkey_hash, GuaranteeError, PredepositGuarantee, ValidatorRecord, ValidatorStatus,
    PREDEPOSIT_AMOUNT, PREDEPOSIT_AMOUNT_GWEI,
};
pub use ledger::{Collateral, CollateralLedger, LedgerError};
pub use vault::{
    withdrawal_credentials, PayoutError, Payouts, StakingVault, ValidatorDeposit, VaultError,
};
