//! The predeposit guarantee: collateral ledger plus validator-status state
//! machine, gated on proof outcomes.
//!
//! Every state-changing operation validates all of its preconditions —
//! authorization, ledger coverage, status transitions, cryptography —
//! before touching any state, then commits under one write guard. A failed
//! call leaves the ledger and the status map exactly as they were.

use crate::ledger::{Collateral, CollateralLedger, LedgerError};
use crate::vault::{
    withdrawal_credentials, PayoutError, Payouts, StakingVault, ValidatorDeposit, VaultError,
};
use alloy::primitives::{keccak256, Address, B256, U256};
use beacon_proofs::roots::BeaconRootSource;
use beacon_proofs::types::{HistoricalHeaderWitness, ProvableBeaconBlockHeader, ValidatorWitness};
use beacon_proofs::verifier::{CLProofVerifier, ProofError};
use deposit_bls::{verify_deposit_message, BlsError, DepositMessage};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// The fixed predeposit unit: 1 ether, in wei. The only legal value for a
/// predeposit entry.
pub const PREDEPOSIT_AMOUNT: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// The predeposit unit as carried by the deposit message, in gwei.
pub const PREDEPOSIT_AMOUNT_GWEI: u64 = 1_000_000_000;

/// Identity of a validator within this subsystem: the keccak hash of its
/// public key.
#[must_use]
pub fn pubkey_hash(pubkey: &[u8; 48]) -> B256 {
    keccak256(pubkey)
}

/// Lifecycle of a claimed validator. Transitions are strictly forward;
/// `Proved` and `Withdrawn` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorStatus {
    /// Never predeposited
    #[default]
    NoRecord,
    /// Predeposited, withdrawal credentials not yet proven
    AwaitingProof,
    /// Credentials proven to match the bound vault
    Proved,
    /// Credentials proven to point elsewhere; the unit stays reserved
    ProvedInvalid,
    /// Disproven collateral recovered by the vault owner
    Withdrawn,
}

/// Per-validator guarantee record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidatorRecord {
    /// Current lifecycle stage
    pub status: ValidatorStatus,
    /// Vault the predeposit was bound to
    pub vault: Address,
    /// Operator whose collateral backs the claim
    pub operator: Address,
}

/// Whole-call failures. Every variant leaves state untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuaranteeError {
    /// A required argument was zero.
    #[error("argument `{0}` must not be zero")]
    ZeroArgument(&'static str),
    /// The deposit batch holds no entries.
    #[error("deposit batch is empty")]
    EmptyBatch,
    /// The caller may not act for this operator.
    #[error("caller {caller} is neither operator {operator} nor its delegate")]
    NotOperatorOrDelegate { caller: Address, operator: Address },
    /// Only the vault owner may perform this operation.
    #[error("caller {caller} is not the vault owner")]
    NotVaultOwner { caller: Address },
    /// The supplied vault capability is not the one the record is bound to.
    #[error("vault {supplied} does not match the bound vault {bound}")]
    VaultMismatch { bound: Address, supplied: Address },
    /// A predeposit entry carried a value other than the predeposit unit.
    #[error("predeposit amount {0} is not the predeposit unit")]
    PredepositAmountInvalid(U256),
    /// The pubkey hash was predeposited before; a claim happens at most
    /// once.
    #[error("validator {0} was already claimed")]
    ValidatorAlreadyClaimed(B256),
    /// The record is not in the status the transition requires.
    #[error("validator {pubkey_hash} has status {actual:?}, expected {expected:?}")]
    UnexpectedValidatorStatus {
        pubkey_hash: B256,
        expected: ValidatorStatus,
        actual: ValidatorStatus,
    },
    /// Proven credentials differ from the bound vault's.
    #[error("withdrawal credentials {actual} do not match vault credentials {expected}")]
    WithdrawalCredentialsMismatch { expected: B256, actual: B256 },
    /// Disproof rejected: the proven credentials do match the bound vault.
    #[error("withdrawal credentials match the bound vault; validator {0} is not disprovable")]
    CredentialsMatchVault(B256),
    /// Collateral ledger rejection.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// Merkle/root-source rejection.
    #[error(transparent)]
    Proof(#[from] ProofError),
    /// Deposit-signature rejection.
    #[error(transparent)]
    Bls(#[from] BlsError),
    /// The vault's deposit relay failed.
    #[error(transparent)]
    Vault(#[from] VaultError),
    /// The outgoing transfer failed.
    #[error(transparent)]
    Payout(#[from] PayoutError),
}

#[derive(Debug, Default)]
struct GuaranteeState {
    ledger: CollateralLedger,
    validators: HashMap<B256, ValidatorRecord>,
    delegates: HashMap<Address, Address>,
}

impl GuaranteeState {
    fn record(&self, pubkey_hash: B256) -> ValidatorRecord {
        self.validators
            .get(&pubkey_hash)
            .copied()
            .unwrap_or_default()
    }

    fn is_operator_or_delegate(&self, caller: Address, operator: Address) -> bool {
        caller == operator || self.delegates.get(&operator) == Some(&caller)
    }

    fn require_status(
        &self,
        pubkey_hash: B256,
        expected: ValidatorStatus,
    ) -> Result<ValidatorRecord, GuaranteeError> {
        let record = self.record(pubkey_hash);
        if record.status == expected {
            Ok(record)
        } else {
            Err(GuaranteeError::UnexpectedValidatorStatus {
                pubkey_hash,
                expected,
                actual: record.status,
            })
        }
    }
}

/// The guarantee facade. One instance owns the ledger, the status map and
/// the proof verifier; a single write guard serializes all mutations.
#[derive(Debug)]
pub struct PredepositGuarantee<R> {
    verifier: CLProofVerifier<R>,
    state: RwLock<GuaranteeState>,
}

impl<R: BeaconRootSource> PredepositGuarantee<R> {
    /// Fresh instance over a trusted beacon-root source.
    pub fn new(roots: R) -> Self {
        Self {
            verifier: CLProofVerifier::new(roots),
            state: RwLock::new(GuaranteeState::default()),
        }
    }

    /// Exclusive access to the root source (e.g. to record trusted roots).
    pub fn roots_mut(&mut self) -> &mut R {
        self.verifier.roots_mut()
    }

    /// The operator's bonded collateral.
    pub fn collateral_of(&self, operator: Address) -> Collateral {
        self.state.read().ledger.collateral_of(operator)
    }

    /// The operator's unlocked balance.
    pub fn unlocked_of(&self, operator: Address) -> U256 {
        self.state.read().ledger.unlocked_of(operator)
    }

    /// The operator's delegate, if one is set.
    pub fn delegate_of(&self, operator: Address) -> Option<Address> {
        self.state.read().delegates.get(&operator).copied()
    }

    /// The guarantee record for a pubkey hash; `NoRecord` when unknown.
    pub fn validator_record(&self, pubkey_hash: B256) -> ValidatorRecord {
        self.state.read().record(pubkey_hash)
    }

    /// The status for a pubkey hash.
    pub fn validator_status(&self, pubkey_hash: B256) -> ValidatorStatus {
        self.validator_record(pubkey_hash).status
    }

    /// Credit collateral to an operator. Callable by anyone.
    ///
    /// # Errors
    ///
    /// [`LedgerError`] on a zero amount or zero operator.
    pub fn top_up(&self, operator: Address, amount: U256) -> Result<(), GuaranteeError> {
        let mut state = self.state.write();
        state.ledger.credit(operator, amount)?;
        tracing::info!(operator = %operator, amount = %amount, "collateral topped up");
        Ok(())
    }

    /// Withdraw unlocked collateral to `recipient`. Caller must be the
    /// operator or its delegate.
    ///
    /// # Errors
    ///
    /// Authorization, coverage or transfer failures; nothing is withdrawn
    /// on error.
    pub fn withdraw(
        &self,
        caller: Address,
        operator: Address,
        amount: U256,
        recipient: Address,
        payouts: &mut dyn Payouts,
    ) -> Result<(), GuaranteeError> {
        if recipient.is_zero() {
            return Err(GuaranteeError::ZeroArgument("recipient"));
        }
        let mut state = self.state.write();
        if !state.is_operator_or_delegate(caller, operator) {
            return Err(GuaranteeError::NotOperatorOrDelegate { caller, operator });
        }
        state.ledger.ensure_unlocked(operator, amount)?;

        payouts.pay(recipient, amount)?;
        state.ledger.debit_unlocked(operator, amount)?;
        tracing::info!(
            operator = %operator,
            amount = %amount,
            recipient = %recipient,
            "collateral withdrawn"
        );
        Ok(())
    }

    /// Set (or overwrite) the caller's delegate. Unconditional.
    pub fn set_delegate(&self, caller: Address, delegate: Address) {
        let mut state = self.state.write();
        state.delegates.insert(caller, delegate);
        tracing::info!(operator = %caller, delegate = %delegate, "delegate set");
    }

    /// Claim validators with one predeposit unit each. Caller must be the
    /// vault's operator or that operator's delegate; `top_up_amount` is
    /// credited to the operator as part of the same call. Verifies every
    /// entry's deposit signature against the vault's withdrawal
    /// credentials, locks unit × count, records each entry as
    /// `AwaitingProof` and forwards the batch to the vault relay.
    /// All-or-nothing.
    ///
    /// # Errors
    ///
    /// Any precondition, signature or relay failure rejects the whole
    /// batch with no state change.
    pub fn predeposit<V: StakingVault + ?Sized>(
        &self,
        caller: Address,
        vault: &mut V,
        deposits: &[ValidatorDeposit],
        top_up_amount: U256,
    ) -> Result<(), GuaranteeError> {
        if deposits.is_empty() {
            return Err(GuaranteeError::EmptyBatch);
        }
        let operator = vault.node_operator();
        if operator.is_zero() {
            return Err(GuaranteeError::ZeroArgument("operator"));
        }

        let mut state = self.state.write();
        if !state.is_operator_or_delegate(caller, operator) {
            return Err(GuaranteeError::NotOperatorOrDelegate { caller, operator });
        }

        let required = PREDEPOSIT_AMOUNT * U256::from(deposits.len());
        let available = state
            .ledger
            .unlocked_of(operator)
            .checked_add(top_up_amount)
            .ok_or(LedgerError::Overflow)?;
        if required > available {
            return Err(GuaranteeError::Ledger(LedgerError::InsufficientUnlocked {
                required,
                available,
            }));
        }

        let credentials = withdrawal_credentials(vault.address());
        let mut claimed = HashSet::with_capacity(deposits.len());
        for deposit in deposits {
            if deposit.amount != PREDEPOSIT_AMOUNT {
                return Err(GuaranteeError::PredepositAmountInvalid(deposit.amount));
            }
            let hash = pubkey_hash(&deposit.pubkey);
            if state.record(hash).status != ValidatorStatus::NoRecord || !claimed.insert(hash) {
                return Err(GuaranteeError::ValidatorAlreadyClaimed(hash));
            }
            verify_deposit_message(
                &DepositMessage {
                    pubkey: deposit.pubkey,
                    withdrawal_credentials: credentials,
                    amount_gwei: PREDEPOSIT_AMOUNT_GWEI,
                },
                &deposit.signature,
            )?;
        }

        // Everything checked; the relay is the last fallible step before
        // the commit.
        vault.relay_deposits(deposits)?;

        if !top_up_amount.is_zero() {
            state.ledger.credit(operator, top_up_amount)?;
        }
        state.ledger.lock(operator, required)?;
        let vault_address = vault.address();
        for deposit in deposits {
            state.validators.insert(
                pubkey_hash(&deposit.pubkey),
                ValidatorRecord {
                    status: ValidatorStatus::AwaitingProof,
                    vault: vault_address,
                    operator,
                },
            );
        }
        tracing::info!(
            vault = %vault_address,
            operator = %operator,
            count = deposits.len(),
            "predeposited validators await proof"
        );
        Ok(())
    }

    /// Prove that an awaiting validator's withdrawal credentials match its
    /// bound vault: unlocks one unit and marks the record `Proved`.
    ///
    /// # Errors
    ///
    /// Status, credential or proof failures.
    pub fn prove_valid(
        &self,
        header: &ProvableBeaconBlockHeader,
        witness: &ValidatorWitness,
    ) -> Result<(), GuaranteeError> {
        self.prove(header, None, witness, true)
    }

    /// [`Self::prove_valid`] through the historical hop.
    ///
    /// # Errors
    ///
    /// Status, credential or proof failures.
    pub fn prove_valid_historical(
        &self,
        header: &ProvableBeaconBlockHeader,
        historical: &HistoricalHeaderWitness,
        witness: &ValidatorWitness,
    ) -> Result<(), GuaranteeError> {
        self.prove(header, Some(historical), witness, true)
    }

    /// Prove that an awaiting validator's withdrawal credentials point away
    /// from its bound vault. The record becomes `ProvedInvalid`; the unit
    /// stays reserved for vault-owner recovery rather than returning to the
    /// operator.
    ///
    /// # Errors
    ///
    /// Status, credential or proof failures.
    pub fn prove_invalid(
        &self,
        header: &ProvableBeaconBlockHeader,
        witness: &ValidatorWitness,
    ) -> Result<(), GuaranteeError> {
        self.prove(header, None, witness, false)
    }

    /// [`Self::prove_invalid`] through the historical hop.
    ///
    /// # Errors
    ///
    /// Status, credential or proof failures.
    pub fn prove_invalid_historical(
        &self,
        header: &ProvableBeaconBlockHeader,
        historical: &HistoricalHeaderWitness,
        witness: &ValidatorWitness,
    ) -> Result<(), GuaranteeError> {
        self.prove(header, Some(historical), witness, false)
    }

    fn prove(
        &self,
        header: &ProvableBeaconBlockHeader,
        historical: Option<&HistoricalHeaderWitness>,
        witness: &ValidatorWitness,
        expect_match: bool,
    ) -> Result<(), GuaranteeError> {
        let hash = pubkey_hash(&witness.validator.pubkey);
        let mut state = self.state.write();
        let record = state.require_status(hash, ValidatorStatus::AwaitingProof)?;

        let expected = withdrawal_credentials(record.vault);
        let matches = witness.validator.withdrawal_credentials == expected;
        if expect_match && !matches {
            return Err(GuaranteeError::WithdrawalCredentialsMismatch {
                expected: B256::from(expected),
                actual: B256::from(witness.validator.withdrawal_credentials),
            });
        }
        if !expect_match && matches {
            return Err(GuaranteeError::CredentialsMatchVault(hash));
        }

        match historical {
            None => self.verifier.verify_validator_proof(header, witness)?,
            Some(hop) => self
                .verifier
                .verify_historical_validator_proof(header, hop, witness)?,
        }

        if expect_match {
            state.ledger.unlock(record.operator, PREDEPOSIT_AMOUNT)?;
            state.validators.insert(
                hash,
                ValidatorRecord {
                    status: ValidatorStatus::Proved,
                    ..record
                },
            );
            tracing::info!(pubkey_hash = %hash, vault = %record.vault, "validator proven");
        } else {
            state.validators.insert(
                hash,
                ValidatorRecord {
                    status: ValidatorStatus::ProvedInvalid,
                    ..record
                },
            );
            tracing::warn!(
                pubkey_hash = %hash,
                vault = %record.vault,
                "validator disproven; unit reserved for vault owner"
            );
        }
        Ok(())
    }

    /// Relay further deposits for validators already proven for this
    /// vault. The ledger is untouched.
    ///
    /// # Errors
    ///
    /// Authorization, status/binding or relay failures.
    pub fn deposit_to_proven<V: StakingVault + ?Sized>(
        &self,
        caller: Address,
        vault: &mut V,
        deposits: &[ValidatorDeposit],
    ) -> Result<(), GuaranteeError> {
        if deposits.is_empty() {
            return Err(GuaranteeError::EmptyBatch);
        }
        let operator = vault.node_operator();
        let vault_address = vault.address();
        {
            let state = self.state.read();
            if !state.is_operator_or_delegate(caller, operator) {
                return Err(GuaranteeError::NotOperatorOrDelegate { caller, operator });
            }
            for deposit in deposits {
                let hash = pubkey_hash(&deposit.pubkey);
                let record = state.require_status(hash, ValidatorStatus::Proved)?;
                if record.vault != vault_address {
                    return Err(GuaranteeError::VaultMismatch {
                        bound: record.vault,
                        supplied: vault_address,
                    });
                }
            }
        }
        vault.relay_deposits(deposits)?;
        tracing::info!(
            vault = %vault_address,
            count = deposits.len(),
            "deposited to proven validators"
        );
        Ok(())
    }

    /// Recover the reserved unit of a disproven validator. Caller must be
    /// the owner of the vault the record is bound to; the unit leaves the
    /// operator's ledger entirely and the record terminates as
    /// `Withdrawn`.
    ///
    /// # Errors
    ///
    /// Authorization, status/binding or transfer failures.
    pub fn withdraw_disproven<V: StakingVault + ?Sized>(
        &self,
        caller: Address,
        pubkey_hash: B256,
        vault: &V,
        recipient: Address,
        payouts: &mut dyn Payouts,
    ) -> Result<(), GuaranteeError> {
        if recipient.is_zero() {
            return Err(GuaranteeError::ZeroArgument("recipient"));
        }
        let mut state = self.state.write();
        let record = state.require_status(pubkey_hash, ValidatorStatus::ProvedInvalid)?;
        if record.vault != vault.address() {
            return Err(GuaranteeError::VaultMismatch {
                bound: record.vault,
                supplied: vault.address(),
            });
        }
        if caller != vault.owner() {
            return Err(GuaranteeError::NotVaultOwner { caller });
        }

        payouts.pay(recipient, PREDEPOSIT_AMOUNT)?;
        state.ledger.forfeit(record.operator, PREDEPOSIT_AMOUNT)?;
        state.validators.insert(
            pubkey_hash,
            ValidatorRecord {
                status: ValidatorStatus::Withdrawn,
                ..record
            },
        );
        tracing::info!(
            pubkey_hash = %pubkey_hash,
            recipient = %recipient,
            "disproven collateral withdrawn"
        );
        Ok(())
    }

    /// Register a validator deposited outside the guarantee. Only the vault
    /// owner may do this; the proven credentials must match the vault. The
    /// record is created directly as `Proved` with no collateral movement.
    ///
    /// # Errors
    ///
    /// Authorization, status, credential or proof failures.
    pub fn prove_unknown_validator<V: StakingVault + ?Sized>(
        &self,
        caller: Address,
        vault: &V,
        header: &ProvableBeaconBlockHeader,
        witness: &ValidatorWitness,
    ) -> Result<(), GuaranteeError> {
        if caller != vault.owner() {
            return Err(GuaranteeError::NotVaultOwner { caller });
        }
        let hash = pubkey_hash(&witness.validator.pubkey);
        let mut state = self.state.write();
        state.require_status(hash, ValidatorStatus::NoRecord)?;

        let expected = withdrawal_credentials(vault.address());
        if witness.validator.withdrawal_credentials != expected {
            return Err(GuaranteeError::WithdrawalCredentialsMismatch {
                expected: B256::from(expected),
                actual: B256::from(witness.validator.withdrawal_credentials),
            });
        }
        self.verifier.verify_validator_proof(header, witness)?;

        state.validators.insert(
            hash,
            ValidatorRecord {
                status: ValidatorStatus::Proved,
                vault: vault.address(),
                operator: vault.node_operator(),
            },
        );
        tracing::info!(pubkey_hash = %hash, vault = %vault.address(), "unknown validator proven");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{addr, RecordingPayouts, TestVault};
    use beacon_proofs::roots::FixedWindowRoots;
    use beacon_proofs::test_utils::RegistryFixture;
    use beacon_proofs::types::Validator;
    use deposit_bls::test_utils::TestKeypair;

    const TS: u64 = 1_700_000_000;

    fn unit(n: u64) -> U256 {
        PREDEPOSIT_AMOUNT * U256::from(n)
    }

    fn new_guarantee() -> PredepositGuarantee<FixedWindowRoots> {
        PredepositGuarantee::new(FixedWindowRoots::new())
    }

    fn new_vault() -> TestVault {
        TestVault::new(addr(0xa1), addr(0x0e), addr(0xc3))
    }

    fn deposit_for(key: &TestKeypair, credentials: [u8; 32]) -> ValidatorDeposit {
        let (message, signature) = key.sign_deposit(credentials, PREDEPOSIT_AMOUNT_GWEI);
        ValidatorDeposit {
            pubkey: message.pubkey,
            signature,
            amount: PREDEPOSIT_AMOUNT,
            deposit_data_root: [0u8; 32],
        }
    }

    fn registered_validator(pubkey: [u8; 48], credentials: [u8; 32]) -> Validator {
        Validator {
            pubkey,
            withdrawal_credentials: credentials,
            effective_balance: 32_000_000_000,
            slashed: false,
            activation_eligibility_epoch: 0,
            activation_epoch: 1,
            exit_epoch: u64::MAX,
            withdrawable_epoch: u64::MAX,
        }
    }

    /// Predeposit one validator for `vault`, then expose it on the beacon
    /// side with `credentials`, trusted at `TS`.
    fn predeposited_setup(
        guarantee: &mut PredepositGuarantee<FixedWindowRoots>,
        vault: &mut TestVault,
        beacon_credentials: [u8; 32],
    ) -> (ProvableBeaconBlockHeader, ValidatorWitness) {
        let key = TestKeypair::new(1);
        let deposit = deposit_for(&key, withdrawal_credentials(vault.address()));
        guarantee.top_up(vault.node_operator(), unit(1)).unwrap();
        guarantee
            .predeposit(vault.node_operator(), vault, &[deposit], U256::ZERO)
            .unwrap();

        let fixture = RegistryFixture::new(vec![registered_validator(
            key.pubkey,
            beacon_credentials,
        )]);
        let header = fixture.provable_header(4242, TS);
        guarantee
            .roots_mut()
            .record(TS, header.header.hash_tree_root())
            .unwrap();
        (header, fixture.validator_witness(0))
    }

    #[test]
    fn top_up_rejects_zero_values() {
        let guarantee = new_guarantee();
        assert_eq!(
            guarantee.top_up(addr(0x0e), U256::ZERO),
            Err(GuaranteeError::Ledger(LedgerError::ZeroAmount))
        );
        assert_eq!(
            guarantee.top_up(Address::ZERO, unit(1)),
            Err(GuaranteeError::Ledger(LedgerError::ZeroOperator))
        );
    }

    #[test]
    fn delegate_is_freely_overwritable() {
        let guarantee = new_guarantee();
        assert_eq!(guarantee.delegate_of(addr(0x0e)), None);
        guarantee.set_delegate(addr(0x0e), addr(0xd1));
        assert_eq!(guarantee.delegate_of(addr(0x0e)), Some(addr(0xd1)));
        guarantee.set_delegate(addr(0x0e), addr(0xd2));
        assert_eq!(guarantee.delegate_of(addr(0x0e)), Some(addr(0xd2)));
    }

    #[test]
    fn predeposit_locks_one_unit_per_validator() {
        let guarantee = new_guarantee();
        let mut vault = new_vault();
        let operator = vault.node_operator();
        let credentials = withdrawal_credentials(vault.address());
        let deposits = [
            deposit_for(&TestKeypair::new(1), credentials),
            deposit_for(&TestKeypair::new(2), credentials),
        ];

        guarantee.top_up(operator, unit(3)).unwrap();
        guarantee
            .predeposit(operator, &mut vault, &deposits, U256::ZERO)
            .unwrap();

        let collateral = guarantee.collateral_of(operator);
        assert_eq!(collateral.balance, unit(3));
        assert_eq!(collateral.locked, unit(2));
        assert_eq!(guarantee.unlocked_of(operator), unit(1));
        assert_eq!(vault.relayed.len(), 2);
        for deposit in &deposits {
            let record = guarantee.validator_record(pubkey_hash(&deposit.pubkey));
            assert_eq!(record.status, ValidatorStatus::AwaitingProof);
            assert_eq!(record.vault, vault.address());
            assert_eq!(record.operator, operator);
        }

        // Withdrawing 2 units would dip into locked collateral; 1 is fine.
        let mut payouts = RecordingPayouts::default();
        assert!(matches!(
            guarantee.withdraw(operator, operator, unit(2), addr(0x99), &mut payouts),
            Err(GuaranteeError::Ledger(LedgerError::InsufficientUnlocked { .. }))
        ));
        guarantee
            .withdraw(operator, operator, unit(1), addr(0x99), &mut payouts)
            .unwrap();
        assert_eq!(payouts.payments, vec![(addr(0x99), unit(1))]);
        let collateral = guarantee.collateral_of(operator);
        assert_eq!(collateral.balance, unit(2));
        assert_eq!(collateral.locked, unit(2));
    }

    #[test]
    fn predeposit_accepts_attached_top_up() {
        let guarantee = new_guarantee();
        let mut vault = new_vault();
        let operator = vault.node_operator();
        let deposit = deposit_for(
            &TestKeypair::new(1),
            withdrawal_credentials(vault.address()),
        );

        guarantee
            .predeposit(operator, &mut vault, &[deposit], unit(2))
            .unwrap();
        let collateral = guarantee.collateral_of(operator);
        assert_eq!(collateral.balance, unit(2));
        assert_eq!(collateral.locked, unit(1));
    }

    #[test]
    fn predeposit_requires_operator_or_delegate() {
        let guarantee = new_guarantee();
        let mut vault = new_vault();
        let operator = vault.node_operator();
        let deposit = deposit_for(
            &TestKeypair::new(1),
            withdrawal_credentials(vault.address()),
        );

        assert_eq!(
            guarantee.predeposit(addr(0x66), &mut vault, std::slice::from_ref(&deposit), unit(1)),
            Err(GuaranteeError::NotOperatorOrDelegate {
                caller: addr(0x66),
                operator,
            })
        );

        guarantee.set_delegate(operator, addr(0x66));
        guarantee
            .predeposit(addr(0x66), &mut vault, &[deposit], unit(1))
            .unwrap();
    }

    #[test]
    fn predeposit_rejects_non_unit_amounts() {
        let guarantee = new_guarantee();
        let mut vault = new_vault();
        let operator = vault.node_operator();
        let mut deposit = deposit_for(
            &TestKeypair::new(1),
            withdrawal_credentials(vault.address()),
        );
        deposit.amount = unit(2);

        assert_eq!(
            guarantee.predeposit(operator, &mut vault, &[deposit], unit(2)),
            Err(GuaranteeError::PredepositAmountInvalid(unit(2)))
        );
    }

    #[test]
    fn predeposit_rejects_insufficient_collateral() {
        let guarantee = new_guarantee();
        let mut vault = new_vault();
        let operator = vault.node_operator();
        let credentials = withdrawal_credentials(vault.address());
        let deposits = [
            deposit_for(&TestKeypair::new(1), credentials),
            deposit_for(&TestKeypair::new(2), credentials),
        ];

        guarantee.top_up(operator, unit(1)).unwrap();
        assert!(matches!(
            guarantee.predeposit(operator, &mut vault, &deposits, U256::ZERO),
            Err(GuaranteeError::Ledger(LedgerError::InsufficientUnlocked { .. }))
        ));
        assert!(vault.relayed.is_empty());
    }

    #[test]
    fn a_pubkey_is_claimable_exactly_once() {
        let guarantee = new_guarantee();
        let mut vault = new_vault();
        let operator = vault.node_operator();
        let key = TestKeypair::new(1);
        let deposit = deposit_for(&key, withdrawal_credentials(vault.address()));
        let hash = pubkey_hash(&deposit.pubkey);

        // Duplicate inside one batch
        assert_eq!(
            guarantee.predeposit(
                operator,
                &mut vault,
                &[deposit.clone(), deposit.clone()],
                unit(2),
            ),
            Err(GuaranteeError::ValidatorAlreadyClaimed(hash))
        );

        guarantee
            .predeposit(operator, &mut vault, std::slice::from_ref(&deposit), unit(1))
            .unwrap();

        // Repeat claim, even through a different vault of the same operator
        let mut other_vault = TestVault::new(addr(0xa2), operator, addr(0xc4));
        let other_deposit = deposit_for(&key, withdrawal_credentials(other_vault.address()));
        assert_eq!(
            guarantee.predeposit(operator, &mut other_vault, &[other_deposit], unit(1)),
            Err(GuaranteeError::ValidatorAlreadyClaimed(hash))
        );
    }

    #[test]
    fn predeposit_rejects_signature_over_foreign_credentials() {
        let guarantee = new_guarantee();
        let mut vault = new_vault();
        let operator = vault.node_operator();
        // Signed for some other withdrawal destination
        let deposit = deposit_for(&TestKeypair::new(1), [0x77; 32]);

        assert_eq!(
            guarantee.predeposit(operator, &mut vault, std::slice::from_ref(&deposit), unit(1)),
            Err(GuaranteeError::Bls(BlsError::InvalidSignature))
        );
        assert_eq!(guarantee.collateral_of(operator), Collateral::default());
        assert_eq!(
            guarantee.validator_status(pubkey_hash(&deposit.pubkey)),
            ValidatorStatus::NoRecord
        );
        assert!(vault.relayed.is_empty());
    }

    #[test]
    fn predeposit_relay_failure_commits_nothing() {
        let guarantee = new_guarantee();
        let mut vault = new_vault();
        vault.fail_relay = true;
        let operator = vault.node_operator();
        let deposit = deposit_for(
            &TestKeypair::new(1),
            withdrawal_credentials(vault.address()),
        );

        assert!(matches!(
            guarantee.predeposit(operator, &mut vault, std::slice::from_ref(&deposit), unit(1)),
            Err(GuaranteeError::Vault(VaultError::RelayFailed(_)))
        ));
        assert_eq!(guarantee.collateral_of(operator), Collateral::default());
        assert_eq!(
            guarantee.validator_status(pubkey_hash(&deposit.pubkey)),
            ValidatorStatus::NoRecord
        );
    }

    #[test]
    fn prove_valid_unlocks_and_terminates() {
        let mut guarantee = new_guarantee();
        let mut vault = new_vault();
        let operator = vault.node_operator();
        let vault_credentials = withdrawal_credentials(vault.address());
        let (header, witness) = predeposited_setup(&mut guarantee, &mut vault, vault_credentials);

        guarantee.prove_valid(&header, &witness).unwrap();

        let hash = pubkey_hash(&witness.validator.pubkey);
        assert_eq!(guarantee.validator_status(hash), ValidatorStatus::Proved);
        let collateral = guarantee.collateral_of(operator);
        assert_eq!(collateral.balance, unit(1)); // balance unchanged
        assert_eq!(collateral.locked, U256::ZERO); // unit released

        // Proved is terminal
        assert!(matches!(
            guarantee.prove_valid(&header, &witness),
            Err(GuaranteeError::UnexpectedValidatorStatus {
                expected: ValidatorStatus::AwaitingProof,
                actual: ValidatorStatus::Proved,
                ..
            })
        ));
    }

    #[test]
    fn prove_valid_rejects_foreign_credentials() {
        let mut guarantee = new_guarantee();
        let mut vault = new_vault();
        let (header, witness) = predeposited_setup(&mut guarantee, &mut vault, [0x77; 32]);

        assert!(matches!(
            guarantee.prove_valid(&header, &witness),
            Err(GuaranteeError::WithdrawalCredentialsMismatch { .. })
        ));
        assert_eq!(
            guarantee.validator_status(pubkey_hash(&witness.validator.pubkey)),
            ValidatorStatus::AwaitingProof
        );
    }

    #[test]
    fn prove_fails_without_trusted_root() {
        let mut guarantee = new_guarantee();
        let mut vault = new_vault();
        let vault_credentials = withdrawal_credentials(vault.address());
        let (mut header, witness) =
            predeposited_setup(&mut guarantee, &mut vault, vault_credentials);
        header.root_timestamp = TS + 12;

        assert_eq!(
            guarantee.prove_valid(&header, &witness),
            Err(GuaranteeError::Proof(ProofError::RootNotFound(TS + 12)))
        );
    }

    #[test]
    fn prove_requires_an_awaiting_record() {
        let mut guarantee = new_guarantee();
        let vault = new_vault();
        let key = TestKeypair::new(1);
        let fixture = RegistryFixture::new(vec![registered_validator(
            key.pubkey,
            withdrawal_credentials(vault.address()),
        )]);
        let header = fixture.provable_header(4242, TS);
        guarantee
            .roots_mut()
            .record(TS, header.header.hash_tree_root())
            .unwrap();

        assert!(matches!(
            guarantee.prove_valid(&header, &fixture.validator_witness(0)),
            Err(GuaranteeError::UnexpectedValidatorStatus {
                expected: ValidatorStatus::AwaitingProof,
                actual: ValidatorStatus::NoRecord,
                ..
            })
        ));
    }

    #[test]
    fn disproof_reserves_the_unit_for_the_vault_owner() {
        let mut guarantee = new_guarantee();
        let mut vault = new_vault();
        let operator = vault.node_operator();
        let owner = vault.owner();
        let (header, witness) = predeposited_setup(&mut guarantee, &mut vault, [0x77; 32]);
        let hash = pubkey_hash(&witness.validator.pubkey);

        guarantee.prove_invalid(&header, &witness).unwrap();
        assert_eq!(guarantee.validator_status(hash), ValidatorStatus::ProvedInvalid);
        // The unit stays locked, not returned to the operator.
        let collateral = guarantee.collateral_of(operator);
        assert_eq!(collateral.balance, unit(1));
        assert_eq!(collateral.locked, unit(1));

        let mut payouts = RecordingPayouts::default();
        // The operator cannot reach the reserved unit.
        assert!(matches!(
            guarantee.withdraw(operator, operator, unit(1), addr(0x99), &mut payouts),
            Err(GuaranteeError::Ledger(LedgerError::InsufficientUnlocked { .. }))
        ));
        // Nor recover it through the owner-only path.
        assert_eq!(
            guarantee.withdraw_disproven(operator, hash, &vault, addr(0x99), &mut payouts),
            Err(GuaranteeError::NotVaultOwner { caller: operator })
        );

        guarantee
            .withdraw_disproven(owner, hash, &vault, owner, &mut payouts)
            .unwrap();
        assert_eq!(payouts.payments, vec![(owner, unit(1))]);
        assert_eq!(guarantee.validator_status(hash), ValidatorStatus::Withdrawn);
        assert_eq!(guarantee.collateral_of(operator), Collateral::default());

        // Withdrawn is terminal.
        assert!(matches!(
            guarantee.withdraw_disproven(owner, hash, &vault, owner, &mut payouts),
            Err(GuaranteeError::UnexpectedValidatorStatus {
                expected: ValidatorStatus::ProvedInvalid,
                actual: ValidatorStatus::Withdrawn,
                ..
            })
        ));
    }

    #[test]
    fn disproof_rejects_matching_credentials() {
        let mut guarantee = new_guarantee();
        let mut vault = new_vault();
        let vault_credentials = withdrawal_credentials(vault.address());
        let (header, witness) = predeposited_setup(&mut guarantee, &mut vault, vault_credentials);

        assert_eq!(
            guarantee.prove_invalid(&header, &witness),
            Err(GuaranteeError::CredentialsMatchVault(pubkey_hash(
                &witness.validator.pubkey
            )))
        );
    }

    #[test]
    fn withdraw_disproven_checks_the_vault_binding() {
        let mut guarantee = new_guarantee();
        let mut vault = new_vault();
        let (header, witness) = predeposited_setup(&mut guarantee, &mut vault, [0x77; 32]);
        let hash = pubkey_hash(&witness.validator.pubkey);
        guarantee.prove_invalid(&header, &witness).unwrap();

        let other_vault = TestVault::new(addr(0xa2), vault.node_operator(), vault.owner());
        let mut payouts = RecordingPayouts::default();
        assert_eq!(
            guarantee.withdraw_disproven(
                other_vault.owner(),
                hash,
                &other_vault,
                addr(0x99),
                &mut payouts,
            ),
            Err(GuaranteeError::VaultMismatch {
                bound: vault.address(),
                supplied: other_vault.address(),
            })
        );
    }

    #[test]
    fn failed_payout_leaves_the_ledger_untouched() {
        let mut guarantee = new_guarantee();
        let mut vault = new_vault();
        let owner = vault.owner();
        let (header, witness) = predeposited_setup(&mut guarantee, &mut vault, [0x77; 32]);
        let hash = pubkey_hash(&witness.validator.pubkey);
        guarantee.prove_invalid(&header, &witness).unwrap();

        let mut payouts = RecordingPayouts {
            fail: true,
            ..RecordingPayouts::default()
        };
        assert!(matches!(
            guarantee.withdraw_disproven(owner, hash, &vault, owner, &mut payouts),
            Err(GuaranteeError::Payout(PayoutError::TransferFailed { .. }))
        ));
        let collateral = guarantee.collateral_of(vault.node_operator());
        assert_eq!(collateral.balance, unit(1));
        assert_eq!(collateral.locked, unit(1));
        assert_eq!(guarantee.validator_status(hash), ValidatorStatus::ProvedInvalid);
    }

    #[test]
    fn deposit_to_proven_requires_proved_status_and_binding() {
        let mut guarantee = new_guarantee();
        let mut vault = new_vault();
        let operator = vault.node_operator();
        let vault_credentials = withdrawal_credentials(vault.address());
        let (header, witness) = predeposited_setup(&mut guarantee, &mut vault, vault_credentials);

        let key = TestKeypair::new(1);
        let (message, signature) = key.sign_deposit(vault_credentials, 31_000_000_000);
        let top_up_deposit = ValidatorDeposit {
            pubkey: message.pubkey,
            signature,
            amount: unit(31),
            deposit_data_root: [0u8; 32],
        };

        assert!(matches!(
            guarantee.deposit_to_proven(
                operator,
                &mut vault,
                std::slice::from_ref(&top_up_deposit),
            ),
            Err(GuaranteeError::UnexpectedValidatorStatus {
                expected: ValidatorStatus::Proved,
                actual: ValidatorStatus::AwaitingProof,
                ..
            })
        ));

        guarantee.prove_valid(&header, &witness).unwrap();
        let relayed_before = vault.relayed.len();
        guarantee
            .deposit_to_proven(operator, &mut vault, std::slice::from_ref(&top_up_deposit))
            .unwrap();
        assert_eq!(vault.relayed.len(), relayed_before + 1);

        // Bound to `vault`, not to any other vault of the same operator.
        let mut other_vault = TestVault::new(addr(0xa2), operator, addr(0xc4));
        assert_eq!(
            guarantee.deposit_to_proven(operator, &mut other_vault, &[top_up_deposit]),
            Err(GuaranteeError::VaultMismatch {
                bound: vault.address(),
                supplied: other_vault.address(),
            })
        );
    }

    #[test]
    fn vault_owner_can_register_an_unknown_validator() {
        let mut guarantee = new_guarantee();
        let vault = new_vault();
        let owner = vault.owner();
        let key = TestKeypair::new(5);
        let fixture = RegistryFixture::new(vec![registered_validator(
            key.pubkey,
            withdrawal_credentials(vault.address()),
        )]);
        let header = fixture.provable_header(4242, TS);
        guarantee
            .roots_mut()
            .record(TS, header.header.hash_tree_root())
            .unwrap();
        let witness = fixture.validator_witness(0);

        assert_eq!(
            guarantee.prove_unknown_validator(addr(0x66), &vault, &header, &witness),
            Err(GuaranteeError::NotVaultOwner { caller: addr(0x66) })
        );

        guarantee
            .prove_unknown_validator(owner, &vault, &header, &witness)
            .unwrap();
        let record = guarantee.validator_record(pubkey_hash(&key.pubkey));
        assert_eq!(record.status, ValidatorStatus::Proved);
        assert_eq!(record.vault, vault.address());
        assert_eq!(record.operator, vault.node_operator());
        assert_eq!(
            guarantee.collateral_of(vault.node_operator()),
            Collateral::default()
        );
    }
}
