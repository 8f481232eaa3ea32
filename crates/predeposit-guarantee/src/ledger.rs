//! Node-operator collateral ledger.
//!
//! One account per operator, `{balance, locked}` with `locked ≤ balance`
//! holding at every point. Accounts are created on first credit and never
//! destroyed. Every mutation validates first and commits whole or not at
//! all.

use alloy::primitives::{Address, U256};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Ledger-level failures.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LedgerError {
    /// Amounts of zero are rejected everywhere.
    #[error("amount must not be zero")]
    ZeroAmount,
    /// The zero address cannot hold collateral.
    #[error("operator address must not be zero")]
    ZeroOperator,
    /// The operation needs more unlocked collateral than the account holds.
    #[error("insufficient unlocked collateral: required {required}, available {available}")]
    InsufficientUnlocked { required: U256, available: U256 },
    /// The operation releases more than is locked.
    #[error("requested {requested} exceeds locked collateral {locked}")]
    ExceedsLocked { requested: U256, locked: U256 },
    /// Balance arithmetic overflowed.
    #[error("balance overflow")]
    Overflow,
}

/// One operator's bonded collateral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Collateral {
    /// Total bonded balance
    pub balance: U256,
    /// Portion reserved by pending predeposits and disproofs
    pub locked: U256,
}

impl Collateral {
    /// Balance not reserved by any predeposit.
    #[must_use]
    pub fn unlocked(&self) -> U256 {
        self.balance.saturating_sub(self.locked)
    }
}

/// The per-operator collateral table.
#[derive(Debug, Clone, Default)]
pub struct CollateralLedger {
    accounts: HashMap<Address, Collateral>,
}

impl CollateralLedger {
    /// Empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The operator's collateral; zero for unknown operators.
    #[must_use]
    pub fn collateral_of(&self, operator: Address) -> Collateral {
        self.accounts.get(&operator).copied().unwrap_or_default()
    }

    /// The operator's unlocked balance.
    #[must_use]
    pub fn unlocked_of(&self, operator: Address) -> U256 {
        self.collateral_of(operator).unlocked()
    }

    /// Check that `amount` is nonzero and covered by unlocked balance,
    /// without mutating.
    ///
    /// # Errors
    ///
    /// [`LedgerError::ZeroAmount`] or [`LedgerError::InsufficientUnlocked`].
    pub fn ensure_unlocked(&self, operator: Address, amount: U256) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        let available = self.unlocked_of(operator);
        if amount > available {
            return Err(LedgerError::InsufficientUnlocked {
                required: amount,
                available,
            });
        }
        Ok(())
    }

    /// Increase the operator's free balance.
    ///
    /// # Errors
    ///
    /// [`LedgerError::ZeroAmount`], [`LedgerError::ZeroOperator`] or
    /// [`LedgerError::Overflow`].
    pub fn credit(&mut self, operator: Address, amount: U256) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        if operator.is_zero() {
            return Err(LedgerError::ZeroOperator);
        }
        let account = self.accounts.entry(operator).or_default();
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Remove `amount` from the unlocked part of the balance.
    ///
    /// # Errors
    ///
    /// [`LedgerError::ZeroAmount`] or [`LedgerError::InsufficientUnlocked`].
    pub fn debit_unlocked(&mut self, operator: Address, amount: U256) -> Result<(), LedgerError> {
        self.ensure_unlocked(operator, amount)?;
        let account = self.accounts.entry(operator).or_default();
        account.balance -= amount;
        debug_assert!(account.locked <= account.balance);
        Ok(())
    }

    /// Reserve `amount` of unlocked balance.
    ///
    /// # Errors
    ///
    /// [`LedgerError::ZeroAmount`] or [`LedgerError::InsufficientUnlocked`].
    pub fn lock(&mut self, operator: Address, amount: U256) -> Result<(), LedgerError> {
        self.ensure_unlocked(operator, amount)?;
        let account = self.accounts.entry(operator).or_default();
        account.locked += amount;
        debug_assert!(account.locked <= account.balance);
        Ok(())
    }

    /// Return `amount` of locked balance to the free part.
    ///
    /// # Errors
    ///
    /// [`LedgerError::ZeroAmount`] or [`LedgerError::ExceedsLocked`].
    pub fn unlock(&mut self, operator: Address, amount: U256) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        let account = self.accounts.entry(operator).or_default();
        if amount > account.locked {
            return Err(LedgerError::ExceedsLocked {
                requested: amount,
                locked: account.locked,
            });
        }
        account.locked -= amount;
        Ok(())
    }

    /// Remove `amount` from both the locked and the total balance, e.g.
    /// when a disproven unit leaves the ledger.
    ///
    /// # Errors
    ///
    /// [`LedgerError::ZeroAmount`] or [`LedgerError::ExceedsLocked`].
    pub fn forfeit(&mut self, operator: Address, amount: U256) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        let account = self.accounts.entry(operator).or_default();
        if amount > account.locked {
            return Err(LedgerError::ExceedsLocked {
                requested: amount,
                locked: account.locked,
            });
        }
        account.locked -= amount;
        account.balance -= amount;
        debug_assert!(account.locked <= account.balance);
        Ok(())
    }
}
