//! Mock capabilities for tests.

use crate::vault::{PayoutError, Payouts, StakingVault, ValidatorDeposit, VaultError};
use alloy::primitives::{Address, U256};

/// In-memory vault capability recording every relayed deposit.
#[derive(Debug, Clone)]
pub struct TestVault {
    address: Address,
    operator: Address,
    owner: Address,
    /// Every deposit relayed through this vault, in order.
    pub relayed: Vec<ValidatorDeposit>,
    /// When set, the relay rejects all batches.
    pub fail_relay: bool,
}

impl TestVault {
    /// Vault with the given identities and a working relay.
    #[must_use]
    pub fn new(address: Address, operator: Address, owner: Address) -> Self {
        Self {
            address,
            operator,
            owner,
            relayed: Vec::new(),
            fail_relay: false,
        }
    }
}

impl StakingVault for TestVault {
    fn address(&self) -> Address {
        self.address
    }

    fn node_operator(&self) -> Address {
        self.operator
    }

    fn owner(&self) -> Address {
        self.owner
    }

    fn relay_deposits(&mut self, deposits: &[ValidatorDeposit]) -> Result<(), VaultError> {
        if self.fail_relay {
            return Err(VaultError::RelayFailed("relay disabled".into()));
        }
        self.relayed.extend_from_slice(deposits);
        Ok(())
    }
}

/// Payout sink recording every transfer.
#[derive(Debug, Clone, Default)]
pub struct RecordingPayouts {
    /// Every successful payment, in order.
    pub payments: Vec<(Address, U256)>,
    /// When set, every transfer fails.
    pub fail: bool,
}

impl Payouts for RecordingPayouts {
    fn pay(&mut self, recipient: Address, amount: U256) -> Result<(), PayoutError> {
        if self.fail {
            return Err(PayoutError::TransferFailed { recipient, amount });
        }
        self.payments.push((recipient, amount));
        Ok(())
    }
}

/// Shorthand for a recognizable address.
#[must_use]
pub fn addr(tag: u8) -> Address {
    Address::repeat_byte(tag)
}
