//! # Deposit BLS
//!
//! BLS12-381 verification of consensus-layer deposit-message signatures:
//! compressed point decoding with full y-recovery, infinity and subgroup
//! checks, SHA-256 expand-message-XMD hash-to-curve and the product pairing
//! check `e(pubkey, H(msg)) · e(−g1, signature) == 1`.
//!
//! Independent of the Merkle proof stack; only the shared SSZ leaf helpers
//! are reused for the signing-root computation.

mod message;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
mod verify;

pub use message::DepositMessage;
pub use verify::{verify_deposit_message, BlsError, DST};
