//! Deterministic keypair and signing helpers for tests.

use crate::message::DepositMessage;
use crate::verify::hash_to_g2;
use bls12_381::{G1Projective, G2Projective, Scalar};
use group::Curve;

/// A reproducible BLS keypair.
#[derive(Debug, Clone)]
pub struct TestKeypair {
    secret: Scalar,
    /// Compressed G1 public key.
    pub pubkey: [u8; 48],
}

impl TestKeypair {
    /// Keypair derived from a seed; equal seeds give equal keys.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        let secret = Scalar::from_raw([seed, 0x5eed, 0x1dea, 0]);
        let pubkey = (G1Projective::generator() * secret).to_affine();
        Self {
            secret,
            pubkey: pubkey.to_compressed(),
        }
    }

    /// Sign an arbitrary signing root.
    #[must_use]
    pub fn sign(&self, signing_root: &[u8; 32]) -> [u8; 96] {
        let h = G2Projective::from(hash_to_g2(signing_root));
        (h * self.secret).to_affine().to_compressed()
    }

    /// Build and sign the deposit message committing this key to
    /// `withdrawal_credentials`.
    #[must_use]
    pub fn sign_deposit(
        &self,
        withdrawal_credentials: [u8; 32],
        amount_gwei: u64,
    ) -> (DepositMessage, [u8; 96]) {
        let message = DepositMessage {
            pubkey: self.pubkey,
            withdrawal_credentials,
            amount_gwei,
        };
        let signature = self.sign(&message.signing_root());
        (message, signature)
    }
}
