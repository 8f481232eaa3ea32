//! Point decoding and the pairing check.

use crate::message::DepositMessage;
use bls12_381::hash_to_curve::{ExpandMsgXmd, HashToCurve};
use bls12_381::{multi_miller_loop, G1Affine, G2Affine, G2Prepared, G2Projective, Gt};
use group::{Curve, Group};
use sha2::Sha256;
use thiserror::Error;

/// Domain separation tag of the consensus-layer signature scheme.
pub const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Verification failures, ordered by the stage that detects them.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BlsError {
    /// The public key or signature encodes the point at infinity.
    #[error("input has infinity points")]
    InputHasInfinityPoints,
    /// A decoded point lies on the curve but outside the prime-order
    /// subgroup.
    #[error("input not on subgroup")]
    InputNotOnSubgroup,
    /// The pairing machinery rejected the input (malformed or off-curve
    /// encoding).
    #[error("pairing failed on malformed input")]
    BLSPairingFailed,
    /// The pairing equation does not hold.
    #[error("invalid deposit message signature")]
    InvalidSignature,
}

fn decode_g1(bytes: &[u8; 48]) -> Result<G1Affine, BlsError> {
    let point = Option::<G1Affine>::from(G1Affine::from_compressed_unchecked(bytes))
        .ok_or(BlsError::BLSPairingFailed)?;
    if bool::from(point.is_identity()) {
        return Err(BlsError::InputHasInfinityPoints);
    }
    if !bool::from(point.is_torsion_free()) {
        return Err(BlsError::InputNotOnSubgroup);
    }
    Ok(point)
}

fn decode_g2(bytes: &[u8; 96]) -> Result<G2Affine, BlsError> {
    let point = Option::<G2Affine>::from(G2Affine::from_compressed_unchecked(bytes))
        .ok_or(BlsError::BLSPairingFailed)?;
    if bool::from(point.is_identity()) {
        return Err(BlsError::InputHasInfinityPoints);
    }
    if !bool::from(point.is_torsion_free()) {
        return Err(BlsError::InputNotOnSubgroup);
    }
    Ok(point)
}

/// Map a 32-byte signing root onto G2.
pub(crate) fn hash_to_g2(signing_root: &[u8; 32]) -> G2Affine {
    <G2Projective as HashToCurve<ExpandMsgXmd<Sha256>>>::hash_to_curve(signing_root, DST)
        .to_affine()
}

/// Verify that `signature` is a valid BLS signature by `message.pubkey`
/// over the message's signing root.
///
/// # Errors
///
/// One of [`BlsError`] per the decoding, subgroup and pairing checks.
pub fn verify_deposit_message(
    message: &DepositMessage,
    signature: &[u8; 96],
) -> Result<(), BlsError> {
    let pubkey = decode_g1(&message.pubkey)?;
    let signature = decode_g2(signature)?;

    let signing_root = message.signing_root();
    let message_point = hash_to_g2(&signing_root);

    // e(pubkey, H(msg)) * e(-g1, signature) == 1
    let neg_generator = -G1Affine::generator();
    let paired = multi_miller_loop(&[
        (&pubkey, &G2Prepared::from(message_point)),
        (&neg_generator, &G2Prepared::from(signature)),
    ])
    .final_exponentiation();

    if paired == Gt::identity() {
        Ok(())
    } else {
        Err(BlsError::InvalidSignature)
    }
}
