//! Wallet signature verification.
//!
//! A payer proves control of their identity by signing the canonical
//! challenge for a nonce. Identity and signature travel base58-encoded.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use payments_types::challenge_message;

/// Checks `signed_message` is the payer's Ed25519 signature over the
/// challenge for `nonce`.
///
/// Every failure (empty input, bad encoding, wrong length, bad signature)
/// yields `false`; callers cannot tell them apart.
pub fn verify_wallet_signature(identity: &str, signed_message: &str, nonce: &str) -> bool {
    if identity.is_empty() || signed_message.is_empty() || nonce.is_empty() {
        return false;
    }

    let Ok(public_key) = bs58::decode(identity).into_vec() else {
        return false;
    };
    let Ok(signature) = bs58::decode(signed_message).into_vec() else {
        return false;
    };

    let pk_bytes: [u8; 32] = match public_key.as_slice().try_into() {
        Ok(b) => b,
        Err(_) => return false,
    };
    let sig_bytes: [u8; 64] = match signature.as_slice().try_into() {
        Ok(b) => b,
        Err(_) => return false,
    };

    let verifying_key = match VerifyingKey::from_bytes(&pk_bytes) {
        Ok(k) => k,
        Err(_) => return false,
    };

    let message = challenge_message(nonce);
    verifying_key
        .verify(message.as_bytes(), &Signature::from_bytes(&sig_bytes))
        .is_ok()
}
