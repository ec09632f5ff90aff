//! Ed25519 key material helpers.
//!
//! The wire/config representation of a private key is 64 bytes (32-byte
//! seed || 32-byte public key), matching Go's `crypto/ed25519` convention
//! used throughout `original_source`. `ed25519-dalek`'s `SigningKey` only
//! needs the 32-byte seed; these helpers bridge the two.

use crate::model::{PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

/// Generate a fresh (public_key, private_key_64) pair.
pub fn generate() -> ([u8; PUBLIC_KEY_SIZE], [u8; PRIVATE_KEY_SIZE]) {
    let signing_key = SigningKey::generate(&mut OsRng);
    to_pair(&signing_key)
}

fn to_pair(signing_key: &SigningKey) -> ([u8; PUBLIC_KEY_SIZE], [u8; PRIVATE_KEY_SIZE]) {
    let public_key = signing_key.verifying_key().to_bytes();
    let mut private_key = [0u8; PRIVATE_KEY_SIZE];
    private_key[..32].copy_from_slice(&signing_key.to_bytes());
    private_key[32..].copy_from_slice(&public_key);
    (public_key, private_key)
}

/// Sign `message` with the 32-byte seed embedded in a 64-byte private key.
pub fn sign(private_key: &[u8; PRIVATE_KEY_SIZE], message: &[u8]) -> [u8; 64] {
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&private_key[..32]);
    let signing_key = SigningKey::from_bytes(&seed);
    signing_key.sign(message).to_bytes()
}

/// Verify a 64-byte signature against a 32-byte public key.
pub fn verify(public_key: &[u8; PUBLIC_KEY_SIZE], message: &[u8], signature: &[u8]) -> bool {
    let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);
    verifying_key.verify(message, &signature).is_ok()
}
