//! The handful of cryptographic primitives the age format builds everything
//! else on top of: HKDF-SHA-256 for all key derivation, and a fixed
//! zero-nonce ChaCha20-Poly1305 call for every "wrap a 16-byte file key"
//! operation in the X25519 and scrypt stanzas.
//!
//! The zero nonce is safe here only because every key these primitives are
//! used with is used to encrypt exactly one 16-byte message (the wrap is
//! per-recipient, per-stanza, and the key is a fresh HKDF output every
//! time); it must never be reused for anything else.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use hkdf::Hkdf;
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub use crate::error::AeadError;

/// `HKDF-SHA-256(salt, ikm, info)`, truncated/expanded to exactly 32 bytes.
///
/// This is the only key derivation function in the format: the header MAC
/// key, the STREAM payload key, and both recipient wrap keys all go through
/// this same function with different `salt`/`info` domain separators.
pub fn hkdf(salt: &[u8], info: &[u8], ikm: &[u8]) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut out = [0u8; 32];
    hk.expand(info, &mut out)
        .expect("32 is a valid SHA-256 HKDF output length");
    out
}

/// Encrypt `plaintext` with ChaCha20-Poly1305 under `key`, using the all-zero
/// 12-byte nonce and empty associated data that every wrap operation in this
/// format uses.
pub fn aead_encrypt(key: &[u8; 32], plaintext: &[u8]) -> Vec<u8> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .encrypt(&Nonce::default(), Payload { msg: plaintext, aad: &[] })
        .expect("encryption with a fixed-size key and nonce cannot fail")
}

/// Decrypt `ciphertext` (body || 16-byte tag) with ChaCha20-Poly1305 under
/// `key`, using the all-zero nonce and empty associated data.
///
/// Returns [`AeadError`] on any tag mismatch. Callers in the orchestrator
/// must not distinguish this from "wrong key" vs. "tampered body" in
/// anything a user sees.
pub fn aead_decrypt(key: &[u8; 32], ciphertext: &[u8]) -> Result<Vec<u8>, AeadError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(&Nonce::default(), Payload { msg: ciphertext, aad: &[] })
        .map_err(|_| AeadError)
}

/// Constant-time equality over two equal-length byte strings.
///
/// Used for the header MAC comparison and the X25519 low-order-point check,
/// the two places in this format where a timing leak would turn into a
/// cryptographic oracle.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}
