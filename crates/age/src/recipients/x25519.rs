//! The X25519 recipient/identity: ECDH + HKDF + ChaCha20-Poly1305 wrap of
//! the file key (§4.3).

use std::fmt;

use age_core::base64;
use age_core::format::{FileKey, FileKeyBytes, Stanza, FILE_KEY_BYTES};
use age_core::primitives::{aead_decrypt, aead_encrypt, constant_time_eq, hkdf};
use rand_core::OsRng;
use secrecy::{ExposeSecret, Secret};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{DecryptError, EncryptError};
use crate::keys::{self, KeyError};
use crate::{Identity, Recipient};

const STANZA_TAG: &str = "X25519";
const WRAP_INFO: &[u8] = b"age-encryption.org/v1/X25519";

/// An ephemeral or recipient X25519 shared secret that came out all-zero:
/// the recipient's public key was a low-order point, so the "shared
/// secret" carries no entropy from the private scalar at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LowOrderPoint;

impl fmt::Display for LowOrderPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X25519 shared secret is a low-order point")
    }
}

impl std::error::Error for LowOrderPoint {}

fn is_low_order(shared_secret: &[u8; 32]) -> bool {
    constant_time_eq(shared_secret, &[0u8; 32])
}

/// `HKDF-SHA-256(salt = ephemeral_share || recipient_share, info =
/// "age-encryption.org/v1/X25519", ikm = shared_secret || ephemeral_share)`
/// (§4.3). The same derivation runs on both the wrap and unwrap side: the
/// two parties agree on `shared_secret` via Diffie-Hellman, and already
/// both know `ephemeral_share`/`recipient_share` from the stanza.
fn derive_wrap_key(shared_secret: &[u8; 32], ephemeral_share: &[u8; 32], recipient_share: &[u8; 32]) -> [u8; 32] {
    let mut ikm = Vec::with_capacity(64);
    ikm.extend_from_slice(shared_secret);
    ikm.extend_from_slice(ephemeral_share);

    let mut salt = Vec::with_capacity(64);
    salt.extend_from_slice(ephemeral_share);
    salt.extend_from_slice(recipient_share);

    hkdf(&salt, WRAP_INFO, &ikm)
}

/// A recipient addressed by its X25519 public key, displayed as the
/// Bech32 `age1...` string (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct X25519Recipient {
    public_key: [u8; 32],
}

impl X25519Recipient {
    pub fn from_bytes(public_key: [u8; 32]) -> Self {
        X25519Recipient { public_key }
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.public_key
    }

    /// Parse the Bech32 `age1...` recipient string (§6).
    pub fn parse(s: &str) -> Result<Self, KeyError> {
        keys::decode_recipient(s).map(Self::from_bytes)
    }
}

impl fmt::Display for X25519Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", keys::encode_recipient(&self.public_key))
    }
}

impl Recipient for X25519Recipient {
    fn wrap_file_key(&self, file_key: &FileKey) -> Result<Vec<Stanza>, EncryptError> {
        let ephemeral_secret = StaticSecret::random_from_rng(OsRng);
        let ephemeral_public = PublicKey::from(&ephemeral_secret);
        let recipient_public = PublicKey::from(self.public_key);

        let shared = ephemeral_secret.diffie_hellman(&recipient_public);
        if is_low_order(shared.as_bytes()) {
            return Err(EncryptError::Recipient(Box::new(LowOrderPoint)));
        }

        let wrap_key = derive_wrap_key(shared.as_bytes(), ephemeral_public.as_bytes(), &self.public_key);
        let body = aead_encrypt(&wrap_key, file_key.expose_secret().as_ref());

        let stanza = Stanza::new(STANZA_TAG, vec![base64::encode(ephemeral_public.as_bytes())], body)
            .map_err(|e| EncryptError::Recipient(Box::new(e)))?;
        Ok(vec![stanza])
    }
}

/// An identity: an X25519 secret scalar, displayed as the Bech32
/// `AGE-SECRET-KEY-1...` string (§6).
pub struct X25519Identity {
    secret: StaticSecret,
}

impl X25519Identity {
    pub fn from_bytes(scalar: [u8; 32]) -> Self {
        X25519Identity { secret: StaticSecret::from(scalar) }
    }

    /// Sample a fresh identity (what the CLI's `keygen` subcommand calls).
    pub fn generate() -> Self {
        X25519Identity { secret: StaticSecret::random_from_rng(OsRng) }
    }

    pub fn to_public(&self) -> X25519Recipient {
        X25519Recipient::from_bytes(*PublicKey::from(&self.secret).as_bytes())
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// Parse the Bech32 `AGE-SECRET-KEY-1...` identity string (§6).
    pub fn parse(s: &str) -> Result<Self, KeyError> {
        keys::decode_identity(s).map(Self::from_bytes)
    }
}

impl Identity for X25519Identity {
    fn unwrap_stanza(&self, stanza: &Stanza) -> Option<Result<FileKey, DecryptError>> {
        if stanza.tag != STANZA_TAG {
            return None;
        }
        Some(unwrap_x25519(self, stanza))
    }
}

/// Split out of [`Identity::unwrap_stanza`] so every failure path can
/// return a concrete `DecryptError` (never panic), even though the
/// orchestrator only ever distinguishes "matched" from "didn't match" for
/// this recipient type — per §7 a malformed or cryptographically invalid
/// X25519 stanza is folded into the same outcome as "no identity here
/// matched at all" once it reaches the caller.
fn unwrap_x25519(identity: &X25519Identity, stanza: &Stanza) -> Result<FileKey, DecryptError> {
    let [ephemeral_arg] = &stanza.args[..] else {
        return Err(DecryptError::NoMatchingIdentity);
    };
    let ephemeral_bytes = base64::decode(ephemeral_arg).map_err(|_| DecryptError::NoMatchingIdentity)?;
    let ephemeral: [u8; 32] = ephemeral_bytes.try_into().map_err(|_| DecryptError::NoMatchingIdentity)?;
    let ephemeral_public = PublicKey::from(ephemeral);

    let shared = identity.secret.diffie_hellman(&ephemeral_public);
    if is_low_order(shared.as_bytes()) {
        return Err(DecryptError::NoMatchingIdentity);
    }

    let recipient_public = PublicKey::from(&identity.secret);
    let wrap_key = derive_wrap_key(shared.as_bytes(), &ephemeral, recipient_public.as_bytes());

    let file_key_bytes = aead_decrypt(&wrap_key, &stanza.body).map_err(|_| DecryptError::NoMatchingIdentity)?;
    if file_key_bytes.len() != FILE_KEY_BYTES {
        return Err(DecryptError::NoMatchingIdentity);
    }
    let mut bytes = [0u8; FILE_KEY_BYTES];
    bytes.copy_from_slice(&file_key_bytes);
    Ok(Secret::new(FileKeyBytes(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_unwrap_round_trips() {
        let identity = X25519Identity::generate();
        let recipient = identity.to_public();
        let file_key = age_core::format::generate_file_key();

        let stanzas = recipient.wrap_file_key(&file_key).unwrap();
        assert_eq!(stanzas.len(), 1);
        assert_eq!(stanzas[0].tag, STANZA_TAG);

        let unwrapped = identity.unwrap_stanza(&stanzas[0]).unwrap().unwrap();
        assert_eq!(unwrapped.expose_secret().as_ref(), file_key.expose_secret().as_ref());
    }

    #[test]
    fn wrong_identity_does_not_unwrap() {
        let identity = X25519Identity::generate();
        let other = X25519Identity::generate();
        let file_key = age_core::format::generate_file_key();
        let stanzas = identity.to_public().wrap_file_key(&file_key).unwrap();
        assert!(other.unwrap_stanza(&stanzas[0]).unwrap().is_err());
    }

    #[test]
    fn unrelated_stanza_tag_is_not_mine() {
        let identity = X25519Identity::generate();
        let stanza = Stanza::new("scrypt", vec![], vec![1u8; 32]).unwrap();
        assert!(identity.unwrap_stanza(&stanza).is_none());
    }

    #[test]
    fn bech32_round_trip() {
        let identity = X25519Identity::generate();
        let recipient = identity.to_public();

        let recipient_str = recipient.to_string();
        assert!(recipient_str.starts_with("age1"));
        assert_eq!(X25519Recipient::parse(&recipient_str).unwrap(), recipient);

        let identity_bytes = identity.to_bytes();
        let reparsed = X25519Identity::parse(&keys::encode_identity(&identity_bytes)).unwrap();
        assert_eq!(reparsed.to_bytes(), identity_bytes);
    }
}
