//! Bech32 textual encoding for X25519 recipients and identities (§6).
//!
//! Recipients use the `age1...` form (HRP `age`, conventionally lowercase).
//! Identities use the `AGE-SECRET-KEY-1...` form: the same encoding, but
//! with the whole string — HRP, data, and checksum — uppercased, since a
//! BIP-173 Bech32 string must be entirely one case or the other. `bech32`
//! itself enforces that mixed-case input is rejected and case-folds an
//! all-uppercase string back to lowercase before checking the HRP, so
//! parsing here accepts either case for both key types; only `encode_*`
//! picks the conventional casing for display.

use bech32::{FromBase32, ToBase32, Variant};
use thiserror::Error;

const RECIPIENT_HRP: &str = "age";
const IDENTITY_HRP: &str = "age-secret-key-";

/// Errors parsing a Bech32-encoded X25519 recipient or identity string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("not a valid Bech32 string")]
    InvalidEncoding,

    #[error("wrong human-readable prefix for this key type")]
    WrongHrp,

    #[error("decoded key is not 32 bytes")]
    InvalidLength,
}

pub fn encode_recipient(public_key: &[u8; 32]) -> String {
    bech32::encode(RECIPIENT_HRP, public_key.to_base32(), Variant::Bech32)
        .expect("HRP and 32-byte payload are always valid Bech32 input")
}

pub fn encode_identity(scalar: &[u8; 32]) -> String {
    let lower = bech32::encode(IDENTITY_HRP, scalar.to_base32(), Variant::Bech32)
        .expect("HRP and 32-byte payload are always valid Bech32 input");
    lower.to_uppercase()
}

pub fn decode_recipient(s: &str) -> Result<[u8; 32], KeyError> {
    decode_with_hrp(s, RECIPIENT_HRP)
}

pub fn decode_identity(s: &str) -> Result<[u8; 32], KeyError> {
    decode_with_hrp(s, IDENTITY_HRP)
}

fn decode_with_hrp(s: &str, expected_hrp: &str) -> Result<[u8; 32], KeyError> {
    let (hrp, data, variant) = bech32::decode(s).map_err(|_| KeyError::InvalidEncoding)?;
    if variant != Variant::Bech32 {
        return Err(KeyError::InvalidEncoding);
    }
    if hrp != expected_hrp {
        return Err(KeyError::WrongHrp);
    }
    let bytes = Vec::<u8>::from_base32(&data).map_err(|_| KeyError::InvalidEncoding)?;
    bytes.try_into().map_err(|_| KeyError::InvalidLength)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_round_trips() {
        let pk = [7u8; 32];
        let encoded = encode_recipient(&pk);
        assert!(encoded.starts_with("age1"));
        assert_eq!(decode_recipient(&encoded).unwrap(), pk);
    }

    #[test]
    fn identity_round_trips_and_is_uppercase() {
        let sk = [9u8; 32];
        let encoded = encode_identity(&sk);
        assert!(encoded.starts_with("AGE-SECRET-KEY-1"));
        assert_eq!(encoded, encoded.to_uppercase());
        assert_eq!(decode_identity(&encoded).unwrap(), sk);
    }

    #[test]
    fn identity_accepts_lowercase_too() {
        let sk = [9u8; 32];
        let encoded = encode_identity(&sk).to_lowercase();
        assert_eq!(decode_identity(&encoded).unwrap(), sk);
    }

    #[test]
    fn identity_rejects_mixed_case() {
        let encoded = encode_identity(&[9u8; 32]);
        let mut chars: Vec<char> = encoded.chars().collect();
        let last = chars.len() - 1;
        chars[last] = chars[last].to_ascii_lowercase();
        let mixed: String = chars.into_iter().collect();
        assert!(decode_identity(&mixed).is_err());
    }

    #[test]
    fn recipient_rejects_wrong_hrp() {
        let encoded = encode_identity(&[1u8; 32]).to_lowercase();
        assert_eq!(decode_recipient(&encoded).unwrap_err(), KeyError::WrongHrp);
    }
}
