//! The scrypt (passphrase) recipient/identity (§4.4).

use age_core::base64;
use age_core::format::{FileKey, FileKeyBytes, Stanza, FILE_KEY_BYTES};
use age_core::primitives::{aead_decrypt, aead_encrypt};
use rand::RngCore;
use rand_core::OsRng;
use secrecy::{ExposeSecret, Secret};

use crate::error::{DecryptError, EncryptError};
use crate::{Identity, Recipient};

const STANZA_TAG: &str = "scrypt";
const SALT_LABEL: &[u8] = b"age-encryption.org/v1/scrypt";
const SALT_LEN: usize = 16;

/// Default work factor (`N = 2^18`) used by [`ScryptRecipient::new`].
/// Chosen to match the age CLI's own default: expensive enough to matter
/// against an offline guesser, cheap enough for one interactive unlock.
pub const DEFAULT_WORK_FACTOR: u8 = 18;

/// Accepted `work_factor` range on decrypt (§4.4): below 1 is a
/// pointlessly weak, likely-crafted file; above 22 risks turning a single
/// decrypt attempt into a multi-second-to-minutes DoS.
pub const MIN_WORK_FACTOR: u8 = 1;
pub const MAX_WORK_FACTOR: u8 = 22;

fn derive_key(passphrase: &str, salt: &[u8; SALT_LEN], work_factor: u8) -> [u8; 32] {
    let mut salted = Vec::with_capacity(SALT_LABEL.len() + SALT_LEN);
    salted.extend_from_slice(SALT_LABEL);
    salted.extend_from_slice(salt);

    let params = scrypt::Params::new(work_factor, 8, 1, 32)
        .expect("work_factor is validated to be within scrypt::Params's accepted range");
    let mut out = [0u8; 32];
    scrypt::scrypt(passphrase.as_bytes(), &salted, &params, &mut out)
        .expect("a 32-byte output buffer is always a valid scrypt output length");
    out
}

/// A recipient that wraps the file key under a passphrase-derived key.
/// Per §3, a `scrypt` stanza must be the only stanza in a header, so an
/// [`crate::Encryptor`] rejects any recipient set that mixes this with
/// others.
pub struct ScryptRecipient {
    passphrase: Secret<String>,
    work_factor: u8,
}

impl ScryptRecipient {
    pub fn new(passphrase: impl Into<String>) -> Self {
        ScryptRecipient { passphrase: Secret::new(passphrase.into()), work_factor: DEFAULT_WORK_FACTOR }
    }

    /// Override the default work factor. `work_factor` is the exponent:
    /// the actual scrypt cost parameter is `N = 2^work_factor`.
    pub fn with_work_factor(mut self, work_factor: u8) -> Self {
        self.work_factor = work_factor;
        self
    }
}

impl Recipient for ScryptRecipient {
    fn is_scrypt(&self) -> bool {
        true
    }

    fn wrap_file_key(&self, file_key: &FileKey) -> Result<Vec<Stanza>, EncryptError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let key = derive_key(self.passphrase.expose_secret(), &salt, self.work_factor);
        let body = aead_encrypt(&key, file_key.expose_secret().as_ref());

        let stanza = Stanza::new(
            STANZA_TAG,
            vec![base64::encode(&salt), self.work_factor.to_string()],
            body,
        )
        .map_err(|e| EncryptError::Recipient(Box::new(e)))?;
        Ok(vec![stanza])
    }
}

/// An identity that holds the passphrase to try against a `scrypt`
/// stanza.
pub struct ScryptIdentity {
    passphrase: Secret<String>,
}

impl ScryptIdentity {
    pub fn new(passphrase: impl Into<String>) -> Self {
        ScryptIdentity { passphrase: Secret::new(passphrase.into()) }
    }
}

impl Identity for ScryptIdentity {
    fn unwrap_stanza(&self, stanza: &Stanza) -> Option<Result<FileKey, DecryptError>> {
        if stanza.tag != STANZA_TAG {
            return None;
        }
        Some(unwrap_scrypt(self, stanza))
    }
}

fn unwrap_scrypt(identity: &ScryptIdentity, stanza: &Stanza) -> Result<FileKey, DecryptError> {
    let [salt_arg, work_factor_arg] = &stanza.args[..] else {
        return Err(DecryptError::NoMatchingIdentity);
    };

    let salt_bytes = base64::decode(salt_arg).map_err(|_| DecryptError::NoMatchingIdentity)?;
    let salt: [u8; SALT_LEN] = salt_bytes.try_into().map_err(|_| DecryptError::NoMatchingIdentity)?;

    let work_factor: u8 = work_factor_arg.parse().map_err(|_| DecryptError::NoMatchingIdentity)?;
    // Checked before running scrypt at all: an out-of-range work factor is
    // a policy violation, not a reason to spend seconds (or minutes)
    // computing a key we're going to reject anyway.
    if !(MIN_WORK_FACTOR..=MAX_WORK_FACTOR).contains(&work_factor) {
        return Err(DecryptError::ScryptWorkFactorOutOfRange);
    }

    let key = derive_key(identity.passphrase.expose_secret(), &salt, work_factor);
    let file_key_bytes = aead_decrypt(&key, &stanza.body).map_err(|_| DecryptError::NoMatchingIdentity)?;
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
        let recipient = ScryptRecipient::new("correct horse battery staple").with_work_factor(12);
        let identity = ScryptIdentity::new("correct horse battery staple");
        let file_key = age_core::format::generate_file_key();

        let stanzas = recipient.wrap_file_key(&file_key).unwrap();
        assert_eq!(stanzas.len(), 1);
        assert_eq!(stanzas[0].tag, STANZA_TAG);
        assert_eq!(stanzas[0].args[1], "12");

        let unwrapped = identity.unwrap_stanza(&stanzas[0]).unwrap().unwrap();
        assert_eq!(unwrapped.expose_secret().as_ref(), file_key.expose_secret().as_ref());
    }

    #[test]
    fn wrong_passphrase_fails() {
        let recipient = ScryptRecipient::new("right").with_work_factor(10);
        let identity = ScryptIdentity::new("wrong");
        let file_key = age_core::format::generate_file_key();
        let stanzas = recipient.wrap_file_key(&file_key).unwrap();
        assert!(identity.unwrap_stanza(&stanzas[0]).unwrap().is_err());
    }

    #[test]
    fn out_of_range_work_factor_is_rejected_before_scrypt_runs() {
        let identity = ScryptIdentity::new("whatever");
        let stanza = Stanza::new(STANZA_TAG, vec![base64::encode(&[0u8; 16]), "30".to_owned()], vec![0u8; 32]).unwrap();
        let result = identity.unwrap_stanza(&stanza).unwrap();
        assert!(matches!(result, Err(DecryptError::ScryptWorkFactorOutOfRange)));
    }

    #[test]
    fn unrelated_stanza_tag_is_not_mine() {
        let identity = ScryptIdentity::new("whatever");
        let stanza = Stanza::new("X25519", vec!["TWFu".to_owned()], vec![1u8; 32]).unwrap();
        assert!(identity.unwrap_stanza(&stanza).is_none());
    }
}
