//! An implementation of the [age](https://age-encryption.org) file
//! encryption format: the `Encryptor`/`Decryptor` orchestrator (§4.6), the
//! X25519 and scrypt recipient/identity algorithms (§4.3, §4.4), and the
//! STREAM chunked-AEAD payload transform (§4.5), all built on the header
//! and stanza wire format in `age_core`.
//!
//! ```
//! use age::Encryptor;
//! use age::recipients::x25519::X25519Identity;
//! use std::io::{Read, Write};
//!
//! let identity = X25519Identity::generate();
//! let recipient = identity.to_public();
//!
//! let encryptor = Encryptor::with_recipients(vec![Box::new(recipient)]).unwrap();
//! let mut encrypted = Vec::new();
//! {
//!     let mut writer = encryptor.wrap_output(&mut encrypted).unwrap();
//!     writer.write_all(b"hello age").unwrap();
//!     writer.finish().unwrap();
//! }
//!
//! let decryptor = age::Decryptor::with_identities(vec![Box::new(identity)]);
//! let mut reader = decryptor.decrypt(std::io::BufReader::new(&encrypted[..])).unwrap();
//! let mut plaintext = Vec::new();
//! reader.read_to_end(&mut plaintext).unwrap();
//! assert_eq!(plaintext, b"hello age");
//! ```

#[cfg(feature = "armor")]
pub mod armor;
pub mod error;
pub mod keys;
pub mod recipients;
mod stream;

use std::io::{self, BufRead, Read, Write};

use age_core::format::{FileKey, Header, Stanza};
use age_core::primitives::hkdf;
use rand::RngCore;
use rand_core::OsRng;
use secrecy::ExposeSecret;

pub use age_core::format::generate_file_key;
pub use error::{DecryptError, EncryptError};
pub use stream::{StreamReader, StreamWriter};

const STREAM_NONCE_LEN: usize = 16;
const PAYLOAD_KEY_LABEL: &[u8] = b"payload";
const SCRYPT_TAG: &str = "scrypt";

/// A capability that can wrap a given file key into one or more header
/// stanzas (§3, §6). The core provides
/// [`recipients::x25519::X25519Recipient`] and
/// [`recipients::scrypt::ScryptRecipient`]; this is also the extension
/// point external recipient families (SSH, hardware tokens) implement.
pub trait Recipient {
    /// Produce the stanza(s) that wrap `file_key` for this recipient.
    fn wrap_file_key(&self, file_key: &FileKey) -> Result<Vec<Stanza>, EncryptError>;

    /// Whether this recipient emits a `scrypt` stanza, which by §3 must be
    /// the only stanza in a header. [`Encryptor::with_recipients`] uses
    /// this to enforce that rule without downcasting the trait object.
    fn is_scrypt(&self) -> bool {
        false
    }
}

/// A capability that can attempt to unwrap a file key from a stanza (§3,
/// §6). The core provides [`recipients::x25519::X25519Identity`] and
/// [`recipients::scrypt::ScryptIdentity`].
pub trait Identity {
    /// Attempt to unwrap the file key from a single stanza. Returns
    /// `None` if this identity does not recognize the stanza's type (the
    /// normal, non-error "not mine" outcome from §7); `Some(Err(_))` means
    /// the stanza matched this identity's type but failed to unwrap for a
    /// cryptographic or policy reason.
    fn unwrap_stanza(&self, stanza: &Stanza) -> Option<Result<FileKey, DecryptError>>;

    /// Attempt to unwrap from the full ordered stanza list. Identity types
    /// that must aggregate more than one stanza to reconstruct a file key
    /// (the SSH plug-in family does, per §6) override this; every identity
    /// in the core just tries each stanza independently.
    fn unwrap_stanzas(&self, stanzas: &[Stanza]) -> Option<Result<FileKey, DecryptError>> {
        stanzas.iter().find_map(|s| self.unwrap_stanza(s))
    }
}

/// Builds an age header for a validated recipient set and hands back a
/// [`StreamWriter`] that encrypts everything subsequently written to it
/// (§4.6 encrypt).
pub struct Encryptor {
    recipients: Vec<Box<dyn Recipient>>,
}

impl Encryptor {
    /// Validate `recipients` against the §3 uniqueness rule (a `scrypt`
    /// recipient must be the only recipient) and construct an `Encryptor`.
    pub fn with_recipients(recipients: Vec<Box<dyn Recipient>>) -> Result<Self, EncryptError> {
        if recipients.is_empty() {
            return Err(EncryptError::NoRecipients);
        }
        if recipients.iter().any(|r| r.is_scrypt()) && recipients.len() != 1 {
            return Err(EncryptError::ScryptWithOtherRecipients);
        }
        Ok(Encryptor { recipients })
    }

    /// Sample a file key, wrap it for every recipient, write the header,
    /// and return a `StreamWriter` ready to encrypt the plaintext.
    pub fn wrap_output<W: Write>(&self, mut output: W) -> Result<StreamWriter<W>, EncryptError> {
        let file_key = generate_file_key();

        let mut stanzas = Vec::new();
        for recipient in &self.recipients {
            stanzas.extend(recipient.wrap_file_key(&file_key)?);
        }

        Header::write(&mut output, &file_key, stanzas)?;

        let mut stream_nonce = [0u8; STREAM_NONCE_LEN];
        OsRng.fill_bytes(&mut stream_nonce);
        output.write_all(&stream_nonce)?;

        let payload_key = hkdf(&stream_nonce, PAYLOAD_KEY_LABEL, file_key.expose_secret().as_ref());
        Ok(StreamWriter::new(output, payload_key))
    }
}

/// Parses an age header, attempts to unwrap the file key with the
/// supplied identities, verifies the header MAC, and hands back a
/// [`StreamReader`] that decrypts the payload (§4.6 decrypt).
pub struct Decryptor {
    identities: Vec<Box<dyn Identity>>,
}

impl Decryptor {
    pub fn with_identities(identities: Vec<Box<dyn Identity>>) -> Self {
        Decryptor { identities }
    }

    pub fn decrypt<R: BufRead>(&self, mut input: R) -> Result<StreamReader<R>, DecryptError> {
        let header = match Header::read(&mut input) {
            Ok(header) => header,
            Err(age_core::error::FormatError::UnsupportedVersion) => return Err(DecryptError::UnsupportedVersion),
            Err(e) => return Err(DecryptError::InvalidHeader(e)),
        };

        let scrypt_stanzas = header.stanzas.iter().filter(|s| s.tag == SCRYPT_TAG).count();
        if scrypt_stanzas > 0 && header.stanzas.len() != 1 {
            return Err(DecryptError::ScryptWithOtherRecipients);
        }

        let file_key = self.find_file_key(&header)?;

        if !header.verify_mac(&file_key)? {
            return Err(DecryptError::HeaderMacMismatch);
        }

        let mut stream_nonce = [0u8; STREAM_NONCE_LEN];
        input.read_exact(&mut stream_nonce)?;
        let payload_key = hkdf(&stream_nonce, PAYLOAD_KEY_LABEL, file_key.expose_secret().as_ref());

        Ok(StreamReader::new(input, payload_key))
    }

    /// Try every stanza against every identity in order, per §4.6 step 3.
    /// A concrete policy error (currently only an out-of-range scrypt work
    /// factor) is surfaced immediately rather than swallowed as "try the
    /// next identity," since it indicates a malformed header rather than a
    /// simple key mismatch.
    fn find_file_key(&self, header: &Header) -> Result<FileKey, DecryptError> {
        for stanza in &header.stanzas {
            for identity in &self.identities {
                match identity.unwrap_stanza(stanza) {
                    Some(Ok(file_key)) => return Ok(file_key),
                    Some(Err(DecryptError::ScryptWorkFactorOutOfRange)) => {
                        return Err(DecryptError::ScryptWorkFactorOutOfRange)
                    }
                    Some(Err(_)) | None => continue,
                }
            }
        }
        Err(DecryptError::NoMatchingIdentity)
    }
}
