use std::io;

use age_core::error::FormatError;
use thiserror::Error;

/// Errors from [`crate::Encryptor`].
///
/// Policy errors (the scrypt-exclusivity rule) are distinguished from I/O
/// errors because callers authoring encrypt-side tooling need a specific
/// message; neither is a cryptographic error, since nothing secret has
/// been touched yet when these fire.
#[derive(Debug, Error)]
pub enum EncryptError {
    #[error("at least one recipient is required")]
    NoRecipients,

    #[error("a scrypt recipient must be the only recipient")]
    ScryptWithOtherRecipients,

    #[error("recipient failed to wrap the file key: {0}")]
    Recipient(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("plaintext exceeds the maximum STREAM length")]
    PlaintextTooLong,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors from [`crate::Decryptor`].
///
/// Per §7, the cryptographic-failure variants ([`DecryptError::NoMatchingIdentity`],
/// [`DecryptError::HeaderMacMismatch`], [`DecryptError::PayloadMacMismatch`])
/// are intentionally coarse: a caller that surfaces their `Display` text to
/// a user learns only "decryption failed", never *why*, so a
/// trial-decryption loop over many files or many identities cannot be
/// turned into an oracle.
#[derive(Debug, Error)]
pub enum DecryptError {
    #[error("header is not a valid age header")]
    InvalidHeader(#[from] FormatError),

    #[error("unsupported age version")]
    UnsupportedVersion,

    #[error("a scrypt stanza must be the only stanza in the header")]
    ScryptWithOtherRecipients,

    #[error("scrypt work factor is outside the accepted range")]
    ScryptWorkFactorOutOfRange,

    #[error("no identity matched any recipient stanza")]
    NoMatchingIdentity,

    #[error("header MAC verification failed")]
    HeaderMacMismatch,

    #[error("payload authentication failed")]
    PayloadMacMismatch,

    #[error("payload ended before the last-chunk frame")]
    PayloadTruncated,

    #[error("payload exceeds the maximum STREAM length")]
    PayloadTooLong,

    #[error("identity plug-in failed: {0}")]
    Identity(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error(transparent)]
    Io(#[from] io::Error),
}
