use thiserror::Error;

/// Errors from parsing or serializing the stanza/header wire format.
///
/// These are pure format errors: they say nothing about whether any key
/// material was valid, only whether the bytes on the wire were a
/// well-formed age header. Never constructed from partially-read input —
/// a `FormatError` means the parser is certain the input cannot be this
/// format.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("header exceeds maximum size")]
    HeaderTooLarge,

    #[error("header contains too many stanzas")]
    TooManyStanzas,

    #[error("unsupported age version line")]
    UnsupportedVersion,

    #[error("header is missing the MAC terminator line")]
    MissingMac,

    #[error("header must contain at least one stanza")]
    EmptyHeader,

    #[error("malformed stanza header line")]
    InvalidStanzaHeader,

    #[error("stanza type or argument contains invalid characters")]
    InvalidToken,

    #[error("stanza type or argument count exceeds the implementation bound")]
    TokenBoundExceeded,

    #[error("stanza body is not validly wrapped base64")]
    InvalidBody,

    #[error("stanza body exceeds maximum size")]
    BodyTooLarge,

    #[error("non-final body line is not exactly 64 base64 characters")]
    BadLineWrap,

    #[error("base64 data contains padding or non-canonical characters")]
    NonCanonicalBase64,

    #[error("trailing data after the header's MAC line")]
    TrailingData,
}

/// A primitive AEAD operation failed.
///
/// Deliberately a unit-like error: every cause (wrong key, tampered
/// ciphertext, truncated body) must look identical to a caller so that
/// trial-unwrap loops cannot be turned into an oracle. Richer context
/// belongs at the orchestrator level, never here.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
#[error("authenticated decryption failed")]
pub struct AeadError;

