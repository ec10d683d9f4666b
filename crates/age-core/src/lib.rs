//! Shared stanza/header wire format and cryptographic primitives for the
//! age file encryption format.
//!
//! This crate knows nothing about recipients, identities, or the STREAM
//! payload transform — see the `age` crate for those. It only knows how
//! to read and write the textual envelope (`format`) and the small set of
//! building-block operations (`primitives`) every recipient type and the
//! STREAM transform build on.

pub mod base64;
pub mod error;
pub mod format;
pub mod primitives;

pub use format::{FileKey, FileKeyBytes, Header, Stanza};
