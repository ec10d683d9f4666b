//! The age wire format: stanzas, the header envelope that carries them, and
//! the file key they protect.

mod header;
mod stanza;

pub use header::Header;
pub use stanza::{Lines, Stanza, MAX_ARGS, MAX_ARG_LEN, MAX_BODY_LEN, MAX_TYPE_LEN};

use secrecy::Secret;
use zeroize::Zeroize;

/// Number of bytes in a file key (§3).
pub const FILE_KEY_BYTES: usize = 16;

/// The per-file 16-byte secret every recipient stanza wraps and every
/// downstream key (header MAC key, STREAM payload key) is derived from.
///
/// Wrapped in [`secrecy::Secret`] so it zeroizes on drop and never derives
/// `Debug`/`Display` by accident; call [`FileKey::expose_secret`] to reach
/// the bytes for the one or two primitive operations that need them.
pub type FileKey = Secret<FileKeyBytes>;

/// Newtype so [`FileKey`] (a `Secret<FileKeyBytes>`) gets the `Zeroize`
/// impl `secrecy::Secret` requires.
pub struct FileKeyBytes(pub [u8; FILE_KEY_BYTES]);

impl Zeroize for FileKeyBytes {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl AsRef<[u8]> for FileKeyBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Sample a fresh, uniformly random file key.
pub fn generate_file_key() -> FileKey {
    use rand::RngCore;
    let mut bytes = [0u8; FILE_KEY_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    Secret::new(FileKeyBytes(bytes))
}
