//! The header envelope: version line, stanzas, and the trailing MAC line
//! (§4.2).

use std::io::{self, BufRead, Write};

use secrecy::ExposeSecret;

use super::stanza::{Lines, Stanza};
use super::FileKey;
use crate::base64;
use crate::error::FormatError;
use crate::primitives::{constant_time_eq, hkdf};

/// The only version line this implementation understands.
pub const VERSION_LINE: &str = "age-encryption.org/v1";

/// Bound on total header bytes a parser will read before giving up.
pub const MAX_HEADER_BYTES: usize = 1024 * 1024;

/// Bound on the number of stanzas a single header may contain.
pub const MAX_STANZAS: usize = 256;

const MAC_PREFIX: &str = "--- ";

/// HKDF `info` label for the header MAC key (§3, §4.2).
const MAC_KEY_LABEL: &[u8] = b"header";

/// An ordered, non-empty sequence of stanzas plus the MAC authenticating
/// them.
///
/// `Header` only ever exists in memory as "what we are about to write" or
/// "what we just parsed and MAC-checked against a candidate file key" —
/// see [`Header::write`] and [`Header::read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub stanzas: Vec<Stanza>,
    pub mac: [u8; 32],
}

impl Header {
    /// Derive the header MAC key from a file key: `HKDF-SHA-256(ikm =
    /// file_key, salt = "", info = "header")`.
    pub fn mac_key(file_key: &FileKey) -> [u8; 32] {
        hkdf(b"", MAC_KEY_LABEL, file_key.expose_secret().as_ref())
    }

    /// Compute the header MAC over the version line and stanzas exactly as
    /// they would be serialized, without needing a `Header` value first.
    fn compute_mac(mac_key: &[u8; 32], stanzas: &[Stanza]) -> io::Result<[u8; 32]> {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        let mut buf = Vec::new();
        write_preamble(&mut buf, stanzas)?;

        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(mac_key)
            .expect("HMAC-SHA-256 accepts any key length");
        mac.update(&buf);
        let tag = mac.finalize().into_bytes();
        let mut out = [0u8; 32];
        out.copy_from_slice(&tag);
        Ok(out)
    }

    /// Build and serialize a header for `stanzas`, computing the MAC from
    /// `file_key`, and write the exact bytes produced (version line,
    /// stanzas, terminator) to `out`. Returns the constructed `Header` so
    /// the caller has the MAC value without re-parsing.
    pub fn write(out: &mut impl Write, file_key: &FileKey, stanzas: Vec<Stanza>) -> io::Result<Header> {
        let mac_key = Self::mac_key(file_key);
        let mac = Self::compute_mac(&mac_key, &stanzas)?;

        write_preamble(out, &stanzas)?;
        writeln!(out, "{}", base64::encode(&mac))?;

        Ok(Header { stanzas, mac })
    }

    /// Parse a header from `reader`, enforcing the version line, the
    /// stanza/body bounds, and the presence of a well-formed MAC line.
    /// This does **not** verify the MAC against any file key — that
    /// requires a candidate file key from a successful stanza unwrap, and
    /// is the orchestrator's job via [`Header::verify_mac`].
    pub fn read(reader: &mut impl BufRead) -> Result<Header, FormatError> {
        let mut lines = Lines::new(reader, MAX_HEADER_BYTES);

        let version = lines.next()?.ok_or(FormatError::UnsupportedVersion)?;
        if version != VERSION_LINE {
            return Err(FormatError::UnsupportedVersion);
        }

        let mut stanzas = Vec::new();
        loop {
            if stanzas.len() > MAX_STANZAS {
                return Err(FormatError::TooManyStanzas);
            }
            match Stanza::parse(&mut lines)? {
                Some(s) => stanzas.push(s),
                None => break,
            }
        }
        if stanzas.is_empty() {
            return Err(FormatError::EmptyHeader);
        }

        let mac_line = lines.next()?.ok_or(FormatError::MissingMac)?;
        let mac_b64 = mac_line
            .strip_prefix(MAC_PREFIX)
            .ok_or(FormatError::MissingMac)?;
        let mac_bytes = base64::decode(mac_b64)?;
        if mac_bytes.len() != 32 {
            return Err(FormatError::MissingMac);
        }
        let mut mac = [0u8; 32];
        mac.copy_from_slice(&mac_bytes);

        Ok(Header { stanzas, mac })
    }

    /// Constant-time check that `file_key` produces this header's MAC.
    ///
    /// A `false` result means either the wrong file key was used or the
    /// header bytes were tampered with after signing; per §7 this
    /// implementation deliberately does not distinguish the two to a
    /// caller.
    pub fn verify_mac(&self, file_key: &FileKey) -> io::Result<bool> {
        let mac_key = Self::mac_key(file_key);
        let expected = Self::compute_mac(&mac_key, &self.stanzas)?;
        Ok(constant_time_eq(&expected, &self.mac))
    }
}

/// Write the version line and stanzas, plus the `"--- "` prefix of the MAC
/// line (but not the MAC value itself) — i.e. everything the MAC is
/// computed over.
fn write_preamble(out: &mut impl Write, stanzas: &[Stanza]) -> io::Result<()> {
    writeln!(out, "{VERSION_LINE}")?;
    for s in stanzas {
        s.write(out)?;
    }
    write!(out, "{MAC_PREFIX}")
}
