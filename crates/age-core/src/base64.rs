//! Canonical unpadded URL-safe base64, and the "wrap to 64 columns with an
//! unambiguous terminator" framing the stanza body codec needs.
//!
//! Every base64 string this format emits or accepts uses the URL-safe
//! alphabet (`-`/`_` instead of `+`/`/`) without `=` padding. Padding
//! characters, non-canonical encodings (trailing bits set to anything but
//! zero), and any other alphabet are rejected on decode rather than
//! silently accepted — the header MAC covers the serialized bytes exactly,
//! so two different byte strings that happen to decode to the same value
//! must not both be accepted.

use base64::{
    alphabet,
    engine::{general_purpose::NO_PAD, GeneralPurposeConfig},
    Engine,
};

use crate::error::FormatError;

/// The number of base64 characters per wrapped body line.
pub const COLUMNS: usize = 64;

const ENGINE: base64::engine::GeneralPurpose =
    base64::engine::GeneralPurpose::new(&alphabet::URL_SAFE, NO_PAD);

/// Encode `bytes` as canonical unpadded URL-safe base64.
pub fn encode(bytes: &[u8]) -> String {
    ENGINE.encode(bytes)
}

/// Decode `s` as canonical unpadded URL-safe base64, rejecting padding and
/// any non-canonical (trailing-bit-set) encoding.
pub fn decode(s: &str) -> Result<Vec<u8>, FormatError> {
    if s.contains('=') || !s.is_ascii() {
        return Err(FormatError::NonCanonicalBase64);
    }
    // `decode` with a non-forgiving config rejects non-canonical padding
    // bits on its own; we additionally forbid `=` above since some configs
    // only reject padding *length* mismatches, not stray characters.
    let strict = base64::engine::GeneralPurpose::new(
        &alphabet::URL_SAFE,
        GeneralPurposeConfig::new()
            .with_encode_padding(false)
            .with_decode_padding_mode(base64::engine::DecodePaddingMode::RequireNone)
            .with_decode_allow_trailing_bits(false),
    );
    strict
        .decode(s)
        .map_err(|_| FormatError::NonCanonicalBase64)
}

/// Split `bytes`'s base64 encoding into 64-column lines per §4.1, including
/// the canonical disambiguating empty final line: an empty body is a single
/// empty line, and a body whose encoded length is an exact multiple of 64
/// is followed by one empty line so the end of the stanza is unambiguous
/// without looking at the next line of the file.
pub fn wrap_body(bytes: &[u8]) -> Vec<String> {
    let encoded = encode(bytes);
    if encoded.is_empty() {
        return vec![String::new()];
    }
    let mut lines: Vec<String> = encoded
        .as_bytes()
        .chunks(COLUMNS)
        .map(|c| std::str::from_utf8(c).expect("base64 output is ASCII").to_owned())
        .collect();
    if lines.last().map(String::len) == Some(COLUMNS) {
        lines.push(String::new());
    }
    lines
}

/// Inverse of [`wrap_body`]: join the full-width lines with `final_line`
/// and decode. Validation that non-final lines are exactly `COLUMNS`
/// characters is the caller's (stanza parser's) job, since only it knows
/// which lines are "non-final".
pub fn unwrap_body(full_lines: &[&str], final_line: &str) -> Result<Vec<u8>, FormatError> {
    let mut joined = String::with_capacity(full_lines.iter().map(|l| l.len()).sum::<usize>() + final_line.len());
    for line in full_lines {
        joined.push_str(line);
    }
    joined.push_str(final_line);
    decode(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let data = b"Man";
        // RFC 4648 worked example: "Man" -> "TWFu" in standard base64; the
        // URL-safe alphabet agrees here since no +/ characters appear.
        assert_eq!(encode(data), "TWFu");
        assert_eq!(decode("TWFu").unwrap(), data);
    }

    #[test]
    fn decode_rejects_padding() {
        assert_eq!(decode("TWFu=").unwrap_err(), FormatError::NonCanonicalBase64);
    }

    #[test]
    fn decode_rejects_standard_alphabet_chars() {
        // '+' and '/' are not in the URL-safe alphabet.
        assert!(decode("++//").is_err());
    }

    #[test]
    fn wrap_empty_body_is_single_empty_line() {
        assert_eq!(wrap_body(&[]), vec![String::new()]);
    }

    #[test]
    fn wrap_exact_multiple_has_trailing_empty_line() {
        // 48 bytes encodes to exactly 64 base64 characters (48 * 4 / 3 = 64).
        let bytes = vec![0xAB; 48];
        let lines = wrap_body(&bytes);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 64);
        assert_eq!(lines[1], "");
    }

    #[test]
    fn wrap_and_unwrap_round_trip() {
        for len in [0usize, 1, 16, 32, 48, 64, 100, 1000] {
            let bytes: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
            let lines = wrap_body(&bytes);
            let (last, rest) = lines.split_last().unwrap();
            let refs: Vec<&str> = rest.iter().map(String::as_str).collect();
            let got = unwrap_body(&refs, last).unwrap();
            assert_eq!(got, bytes);
        }
    }
}
