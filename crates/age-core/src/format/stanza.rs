//! One typed stanza: `-> type arg1 arg2 ...` followed by a base64 body
//! wrapped to 64-column lines (§4.1).

use std::io::{self, BufRead, Write};

use crate::base64;
use crate::error::FormatError;

/// Prefix that begins every stanza header line.
const STANZA_PREFIX: &str = "-> ";

/// Conservative, implementation-defined bounds (§9 "Open questions"): the
/// core only ever emits a handful of short tokens and 32-byte bodies, so
/// these exist purely to cap parser memory use against adversarial input.
pub const MAX_TYPE_LEN: usize = 64;
pub const MAX_ARGS: usize = 8;
pub const MAX_ARG_LEN: usize = 256;
pub const MAX_BODY_LEN: usize = 128 * 1024;

/// One stanza: a type, its arguments, and an opaque body (typically a
/// wrapped 16-byte file key).
///
/// The field is named `tag` rather than `type` because the latter is a
/// Rust keyword; it carries exactly the "type" identifier from §3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stanza {
    pub tag: String,
    pub args: Vec<String>,
    pub body: Vec<u8>,
}

impl Stanza {
    /// Construct a stanza, validating that `tag` and every arg are
    /// non-empty ASCII tokens within the bounds above.
    pub fn new(
        tag: impl Into<String>,
        args: Vec<String>,
        body: Vec<u8>,
    ) -> Result<Self, FormatError> {
        let tag = tag.into();
        validate_token(&tag, MAX_TYPE_LEN)?;
        if args.len() > MAX_ARGS {
            return Err(FormatError::TokenBoundExceeded);
        }
        for arg in &args {
            validate_token(arg, MAX_ARG_LEN)?;
        }
        if body.len() > MAX_BODY_LEN {
            return Err(FormatError::BodyTooLarge);
        }
        Ok(Stanza { tag, args, body })
    }

    /// Serialize this stanza's wire form (header line plus wrapped body
    /// lines, each newline-terminated) into `out`.
    pub fn write(&self, out: &mut impl Write) -> io::Result<()> {
        write!(out, "{STANZA_PREFIX}{}", self.tag)?;
        for arg in &self.args {
            write!(out, " {arg}")?;
        }
        writeln!(out)?;
        for line in base64::wrap_body(&self.body) {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }

    /// Parse one stanza starting at the current position of `lines`
    /// (expected to be positioned just before a `"-> "` line). Returns
    /// `Ok(None)` if the next line is not a stanza header at all (i.e. it
    /// is the `--- ` MAC terminator), leaving `lines` unconsumed.
    pub fn parse(lines: &mut Lines) -> Result<Option<Self>, FormatError> {
        let Some(header_line) = lines.peek()? else {
            return Ok(None);
        };
        if !header_line.starts_with(STANZA_PREFIX) {
            return Ok(None);
        }
        let header_line = lines.next()?.expect("peeked Some above");

        let rest = &header_line[STANZA_PREFIX.len()..];
        if rest.is_empty() || rest.ends_with(' ') || rest.starts_with(' ') || rest.contains("  ") {
            return Err(FormatError::InvalidStanzaHeader);
        }
        let mut tokens = rest.split(' ');
        let tag = tokens.next().ok_or(FormatError::InvalidStanzaHeader)?;
        validate_token(tag, MAX_TYPE_LEN)?;
        let mut args = Vec::new();
        for tok in tokens {
            if args.len() >= MAX_ARGS {
                return Err(FormatError::TokenBoundExceeded);
            }
            validate_token(tok, MAX_ARG_LEN)?;
            args.push(tok.to_owned());
        }

        let body = parse_body(lines)?;

        Ok(Some(Stanza {
            tag: tag.to_owned(),
            args,
            body,
        }))
    }
}

/// Read the 64-column-wrapped body lines following a stanza header line,
/// enforcing the line-length and canonicalization rules of §4.1.
fn parse_body(lines: &mut Lines) -> Result<Vec<u8>, FormatError> {
    let mut full_lines: Vec<String> = Vec::new();
    loop {
        let line = lines.next()?.ok_or(FormatError::InvalidBody)?;
        if !line.is_ascii() {
            return Err(FormatError::InvalidBody);
        }
        if line.len() < base64::COLUMNS {
            // Final line: may be anything from 0 to 63 characters.
            let refs: Vec<&str> = full_lines.iter().map(String::as_str).collect();
            let body = base64::unwrap_body(&refs, &line)?;
            if body.len() > MAX_BODY_LEN {
                return Err(FormatError::BodyTooLarge);
            }
            return Ok(body);
        } else if line.len() == base64::COLUMNS {
            full_lines.push(line);
        } else {
            return Err(FormatError::BadLineWrap);
        }
    }
}

fn validate_token(token: &str, max_len: usize) -> Result<(), FormatError> {
    if token.is_empty() || token.len() > max_len {
        return Err(FormatError::InvalidToken);
    }
    if !token
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'+' | b'.'))
    {
        return Err(FormatError::InvalidToken);
    }
    Ok(())
}

/// A tiny line-at-a-time cursor over a `BufRead`, with one line of
/// lookahead. Shared by the stanza parser and the header parser so both
/// can make streaming, bounded-memory decisions about where a stanza ends
/// and the MAC terminator begins without buffering the whole header twice.
pub struct Lines<'a> {
    reader: &'a mut dyn BufRead,
    peeked: Option<Option<String>>,
    budget: usize,
}

impl<'a> Lines<'a> {
    /// Construct a line cursor that will fail with
    /// [`FormatError::HeaderTooLarge`] once more than `budget` bytes have
    /// been read in total.
    pub fn new(reader: &'a mut dyn BufRead, budget: usize) -> Self {
        Lines { reader, peeked: None, budget }
    }

    fn read_line(&mut self) -> Result<Option<String>, FormatError> {
        let mut buf = String::new();
        let n = self
            .reader
            .read_line(&mut buf)
            .map_err(|_| FormatError::InvalidStanzaHeader)?;
        if n == 0 {
            return Ok(None);
        }
        if n > self.budget {
            return Err(FormatError::HeaderTooLarge);
        }
        self.budget -= n;
        if !buf.ends_with('\n') {
            return Err(FormatError::InvalidStanzaHeader);
        }
        buf.pop();
        Ok(Some(buf))
    }

    pub fn next(&mut self) -> Result<Option<String>, FormatError> {
        if let Some(line) = self.peeked.take() {
            return Ok(line);
        }
        self.read_line()
    }

    pub fn peek(&mut self) -> Result<Option<&str>, FormatError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.read_line()?);
        }
        Ok(self.peeked.as_ref().unwrap().as_deref())
    }
}
