//! PEM-style ASCII armor: a transparent `Read`/`Write` wrapper around the
//! binary age format (§6). This is explicitly *not* part of the
//! cryptographic core — it never sees a file key or any derived key, only
//! the already-sealed bytes the orchestrator produces or is about to
//! consume.

use std::io::{self, BufRead, Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine};

const BEGIN_MARKER: &str = "-----BEGIN AGE ENCRYPTED FILE-----";
const END_MARKER: &str = "-----END AGE ENCRYPTED FILE-----";
const COLUMNS: usize = 64;

/// Wraps a `Write` of raw age ciphertext bytes and emits the PEM-armored
/// text form: a `BEGIN`/`END` marker pair around standard (padded) base64
/// wrapped to 64 columns.
///
/// Buffers internally in 48-byte groups (the largest input size that
/// encodes to an exact multiple of the 64-column line width) so every
/// `write` call except the final `finish` emits only whole lines.
pub struct ArmoredWriter<W> {
    inner: W,
    buffer: Vec<u8>,
    wrote_begin: bool,
}

impl<W: Write> ArmoredWriter<W> {
    pub fn new(inner: W) -> Self {
        ArmoredWriter { inner, buffer: Vec::with_capacity(48), wrote_begin: false }
    }

    fn ensure_begin(&mut self) -> io::Result<()> {
        if !self.wrote_begin {
            writeln!(self.inner, "{BEGIN_MARKER}")?;
            self.wrote_begin = true;
        }
        Ok(())
    }

    fn flush_full_lines(&mut self) -> io::Result<()> {
        // 48 raw bytes -> 64 base64 characters, so flush in 48-byte groups.
        while self.buffer.len() >= 48 {
            let group: Vec<u8> = self.buffer.drain(..48).collect();
            writeln!(self.inner, "{}", STANDARD.encode(&group))?;
        }
        Ok(())
    }

    /// Flush any remaining buffered bytes as the final (possibly
    /// shorter-than-64-column) line, then write the `END` marker.
    pub fn finish(mut self) -> io::Result<W> {
        self.ensure_begin()?;
        if !self.buffer.is_empty() {
            writeln!(self.inner, "{}", STANDARD.encode(&self.buffer))?;
        }
        writeln!(self.inner, "{END_MARKER}")?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for ArmoredWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ensure_begin()?;
        self.buffer.extend_from_slice(buf);
        self.flush_full_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Wraps a `BufRead` over PEM-armored text and yields the decoded raw
/// bytes, line by line, stopping at the `END` marker.
pub struct ArmoredReader<R> {
    inner: R,
    decoded: Vec<u8>,
    pos: usize,
    started: bool,
    finished: bool,
}

impl<R: BufRead> ArmoredReader<R> {
    pub fn new(inner: R) -> Self {
        ArmoredReader { inner, decoded: Vec::new(), pos: 0, started: false, finished: false }
    }

    fn start(&mut self) -> io::Result<()> {
        let mut line = String::new();
        self.inner.read_line(&mut line)?;
        if line.trim_end_matches(['\n', '\r']) != BEGIN_MARKER {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "missing armor BEGIN marker"));
        }
        self.started = true;
        Ok(())
    }

    fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = String::new();
        let n = self.inner.read_line(&mut line)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "armor missing END marker"));
        }
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed == END_MARKER {
            self.finished = true;
            return Ok(None);
        }
        if trimmed.len() > COLUMNS {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "armor line too long"));
        }
        STANDARD
            .decode(trimmed)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl<R: BufRead> Read for ArmoredReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.pos < self.decoded.len() {
                let n = (self.decoded.len() - self.pos).min(buf.len());
                buf[..n].copy_from_slice(&self.decoded[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }
            if !self.started {
                self.start()?;
            }
            match self.next_line()? {
                Some(bytes) => {
                    self.decoded = bytes;
                    self.pos = 0;
                }
                None => return Ok(0),
            }
        }
    }
}
