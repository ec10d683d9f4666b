//! STREAM: the chunked-AEAD payload transform (§4.5).
//!
//! Plaintext is split into 64 KiB chunks, each sealed independently with
//! ChaCha20-Poly1305 under a key derived once per file and a nonce built
//! from an 11-byte big-endian counter plus a 1-byte last-chunk flag. The
//! writer buffers up to one chunk of plaintext so it only ever emits a
//! frame once it knows whether more data is coming; the reader mirrors
//! that by reading one byte past the current frame to find out the same
//! thing before deciding whether to decrypt under the last-chunk nonce.

use std::io::{self, Read, Write};

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};

use crate::error::{DecryptError, EncryptError};

/// Plaintext bytes per chunk, except possibly the last.
pub const CHUNK_SIZE: usize = 64 * 1024;
const TAG_LEN: usize = 16;

/// The counter is 11 bytes (88 bits); this is the largest value it may
/// take before the next increment would overflow that field.
const MAX_COUNTER: u128 = (1 << 88) - 1;

fn nonce_for(counter: u128, last: bool) -> [u8; 12] {
    let counter_bytes = counter.to_be_bytes();
    let mut nonce = [0u8; 12];
    nonce[..11].copy_from_slice(&counter_bytes[5..16]);
    nonce[11] = last as u8;
    nonce
}

/// Wraps a `Write` and encrypts everything written to it as a STREAM
/// payload, emitting sealed chunks as soon as a full chunk of plaintext
/// has been buffered. Call [`StreamWriter::finish`] to seal and emit the
/// final (possibly empty) chunk; dropping a `StreamWriter` without calling
/// `finish` silently discards any buffered-but-unsealed plaintext.
pub struct StreamWriter<W> {
    inner: W,
    cipher: ChaCha20Poly1305,
    counter: u128,
    buffer: Vec<u8>,
}

impl<W: Write> StreamWriter<W> {
    pub(crate) fn new(inner: W, key: [u8; 32]) -> Self {
        StreamWriter {
            inner,
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key)),
            counter: 0,
            buffer: Vec::with_capacity(CHUNK_SIZE),
        }
    }

    fn seal_and_emit(&mut self, last: bool) -> Result<(), EncryptError> {
        if self.counter > MAX_COUNTER {
            return Err(EncryptError::PlaintextTooLong);
        }
        let take = self.buffer.len().min(CHUNK_SIZE);
        let chunk: Vec<u8> = self.buffer.drain(..take).collect();
        let nonce = nonce_for(self.counter, last);
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), Payload { msg: &chunk, aad: &[] })
            .expect("encryption with a fixed-size key and nonce cannot fail");
        self.inner.write_all(&sealed)?;
        self.counter += 1;
        Ok(())
    }

    /// Seal and emit the final chunk (whatever plaintext remains buffered,
    /// including none), consuming `self` and returning the underlying
    /// writer.
    pub fn finish(mut self) -> Result<W, EncryptError> {
        self.seal_and_emit(true)?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for StreamWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        while self.buffer.len() > CHUNK_SIZE {
            self.seal_and_emit(false)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Wraps a `Read` of STREAM ciphertext and yields decrypted, authenticated
/// plaintext. A chunk is only ever handed back to the caller after its
/// AEAD tag has verified; per §5, callers still must not treat any bytes
/// as the whole file's plaintext until this reader returns EOF, since EOF
/// is exactly the event that confirms the last-chunk frame was seen.
pub struct StreamReader<R> {
    inner: R,
    cipher: ChaCha20Poly1305,
    counter: u128,
    pending_byte: Option<u8>,
    plaintext: Vec<u8>,
    plaintext_pos: usize,
    finished: bool,
}

impl<R: Read> StreamReader<R> {
    pub(crate) fn new(inner: R, key: [u8; 32]) -> Self {
        StreamReader {
            inner,
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key)),
            counter: 0,
            pending_byte: None,
            plaintext: Vec::new(),
            plaintext_pos: 0,
            finished: false,
        }
    }

    /// Read from `self.inner` until `buf` is full or the underlying reader
    /// reaches EOF; returns the number of bytes actually placed.
    fn fill_or_eof(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            let n = self.inner.read(&mut buf[total..])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }

    /// Read and decrypt the next chunk into `self.plaintext`, using a
    /// 1-byte lookahead to determine whether this is the final chunk:
    /// reading one byte past a full frame either succeeds (more data
    /// follows, so this frame is non-final) or hits EOF (this frame is the
    /// last one), without ever needing an explicit length or index on the
    /// wire.
    fn advance(&mut self) -> Result<(), DecryptError> {
        if self.finished {
            return Ok(());
        }
        if self.counter > MAX_COUNTER {
            return Err(DecryptError::PayloadTooLong);
        }

        let mut buf = vec![0u8; CHUNK_SIZE + TAG_LEN + 1];
        let mut offset = 0;
        if let Some(b) = self.pending_byte.take() {
            buf[0] = b;
            offset = 1;
        }
        let read = self.fill_or_eof(&mut buf[offset..])?;
        let total = offset + read;

        let (frame, last) = if total == buf.len() {
            // A byte beyond this frame was available: this frame is not last.
            self.pending_byte = Some(buf[CHUNK_SIZE + TAG_LEN]);
            (&buf[..CHUNK_SIZE + TAG_LEN], false)
        } else if total >= TAG_LEN {
            self.finished = true;
            (&buf[..total], true)
        } else {
            // Fewer than a tag's worth of bytes: either no payload at all
            // (file ends right after the header/STREAM nonce) or a frame
            // cut off mid-tag. Both are truncation, not a valid empty
            // final chunk — an empty *plaintext* stream still always
            // emits one full 16-byte-tag frame on the wire.
            return Err(DecryptError::PayloadTruncated);
        };

        let nonce = nonce_for(self.counter, last);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce), Payload { msg: frame, aad: &[] })
            .map_err(|_| DecryptError::PayloadMacMismatch)?;
        self.counter += 1;
        self.plaintext = plaintext;
        self.plaintext_pos = 0;
        Ok(())
    }
}

impl<R: Read> Read for StreamReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.plaintext_pos >= self.plaintext.len() {
            if self.finished {
                return Ok(0);
            }
            self.advance()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            if self.plaintext.is_empty() && self.finished {
                return Ok(0);
            }
        }
        let available = &self.plaintext[self.plaintext_pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.plaintext_pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read as _, Write as _};

    fn round_trip(plaintext: &[u8]) -> Vec<u8> {
        let key = [3u8; 32];
        let mut sealed = Vec::new();
        {
            let mut w = StreamWriter::new(&mut sealed, key);
            w.write_all(plaintext).unwrap();
            w.finish().unwrap();
        }
        let mut r = StreamReader::new(Cursor::new(sealed), key);
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn empty_plaintext_round_trips() {
        assert_eq!(round_trip(&[]), Vec::<u8>::new());
    }

    #[test]
    fn sub_chunk_plaintext_round_trips() {
        let data = vec![0xAB; 100];
        assert_eq!(round_trip(&data), data);
    }

    #[test]
    fn exact_chunk_boundary_emits_one_frame() {
        let data = vec![0u8; CHUNK_SIZE];
        let key = [1u8; 32];
        let mut sealed = Vec::new();
        {
            let mut w = StreamWriter::new(&mut sealed, key);
            w.write_all(&data).unwrap();
            w.finish().unwrap();
        }
        assert_eq!(sealed.len(), CHUNK_SIZE + TAG_LEN);
        let mut r = StreamReader::new(Cursor::new(sealed), key);
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn one_byte_over_boundary_emits_two_frames() {
        let data = vec![0u8; CHUNK_SIZE + 1];
        let key = [1u8; 32];
        let mut sealed = Vec::new();
        {
            let mut w = StreamWriter::new(&mut sealed, key);
            w.write_all(&data).unwrap();
            w.finish().unwrap();
        }
        assert_eq!(sealed.len(), (CHUNK_SIZE + TAG_LEN) + (1 + TAG_LEN));
        assert_eq!(round_trip(&data), data);
    }

    #[test]
    fn multi_chunk_plaintext_round_trips() {
        let data: Vec<u8> = (0..(CHUNK_SIZE * 2 + 12345)).map(|i| (i % 251) as u8).collect();
        assert_eq!(round_trip(&data), data);
    }

    #[test]
    fn tampered_tag_fails_to_decrypt() {
        let key = [5u8; 32];
        let mut sealed = Vec::new();
        {
            let mut w = StreamWriter::new(&mut sealed, key);
            w.write_all(b"hello, world").unwrap();
            w.finish().unwrap();
        }
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        let mut r = StreamReader::new(Cursor::new(sealed), key);
        let mut out = Vec::new();
        assert!(r.read_to_end(&mut out).is_err());
    }

    #[test]
    fn truncated_stream_fails() {
        let key = [5u8; 32];
        let mut sealed = Vec::new();
        {
            let mut w = StreamWriter::new(&mut sealed, key);
            w.write_all(&vec![0u8; CHUNK_SIZE + 10]).unwrap();
            w.finish().unwrap();
        }
        // Drop the final (last-chunk) frame entirely.
        sealed.truncate(CHUNK_SIZE + TAG_LEN);
        let mut r = StreamReader::new(Cursor::new(sealed), key);
        let mut out = Vec::new();
        // The first frame alone now looks like a complete, final chunk to
        // the reader (no lookahead byte available), so it decrypts
        // successfully under the last-chunk nonce — but that's the wrong
        // nonce for data that was actually sealed as non-final, so
        // authentication fails.
        assert!(r.read_to_end(&mut out).is_err());
    }
}
