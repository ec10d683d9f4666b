//! Standalone vector-verification binary, in the shape of the teacher's
//! `verify-kat`: run a battery of scenarios against the built library and
//! fail loudly (non-zero exit, message on stderr) the moment one doesn't
//! hold. Unlike `verify-kat`, there is no third-party published KAT file to
//! load here, so every scenario below constructs its own input, derives an
//! independent expectation where one is feasible (wire-format byte shape,
//! ciphertext growth), and exercises the tamper/truncation paths `cargo
//! test` also covers — this binary exists for release checklists and CI
//! steps that want a single pass/fail command outside the test harness.

use age::recipients::scrypt::{ScryptIdentity, ScryptRecipient};
use age::recipients::x25519::X25519Identity;
use age::{DecryptError, Decryptor, Encryptor, Identity, Recipient};
use age_core::format::Header;
use anyhow::{anyhow, bail, Context, Result};
use std::io::{BufReader, Read, Write};

const CHUNK: usize = 64 * 1024;
const TAG_LEN: usize = 16;
const STREAM_NONCE_LEN: usize = 16;

fn encrypt_to(recipients: Vec<Box<dyn Recipient>>, plaintext: &[u8]) -> Result<Vec<u8>> {
    let encryptor = Encryptor::with_recipients(recipients).context("building encryptor")?;
    let mut out = Vec::new();
    let mut writer = encryptor.wrap_output(&mut out).context("starting encryption stream")?;
    writer.write_all(plaintext).context("writing plaintext")?;
    writer.finish().context("finishing encryption stream")?;
    Ok(out)
}

fn decrypt_from(identities: Vec<Box<dyn Identity>>, ciphertext: &[u8]) -> Result<Vec<u8>, DecryptError> {
    let decryptor = Decryptor::with_identities(identities);
    let mut reader = decryptor.decrypt(BufReader::new(ciphertext))?;
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    Ok(out)
}

/// Locate the byte just past the header's trailing newline by finding the
/// MAC line's `--- ` terminator; everything after that offset is opaque
/// STREAM ciphertext, not UTF-8.
fn header_length(ciphertext: &[u8]) -> Result<usize> {
    let marker = b"--- ";
    let start = ciphertext
        .windows(marker.len())
        .position(|w| w == marker)
        .ok_or_else(|| anyhow!("no MAC line found in ciphertext"))?;
    let rel_newline = ciphertext[start..]
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| anyhow!("MAC line is not newline-terminated"))?;
    Ok(start + rel_newline + 1)
}

/// Round-trips an empty plaintext through a single X25519 recipient and
/// confirms the payload is exactly one empty last-chunk frame: a 16-byte
/// STREAM nonce followed by a single 16-byte (all-tag, no-plaintext) frame.
fn scenario_x25519_empty_plaintext() -> Result<()> {
    let identity = X25519Identity::generate();
    let ciphertext = encrypt_to(vec![Box::new(identity.to_public())], b"")?;

    let header_len = header_length(&ciphertext)?;
    let payload = &ciphertext[header_len..];
    if payload.len() != STREAM_NONCE_LEN + TAG_LEN {
        bail!(
            "empty-plaintext payload length mismatch: got {}, want {}",
            payload.len(),
            STREAM_NONCE_LEN + TAG_LEN
        );
    }

    let plaintext = decrypt_from(vec![Box::new(identity)], &ciphertext).context("decrypting")?;
    if plaintext != b"" {
        bail!("empty plaintext round-trip produced non-empty output");
    }
    Ok(())
}

/// A plaintext exactly one chunk long must still produce exactly one frame
/// (the last-chunk flag, not the chunk size, ends the stream) and a
/// plaintext one byte over the boundary must split into two frames.
fn scenario_chunk_boundary_framing() -> Result<()> {
    let identity = X25519Identity::generate();

    let exact = vec![0xAAu8; CHUNK];
    let ciphertext = encrypt_to(vec![Box::new(identity.to_public())], &exact)?;
    let header_len = header_length(&ciphertext)?;
    let payload_len = ciphertext.len() - header_len;
    let want = STREAM_NONCE_LEN + CHUNK + TAG_LEN;
    if payload_len != want {
        bail!("exact-chunk payload length mismatch: got {payload_len}, want {want}");
    }
    let decrypted = decrypt_from(vec![Box::new(identity)], &ciphertext).context("decrypting exact-chunk plaintext")?;
    if decrypted != exact {
        bail!("exact-chunk round trip mismatch");
    }

    let identity = X25519Identity::generate();
    let over = vec![0xBBu8; CHUNK + 1];
    let ciphertext = encrypt_to(vec![Box::new(identity.to_public())], &over)?;
    let header_len = header_length(&ciphertext)?;
    let payload_len = ciphertext.len() - header_len;
    let want = STREAM_NONCE_LEN + (CHUNK + TAG_LEN) + (1 + TAG_LEN);
    if payload_len != want {
        bail!("over-boundary payload length mismatch: got {payload_len}, want {want}");
    }
    let decrypted = decrypt_from(vec![Box::new(identity)], &ciphertext).context("decrypting over-boundary plaintext")?;
    if decrypted != over {
        bail!("over-boundary round trip mismatch");
    }
    Ok(())
}

/// Multiple recipients produce one stanza per recipient, in call order, and
/// every one of them must independently decrypt the same file key.
fn scenario_multi_recipient_order() -> Result<()> {
    let ids: Vec<X25519Identity> = (0..4).map(|_| X25519Identity::generate()).collect();
    let recipients: Vec<Box<dyn Recipient>> = ids.iter().map(|i| Box::new(i.to_public()) as Box<dyn Recipient>).collect();
    let ciphertext = encrypt_to(recipients, b"order matters")?;

    let header = Header::read(&mut BufReader::new(&ciphertext[..])).context("reading header")?;
    if header.stanzas.len() != ids.len() {
        bail!("stanza count mismatch: got {}, want {}", header.stanzas.len(), ids.len());
    }
    if !header.stanzas.iter().all(|s| s.tag == "X25519") {
        bail!("not every stanza is tagged X25519");
    }

    for (i, id) in ids.into_iter().enumerate() {
        let plaintext = decrypt_from(vec![Box::new(id)], &ciphertext).with_context(|| format!("identity {i} failed to decrypt"))?;
        if plaintext != b"order matters" {
            bail!("identity {i} produced wrong plaintext");
        }
    }
    Ok(())
}

/// A scrypt-wrapped file decrypts under the right passphrase, is rejected
/// under the wrong one, and a forged out-of-range work factor is rejected
/// before scrypt ever runs.
fn scenario_scrypt_passphrase() -> Result<()> {
    let ciphertext = encrypt_to(vec![Box::new(ScryptRecipient::new("correct horse battery staple").with_work_factor(12))], b"vault contents")?;

    let plaintext = decrypt_from(vec![Box::new(ScryptIdentity::new("correct horse battery staple"))], &ciphertext).context("correct passphrase")?;
    if plaintext != b"vault contents" {
        bail!("scrypt round trip mismatch");
    }

    match decrypt_from(vec![Box::new(ScryptIdentity::new("wrong passphrase"))], &ciphertext) {
        Err(DecryptError::NoMatchingIdentity) => {}
        Err(other) => bail!("wrong passphrase gave unexpected error: {other:?}"),
        Ok(_) => bail!("wrong passphrase decrypted successfully"),
    }

    let header_len = header_length(&ciphertext)?;
    let header_text = std::str::from_utf8(&ciphertext[..header_len]).context("header is not valid UTF-8")?;
    let forged_header = header_text.replacen(" 12\n", " 30\n", 1);
    if forged_header == header_text {
        bail!("work factor substring not found in header; scenario is stale");
    }
    let mut forged = forged_header.into_bytes();
    forged.extend_from_slice(&ciphertext[header_len..]);

    match decrypt_from(vec![Box::new(ScryptIdentity::new("correct horse battery staple"))], &forged) {
        Err(DecryptError::ScryptWorkFactorOutOfRange) => {}
        Err(other) => bail!("forged work factor gave unexpected error: {other:?}"),
        Ok(_) => bail!("forged work factor decrypted successfully"),
    }
    Ok(())
}

/// Flipping a bit in the header MAC, or in a payload frame's tag, must
/// always surface as an authentication failure, never as corrupted
/// plaintext handed back to the caller.
fn scenario_tamper_detection() -> Result<()> {
    let identity = X25519Identity::generate();
    let mut ciphertext = encrypt_to(vec![Box::new(identity.to_public())], b"tamper the header mac")?;
    let header_len = header_length(&ciphertext)?;
    ciphertext[header_len - 2] ^= 0x01;
    match decrypt_from(vec![Box::new(identity)], &ciphertext) {
        Err(DecryptError::HeaderMacMismatch) => {}
        other => bail!("header tamper gave unexpected result: {other:?}"),
    }

    let identity = X25519Identity::generate();
    let plaintext = vec![0xCDu8; CHUNK * 2 + 500];
    let mut ciphertext = encrypt_to(vec![Box::new(identity.to_public())], &plaintext)?;
    let header_len = header_length(&ciphertext)?;
    let first_tag_end = header_len + STREAM_NONCE_LEN + CHUNK + TAG_LEN;
    ciphertext[first_tag_end - 1] ^= 0x01;
    match decrypt_from(vec![Box::new(identity)], &ciphertext) {
        Err(DecryptError::PayloadMacMismatch) => {}
        other => bail!("payload tamper gave unexpected result: {other:?}"),
    }
    Ok(())
}

/// Dropping the final frame of the stream must never decrypt to a prefix of
/// the original plaintext silently; it must either fail outright or, if
/// data happened to come back, that data must not match the original.
fn scenario_truncation_detected() -> Result<()> {
    for len in [0usize, 1, CHUNK - 1, CHUNK, CHUNK + 1, CHUNK * 2] {
        let identity = X25519Identity::generate();
        let plaintext = vec![0x11u8; len];
        let mut ciphertext = encrypt_to(vec![Box::new(identity.to_public())], &plaintext)?;
        let original_len = ciphertext.len();
        ciphertext.truncate(original_len.saturating_sub(1));

        match decrypt_from(vec![Box::new(identity)], &ciphertext) {
            Err(_) => {}
            Ok(got) if got != plaintext => {}
            Ok(_) => bail!("truncated ciphertext for len={len} decrypted to the original plaintext"),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let scenarios: &[(&str, fn() -> Result<()>)] = &[
        ("x25519 empty plaintext", scenario_x25519_empty_plaintext),
        ("chunk boundary framing", scenario_chunk_boundary_framing),
        ("multi-recipient order", scenario_multi_recipient_order),
        ("scrypt passphrase", scenario_scrypt_passphrase),
        ("tamper detection", scenario_tamper_detection),
        ("truncation detected", scenario_truncation_detected),
    ];

    for (name, run) in scenarios {
        run().with_context(|| format!("scenario failed: {name}"))?;
        println!("ok   {name}");
    }

    println!("VECTORS OK ({} scenarios)", scenarios.len());
    Ok(())
}
