//! Cross-cutting round-trip, tamper-evidence, and chunk-boundary
//! properties (spec §8) that need a full `Encryptor`/`Decryptor` pair
//! rather than a single module in isolation.

use age::recipients::scrypt::{ScryptIdentity, ScryptRecipient};
use age::recipients::x25519::X25519Identity;
use age::{DecryptError, Decryptor, Encryptor, Identity, Recipient};
use std::io::{BufReader, Read, Write};

const CHUNK: usize = 64 * 1024;

fn encrypt_to(recipients: Vec<Box<dyn Recipient>>, plaintext: &[u8]) -> Vec<u8> {
    let encryptor = Encryptor::with_recipients(recipients).unwrap();
    let mut out = Vec::new();
    let mut writer = encryptor.wrap_output(&mut out).unwrap();
    writer.write_all(plaintext).unwrap();
    writer.finish().unwrap();
    out
}

fn decrypt_from(identities: Vec<Box<dyn Identity>>, ciphertext: &[u8]) -> Result<Vec<u8>, DecryptError> {
    let decryptor = Decryptor::with_identities(identities);
    let mut reader = decryptor.decrypt(BufReader::new(ciphertext))?;
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    Ok(out)
}

#[test]
fn scenario_1_empty_plaintext_to_one_x25519_recipient() {
    let identity = X25519Identity::generate();
    let ciphertext = encrypt_to(vec![Box::new(identity.to_public())], b"");
    let plaintext = decrypt_from(vec![Box::new(identity)], &ciphertext).unwrap();
    assert_eq!(plaintext, b"");
}

#[test]
fn scenario_2_exact_chunk_plaintext_is_one_last_chunk_frame() {
    let identity = X25519Identity::generate();
    let plaintext = vec![0u8; CHUNK];
    let ciphertext = encrypt_to(vec![Box::new(identity.to_public())], &plaintext);

    let payload = &ciphertext[ciphertext.len() - (CHUNK + 16)..];
    assert_eq!(payload.len(), CHUNK + 16);

    let decrypted = decrypt_from(vec![Box::new(identity)], &ciphertext).unwrap();
    assert_eq!(decrypted, plaintext);
}

#[test]
fn scenario_3_one_byte_over_chunk_boundary_is_two_frames() {
    let identity = X25519Identity::generate();
    let plaintext = vec![0u8; CHUNK + 1];
    let ciphertext = encrypt_to(vec![Box::new(identity.to_public())], &plaintext);

    // header+nonce, then a full (CHUNK+16) non-last frame, then a (1+16) last frame.
    let payload_len_expected = (CHUNK + 16) + (1 + 16);
    let tail = &ciphertext[ciphertext.len() - payload_len_expected..];
    assert_eq!(tail.len(), payload_len_expected);

    let decrypted = decrypt_from(vec![Box::new(identity)], &ciphertext).unwrap();
    assert_eq!(decrypted, plaintext);
}

#[test]
fn scenario_4_two_recipients_preserve_order_either_identity_decrypts() {
    let id1 = X25519Identity::generate();
    let id2 = X25519Identity::generate();
    let recipients: Vec<Box<dyn Recipient>> = vec![Box::new(id1.to_public()), Box::new(id2.to_public())];
    let ciphertext = encrypt_to(recipients, b"shared secret");

    assert_eq!(decrypt_from(vec![Box::new(id1)], &ciphertext).unwrap(), b"shared secret");
    assert_eq!(decrypt_from(vec![Box::new(id2)], &ciphertext).unwrap(), b"shared secret");
}

#[test]
fn scenario_5_scrypt_correct_and_wrong_passphrase_and_forged_work_factor() {
    let ciphertext = encrypt_to(
        vec![Box::new(ScryptRecipient::new("trebuchet").with_work_factor(14))],
        b"passphrase protected payload",
    );

    assert_eq!(
        decrypt_from(vec![Box::new(ScryptIdentity::new("trebuchet"))], &ciphertext).unwrap(),
        b"passphrase protected payload"
    );

    let wrong = decrypt_from(vec![Box::new(ScryptIdentity::new("wrong passphrase"))], &ciphertext).unwrap_err();
    assert!(matches!(wrong, DecryptError::NoMatchingIdentity));

    // Forge the work factor in the stanza line to something out of range
    // and confirm decrypt rejects it without ever running scrypt. Only the
    // header (up to and including its trailing newline) is valid UTF-8;
    // the STREAM payload that follows is opaque binary and must be left
    // untouched.
    let header_len = header_length(&ciphertext);
    let header_text = std::str::from_utf8(&ciphertext[..header_len]).unwrap();
    let forged_header = header_text.replacen(" 14\n", " 30\n", 1);
    assert_ne!(forged_header, header_text, "work factor must appear verbatim in the stanza line");
    let mut forged = forged_header.into_bytes();
    forged.extend_from_slice(&ciphertext[header_len..]);

    let err = decrypt_from(vec![Box::new(ScryptIdentity::new("trebuchet"))], &forged).unwrap_err();
    assert!(matches!(err, DecryptError::ScryptWorkFactorOutOfRange));
}

#[test]
fn scenario_6_bit_flip_in_header_mac_fails() {
    let identity = X25519Identity::generate();
    let ciphertext = encrypt_to(vec![Box::new(identity.to_public())], b"tamper the header mac");

    let mut tampered = ciphertext;
    let header_len = header_length(&tampered);
    // Flip the byte just before the payload starts: the last character of
    // the MAC line's base64 body.
    tampered[header_len - 2] ^= 0x01;

    let err = decrypt_from(vec![Box::new(identity)], &tampered).unwrap_err();
    assert!(matches!(err, DecryptError::HeaderMacMismatch));
}

#[test]
fn scenario_6_bit_flip_in_middle_chunk_tag_fails() {
    let identity = X25519Identity::generate();
    let plaintext = vec![0xCDu8; CHUNK * 2 + 500];
    let ciphertext = encrypt_to(vec![Box::new(identity.to_public())], &plaintext);

    let header_len = header_length(&ciphertext);
    let payload_start = header_len + 16; // skip the STREAM nonce
    let mut tampered = ciphertext;
    // Flip the last byte of the first frame's tag (the middle of the
    // whole ciphertext, well before the final frame).
    let first_tag_end = payload_start + CHUNK + 16;
    tampered[first_tag_end - 1] ^= 0x01;

    let err = decrypt_from(vec![Box::new(identity)], &tampered).unwrap_err();
    assert!(matches!(err, DecryptError::PayloadMacMismatch));
}

/// Finds the byte offset just past the header's trailing newline (i.e.
/// where the 16-byte STREAM nonce begins), by locating the `--- ` MAC
/// terminator line and its following newline. Operates on raw bytes since
/// everything after the header is opaque binary ciphertext, not UTF-8.
fn header_length(ciphertext: &[u8]) -> usize {
    let marker = b"--- ";
    let start = ciphertext
        .windows(marker.len())
        .position(|w| w == marker)
        .expect("ciphertext must contain a MAC line");
    let rel_newline = ciphertext[start..]
        .iter()
        .position(|&b| b == b'\n')
        .expect("MAC line must be newline-terminated");
    start + rel_newline + 1
}

#[test]
fn truncation_is_detected_at_several_plaintext_lengths() {
    for len in [0usize, 1, CHUNK - 1, CHUNK, CHUNK + 1, CHUNK * 2] {
        let identity = X25519Identity::generate();
        let plaintext = vec![0x11u8; len];
        let mut ciphertext = encrypt_to(vec![Box::new(identity.to_public())], &plaintext);

        // Drop the final frame entirely: the result must never be
        // interpreted as successful, complete decryption.
        let original_len = ciphertext.len();
        ciphertext.truncate(original_len.saturating_sub(1));

        let result = decrypt_from(vec![Box::new(identity)], &ciphertext);
        match result {
            Err(_) => {}
            Ok(plaintext_out) => assert_ne!(
                plaintext_out, plaintext,
                "truncated ciphertext for len={len} must not decrypt to the original plaintext"
            ),
        }
    }
}

#[test]
fn order_preservation_across_three_recipients() {
    use age_core::format::Header;
    use std::io::BufReader as CoreBufReader;

    let ids: Vec<X25519Identity> = (0..3).map(|_| X25519Identity::generate()).collect();
    let expected_ephemeral_count = ids.len();
    let recipients: Vec<Box<dyn Recipient>> = ids.iter().map(|i| Box::new(i.to_public()) as Box<dyn Recipient>).collect();

    let ciphertext = encrypt_to(recipients, b"order matters");

    let header = Header::read(&mut CoreBufReader::new(&ciphertext[..])).unwrap();
    assert_eq!(header.stanzas.len(), expected_ephemeral_count);
    assert!(header.stanzas.iter().all(|s| s.tag == "X25519"), "all three stanzas must be X25519");

    for id in ids {
        assert_eq!(decrypt_from(vec![Box::new(id)], &ciphertext).unwrap(), b"order matters");
    }
}
