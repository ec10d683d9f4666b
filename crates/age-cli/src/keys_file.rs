//! Recipients/identity file parsing: one Bech32 key per line, `#`-comments
//! and blank lines ignored, exactly the shape every age-family recipients
//! file (including the SSH `known_hosts`-style files the external plug-in
//! family reads) uses.

use std::fs;
use std::path::Path;

use age::recipients::x25519::X25519Identity;
use anyhow::{Context, Result};

pub fn read_nonblank_lines(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect())
}

/// The single-line `AGE-SECRET-KEY-1...` form `keygen` writes, matching
/// the format every `-i` identity file line is parsed back from.
pub fn encode_identity_line(identity: &X25519Identity) -> String {
    age::keys::encode_identity(&identity.to_bytes())
}
