//! Input/output plumbing the core library deliberately has no opinion
//! about: stdin/stdout selection, the single-stdin-claim guard, ASCII
//! armor auto-detection on decrypt, atomic output-file writes, and
//! passphrase prompting.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use age::armor::ArmoredReader;
use anyhow::{bail, Context, Result};
use tempfile::NamedTempFile;

/// Guards against two inputs in the same invocation both trying to claim
/// stdin (e.g. a bare ciphertext input and `-i -` for an identity file).
/// The library itself is stateless across calls; this belongs entirely to
/// the CLI.
static STDIN_CLAIMED: AtomicBool = AtomicBool::new(false);

fn claim_stdin() -> Result<()> {
    if STDIN_CLAIMED.swap(true, Ordering::SeqCst) {
        bail!("standard input is already claimed by another input of this command");
    }
    Ok(())
}

/// Open `path` for reading, or stdin if `path` is `None` or `-`.
pub fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    let use_stdin = matches!(path, None) || path == Some(Path::new("-"));
    if use_stdin {
        claim_stdin()?;
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let path = path.expect("use_stdin is false, so a path was given");
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Peek at `reader` without consuming it; if it begins with the armor
/// `BEGIN` marker, wrap it in [`ArmoredReader`] so the orchestrator sees
/// the decoded binary stream transparently, exactly as §6 describes armor
/// as an I/O layer outside the cryptographic core.
pub fn detect_armor(mut reader: Box<dyn BufRead>) -> Result<Box<dyn BufRead>> {
    const BEGIN_MARKER: &[u8] = b"-----BEGIN AGE ENCRYPTED FILE-----";
    let buf = reader.fill_buf().context("failed to read ciphertext input")?;
    if buf.starts_with(BEGIN_MARKER) {
        Ok(Box::new(BufReader::new(ArmoredReader::new(reader))))
    } else {
        Ok(reader)
    }
}

/// Where encrypted or decrypted output goes: stdout, written directly, or
/// a named file, written to a temporary file in the same directory and
/// renamed into place only once the whole operation has succeeded — so a
/// failed or interrupted run never leaves a truncated, unauthenticated
/// file at the requested path.
pub enum OutputTarget {
    Stdout(io::Stdout),
    File(NamedTempFile, std::path::PathBuf),
}

impl OutputTarget {
    pub fn open(path: Option<&Path>) -> Result<Self> {
        match path {
            None => Ok(OutputTarget::Stdout(io::stdout())),
            Some(path) => {
                let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
                let temp = NamedTempFile::new_in(dir)
                    .with_context(|| format!("failed to create a temporary file alongside {}", path.display()))?;
                Ok(OutputTarget::File(temp, path.to_path_buf()))
            }
        }
    }

    /// Rename the temporary file into place; a no-op for stdout.
    pub fn persist(self) -> Result<()> {
        match self {
            OutputTarget::Stdout(_) => Ok(()),
            OutputTarget::File(temp, path) => {
                temp.persist(&path).with_context(|| format!("failed to write {}", path.display()))?;
                Ok(())
            }
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputTarget::Stdout(w) => w.write(buf),
            OutputTarget::File(f, _) => f.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputTarget::Stdout(w) => w.flush(),
            OutputTarget::File(f, _) => f.flush(),
        }
    }
}

/// Prompt once for a passphrase (decrypt side).
pub fn prompt_passphrase(label: &str) -> Result<String> {
    rpassword::prompt_password(format!("{label}: ")).context("failed to read passphrase from the terminal")
}

/// Prompt twice and require the two entries to match (encrypt side), the
/// same confirmation every age implementation asks for when a typo would
/// otherwise lock the author out of their own file.
pub fn prompt_passphrase_confirmed(label: &str) -> Result<String> {
    let first = prompt_passphrase(label)?;
    let second = prompt_passphrase(&format!("{label} (confirm)"))?;
    if first != second {
        bail!("the two passphrase entries did not match");
    }
    Ok(first)
}
