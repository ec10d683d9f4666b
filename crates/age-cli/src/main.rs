//! A thin `age` binary: `encrypt`, `decrypt`, and `keygen` atop the `age`
//! crate. Argument parsing, passphrase prompting, recipients/identity
//! file parsing, and output-file handling all live here — none of it is
//! part of the audited cryptographic core, which only ever sees readers,
//! writers, and already-constructed `Recipient`/`Identity` values.

mod io_util;
mod keys_file;

use std::io::Write;
use std::path::PathBuf;

use age::armor::ArmoredWriter;
use age::recipients::scrypt::{ScryptIdentity, ScryptRecipient};
use age::recipients::x25519::{X25519Identity, X25519Recipient};
use age::{Decryptor, Encryptor, Identity, Recipient};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use humansize::{format_size, DECIMAL};

#[derive(Parser)]
#[command(name = "age", version, about = "Encrypt and decrypt files with the age format")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encrypt a file to one or more recipients or a passphrase.
    Encrypt {
        /// Recipient public key (age1...), may be repeated.
        #[arg(short = 'r', long = "recipient")]
        recipients: Vec<String>,

        /// File of recipient public keys, one per line (#-comments and
        /// blank lines ignored); may be repeated.
        #[arg(short = 'R', long = "recipients-file")]
        recipients_files: Vec<PathBuf>,

        /// Encrypt with a passphrase instead of public-key recipients.
        #[arg(short = 'p', long = "passphrase")]
        passphrase: bool,

        /// Wrap the output in ASCII armor.
        #[arg(short = 'a', long = "armor")]
        armor: bool,

        /// Write to this path instead of stdout.
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// Plaintext input file; defaults to stdin.
        input: Option<PathBuf>,
    },

    /// Decrypt a file with one or more identities or a passphrase.
    Decrypt {
        /// File of identities (AGE-SECRET-KEY-1...), may be repeated.
        #[arg(short = 'i', long = "identity")]
        identities: Vec<PathBuf>,

        /// Decrypt with a passphrase instead of identity files.
        #[arg(short = 'p', long = "passphrase")]
        passphrase: bool,

        /// Write to this path instead of stdout.
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// Ciphertext input file; defaults to stdin.
        input: Option<PathBuf>,
    },

    /// Generate a new X25519 identity and print it (and its recipient).
    Keygen {
        /// Write the identity to this path instead of stdout.
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Encrypt { recipients, recipients_files, passphrase, armor, output, input } => {
            run_encrypt(recipients, recipients_files, passphrase, armor, output, input)
        }
        Command::Decrypt { identities, passphrase, output, input } => run_decrypt(identities, passphrase, output, input),
        Command::Keygen { output } => run_keygen(output),
    }
}

fn run_encrypt(
    recipient_strings: Vec<String>,
    recipients_files: Vec<PathBuf>,
    use_passphrase: bool,
    armor: bool,
    output: Option<PathBuf>,
    input: Option<PathBuf>,
) -> Result<()> {
    let recipients = build_recipients(recipient_strings, recipients_files, use_passphrase)?;
    let encryptor = Encryptor::with_recipients(recipients).context("invalid recipient set")?;

    let mut reader = io_util::open_input(input.as_deref())?;
    let mut out = io_util::OutputTarget::open(output.as_deref())?;

    let bytes_written = if armor {
        let armored = ArmoredWriter::new(&mut out);
        let mut writer = encryptor.wrap_output(armored).context("failed to start encryption stream")?;
        let copied = std::io::copy(&mut reader, &mut writer).context("failed to encrypt input")?;
        let armored = writer.finish().context("failed to finalize encryption stream")?;
        armored.finish().context("failed to finalize ASCII armor")?;
        copied
    } else {
        let mut writer = encryptor.wrap_output(&mut out).context("failed to start encryption stream")?;
        let copied = std::io::copy(&mut reader, &mut writer).context("failed to encrypt input")?;
        writer.finish().context("failed to finalize encryption stream")?;
        copied
    };

    eprintln!("encrypted {} of plaintext", format_size(bytes_written, DECIMAL));
    out.persist()?;
    Ok(())
}

fn run_decrypt(
    identity_files: Vec<PathBuf>,
    use_passphrase: bool,
    output: Option<PathBuf>,
    input: Option<PathBuf>,
) -> Result<()> {
    let identities = build_identities(identity_files, use_passphrase)?;
    let decryptor = Decryptor::with_identities(identities);

    let reader = io_util::open_input(input.as_deref())?;
    let reader = io_util::detect_armor(reader)?;
    let mut out = io_util::OutputTarget::open(output.as_deref())?;

    let bytes_written = {
        let mut plaintext = decryptor
            .decrypt(reader)
            .context("failed to decrypt: no identity matched, or the header/payload was tampered with")?;
        std::io::copy(&mut plaintext, &mut out).context("failed to decrypt payload")?
    };

    eprintln!("decrypted {} of plaintext", format_size(bytes_written, DECIMAL));
    out.persist()?;
    Ok(())
}

fn run_keygen(output: Option<PathBuf>) -> Result<()> {
    let identity = X25519Identity::generate();
    let public = identity.to_public();

    let mut out = io_util::OutputTarget::open(output.as_deref())?;
    writeln!(out, "# public key: {public}")?;
    writeln!(out, "{}", keys_file::encode_identity_line(&identity))?;

    eprintln!("public key: {public}");
    out.persist()?;
    Ok(())
}

/// Build the recipient set for `encrypt`: either a single passphrase
/// recipient, or every `-r` string plus every `-R` file's lines. Per §3 a
/// `scrypt` recipient must be the only recipient, so `-p` is rejected
/// alongside any `-r`/`-R`.
fn build_recipients(
    recipient_strings: Vec<String>,
    recipients_files: Vec<PathBuf>,
    use_passphrase: bool,
) -> Result<Vec<Box<dyn Recipient>>> {
    if use_passphrase {
        if !recipient_strings.is_empty() || !recipients_files.is_empty() {
            bail!("-p/--passphrase cannot be combined with -r/-R recipients");
        }
        let passphrase = io_util::prompt_passphrase_confirmed("Passphrase")?;
        return Ok(vec![Box::new(ScryptRecipient::new(passphrase))]);
    }

    let mut recipients: Vec<Box<dyn Recipient>> = Vec::new();
    for s in recipient_strings {
        let r = X25519Recipient::parse(&s).with_context(|| format!("invalid recipient: {s}"))?;
        recipients.push(Box::new(r));
    }
    for path in recipients_files {
        for line in keys_file::read_nonblank_lines(&path)? {
            match X25519Recipient::parse(&line) {
                Ok(r) => recipients.push(Box::new(r)),
                Err(_) => eprintln!("warning: ignoring unsupported recipient in {}: {line}", path.display()),
            }
        }
    }
    if recipients.is_empty() {
        bail!("no recipients specified: pass -r, -R, or -p");
    }
    Ok(recipients)
}

/// Build the identity set for `decrypt`: either a passphrase identity
/// prompted once, or every line of every `-i` file parsed as an X25519
/// identity. Unrecognized lines (e.g. an `ssh-ed25519` key, which belongs
/// to the external SSH plug-in family) are skipped with a warning rather
/// than failing the whole file, mirroring how recipients files are
/// parsed.
fn build_identities(identity_files: Vec<PathBuf>, use_passphrase: bool) -> Result<Vec<Box<dyn Identity>>> {
    if use_passphrase {
        if !identity_files.is_empty() {
            bail!("-p/--passphrase cannot be combined with -i identities");
        }
        let passphrase = io_util::prompt_passphrase("Passphrase")?;
        return Ok(vec![Box::new(ScryptIdentity::new(passphrase))]);
    }

    let mut identities: Vec<Box<dyn Identity>> = Vec::new();
    for path in identity_files {
        for line in keys_file::read_nonblank_lines(&path)? {
            match X25519Identity::parse(&line) {
                Ok(i) => identities.push(Box::new(i)),
                Err(_) => eprintln!("warning: ignoring unsupported identity in {}", path.display()),
            }
        }
    }
    if identities.is_empty() {
        bail!("no identities specified: pass -i or -p");
    }
    Ok(identities)
}
