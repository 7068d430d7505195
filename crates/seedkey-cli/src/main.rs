//! seedkey
//!
//! Reads a passphrase and a mnemonic from stdin and prints the BIP-32 master
//! keys and OpenSSH Ed25519 keys derived from them.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::OsRng;
use seedkey_crypto::{generate_or_use, validate_mnemonic, KeyBundle, KeyOptions, Network};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Derive wallet and SSH keys from one mnemonic
#[derive(Parser)]
#[command(name = "seedkey")]
#[command(version)]
#[command(about = "Derive BIP-32 master keys and an OpenSSH key from a BIP-39 mnemonic", long_about = None)]
struct Cli {
    /// Network for the extended key version bytes (mainnet|testnet)
    #[arg(long, default_value = "mainnet")]
    network: Network,

    /// Comment appended to the SSH keys
    #[arg(long)]
    comment: Option<String>,

    /// Entropy size when a new mnemonic is generated (128|160|192|224|256)
    #[arg(long, default_value_t = 256)]
    bits: usize,

    /// Print the result as JSON
    #[arg(long, default_value = "false")]
    json: bool,

    /// The logging level (trace|debug|info|warn|error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Cli {
    fn key_options(&self) -> KeyOptions {
        KeyOptions {
            network: self.network,
            ssh_comment: self.comment.clone(),
            entropy_bits: self.bits,
        }
    }
}

fn init_tracing(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Print `message` and read one line; end of input reads as an empty line.
fn prompt(input: &mut impl BufRead, out: &mut impl Write, message: &str) -> Result<String> {
    writeln!(out, "{message}")?;
    out.flush()?;
    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn print_bundle(out: &mut impl Write, mnemonic: &str, passphrase: &str, keys: &KeyBundle) -> Result<()> {
    writeln!(out, "Mnemonic: '{mnemonic}'")?;
    writeln!(out, "Passphrase: '{passphrase}'")?;
    writeln!(out, "Master private key:  {}", keys.master_private_key)?;
    writeln!(out, "Master public key:  {}", keys.master_public_key)?;
    writeln!(out)?;
    writeln!(out, "SSH Private Key:")?;
    writeln!(out)?;
    write!(out, "{}", keys.ssh_private_key)?;
    writeln!(out)?;
    writeln!(out, "SSH Public Key:")?;
    writeln!(out)?;
    write!(out, "{}", keys.ssh_public_key)?;
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let options = cli.key_options();
    let stdin = io::stdin();
    let mut input = stdin.lock();
    // Keep stdout clean for machine-readable output.
    let mut prompts: Box<dyn Write> = if cli.json {
        Box::new(io::stderr())
    } else {
        Box::new(io::stdout())
    };

    let passphrase = prompt(
        &mut input,
        &mut prompts,
        "Enter passphrase (or leave empty for none):",
    )?;
    let mnemonic = prompt(
        &mut input,
        &mut prompts,
        "Enter mnemonic words (or leave empty to generate):",
    )?;

    if mnemonic.trim().is_empty() {
        writeln!(prompts, "No mnemonic provided")?;
        info!(bits = options.entropy_bits, "generating new mnemonic");
    } else if let Err(e) = validate_mnemonic(&mnemonic) {
        // Still usable: any text yields a seed.
        warn!(error = %e, "mnemonic is not a valid BIP-39 sentence");
    }

    let (mnemonic, keys) = generate_or_use(&mut OsRng, &mnemonic, &passphrase, &options)
        .context("Failed to derive keys")?;
    debug!(network = %options.network, comment = ?options.ssh_comment, "derived keys");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cli.json {
        let value = serde_json::json!({
            "mnemonic": mnemonic,
            "passphrase": passphrase,
            "network": options.network,
            "keys": keys,
        });
        serde_json::to_writer_pretty(&mut out, &value)?;
        writeln!(out)?;
    } else {
        print_bundle(&mut out, &mnemonic, &passphrase, &keys)?;
    }
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    run(cli)
}
