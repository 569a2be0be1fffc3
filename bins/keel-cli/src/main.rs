//! keel-cli — offline verification and signing of Merkle envelopes.
//!
//! Every subcommand works purely from files and stdin; nothing here opens a
//! socket. Failures exit with a per-category code: 1 for I/O and usage,
//! then 2 Decode, 3 Schema, 4 Integrity, 5 Policy, 6 Crypto, 7 Input.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroize;

use keel_chain::chainfile::ChainView;
use keel_chain::checkpoint::{MAINNET_CHECKPOINT, VerifierContext};
use keel_chain::snapshot::HeaderSnapshot;
use keel_core::address::Address;
use keel_core::encoding::decode_hex_exact;
use keel_core::error::KeelError;
use keel_core::keys::SecretKey;
use keel_envelope::Envelope;
use keel_wallet::builder::FeePolicy;
use keel_wallet::session::SigningSession;

/// Offline SPV toolkit: verify Merkle envelopes and sign spends air-gapped.
#[derive(Parser)]
#[command(name = "keel-cli")]
#[command(version, about = "Verify and spend Merkle envelopes offline.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate envelope files against the checkpoint (and optional chain).
    Validate(ValidateArgs),
    /// Verify a binary header chain file.
    VerifyChain(VerifyChainArgs),
    /// Verify a signed header snapshot against a signer whitelist.
    VerifySnapshot(VerifySnapshotArgs),
    /// Build and sign a spending transaction from validated envelopes.
    Sign(SignArgs),
}

#[derive(Args)]
struct ValidateArgs {
    /// Envelope JSON files.
    #[arg(required = true)]
    envelopes: Vec<PathBuf>,

    /// Binary header chain file; when given, envelope blocks must be on it.
    #[arg(short, long)]
    chain: Option<PathBuf>,
}

#[derive(Args)]
struct VerifyChainArgs {
    /// Binary header chain file.
    chain: PathBuf,
}

#[derive(Args)]
struct VerifySnapshotArgs {
    /// Snapshot JSON file.
    snapshot: PathBuf,

    /// Allowed signer public keys (33-byte compressed hex). Repeatable.
    #[arg(short, long = "signer", required = true)]
    signers: Vec<String>,
}

#[derive(Args)]
struct SignArgs {
    /// Envelope JSON files funding the spend.
    #[arg(required = true)]
    envelopes: Vec<PathBuf>,

    /// Destination P2PKH address.
    #[arg(short, long)]
    to: String,

    /// Amount to send, in satoshis.
    #[arg(short, long)]
    amount: u64,

    /// Fee rate in satoshis per byte (default 1).
    #[arg(long, conflicts_with = "fee")]
    fee_rate: Option<u64>,

    /// Explicit total fee in satoshis.
    #[arg(long)]
    fee: Option<u64>,

    /// File holding the WIF key; prompted for interactively when absent.
    #[arg(short, long)]
    wif_file: Option<PathBuf>,

    /// Binary header chain file; when given, envelope blocks must be on it.
    #[arg(short, long)]
    chain: Option<PathBuf>,
}

enum RunError {
    Keel(KeelError),
    Other(anyhow::Error),
}

impl From<KeelError> for RunError {
    fn from(e: KeelError) -> Self {
        RunError::Keel(e)
    }
}

impl From<anyhow::Error> for RunError {
    fn from(e: anyhow::Error) -> Self {
        RunError::Other(e)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(RunError::Keel(e)) => {
            eprintln!("error[{}]: {e}", e.reason_code());
            ExitCode::from(e.kind().exit_code())
        }
        Err(RunError::Other(e)) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), RunError> {
    match cli.command {
        Commands::Validate(args) => validate(args),
        Commands::VerifyChain(args) => verify_chain(args),
        Commands::VerifySnapshot(args) => verify_snapshot(args),
        Commands::Sign(args) => sign(args),
    }
}

fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

fn load_context(chain: Option<&PathBuf>, now: u64) -> Result<VerifierContext, RunError> {
    match chain {
        None => Ok(VerifierContext::new(MAINNET_CHECKPOINT)),
        Some(path) => {
            let bytes = fs::read(path)
                .with_context(|| format!("reading chain file {}", path.display()))?;
            let view = ChainView::verify(&bytes, &MAINNET_CHECKPOINT, now)?;
            Ok(VerifierContext::with_chain(MAINNET_CHECKPOINT, view))
        }
    }
}

fn validate(args: ValidateArgs) -> Result<(), RunError> {
    let now = unix_now();
    let ctx = load_context(args.chain.as_ref(), now)?;

    for path in &args.envelopes {
        let bytes = fs::read(path)
            .with_context(|| format!("reading envelope {}", path.display()))?;
        let envelope = Envelope::parse_and_validate(&bytes, &ctx, now)?;
        println!(
            "{}: ok  txid={} vout={} satoshis={} address={}",
            path.display(),
            envelope.txid(),
            envelope.vout(),
            envelope.satoshis(),
            envelope.locked_address(),
        );
    }
    Ok(())
}

fn verify_chain(args: VerifyChainArgs) -> Result<(), RunError> {
    let now = unix_now();
    let bytes = fs::read(&args.chain)
        .with_context(|| format!("reading chain file {}", args.chain.display()))?;
    let view = ChainView::verify(&bytes, &MAINNET_CHECKPOINT, now)?;
    println!(
        "ok  anchor={} headers={} tip_height={} cumulative_work={}",
        view.anchor_hash(),
        view.len(),
        view.tip_height(),
        view.cumulative_work().to_str_radix(16),
    );
    Ok(())
}

fn verify_snapshot(args: VerifySnapshotArgs) -> Result<(), RunError> {
    let now = unix_now();
    let bytes = fs::read(&args.snapshot)
        .with_context(|| format!("reading snapshot {}", args.snapshot.display()))?;

    let mut allowed = Vec::with_capacity(args.signers.len());
    for signer in &args.signers {
        let raw = decode_hex_exact(signer, 33).map_err(KeelError::from)?;
        let mut key = [0u8; 33];
        key.copy_from_slice(&raw);
        allowed.push(key);
    }

    let snapshot = HeaderSnapshot::parse(&bytes)?;
    snapshot.verify(&allowed, now)?;
    println!(
        "ok  heights={}..={} headers={} signer={}",
        snapshot.start_height,
        snapshot.end_height,
        snapshot.headers.len(),
        keel_core::encoding::encode_hex(&snapshot.signer_pubkey),
    );
    Ok(())
}

fn sign(args: SignArgs) -> Result<(), RunError> {
    let now = unix_now();
    let ctx = load_context(args.chain.as_ref(), now)?;

    let mut raw_envelopes = Vec::with_capacity(args.envelopes.len());
    for path in &args.envelopes {
        raw_envelopes.push(
            fs::read(path).with_context(|| format!("reading envelope {}", path.display()))?,
        );
    }

    let destination = Address::decode(&args.to)?;
    let fee_policy = match (args.fee, args.fee_rate) {
        (Some(fee), _) => FeePolicy::Explicit(fee),
        (None, rate) => FeePolicy::PerByte(rate.unwrap_or(1)),
    };

    let key = read_key(args.wif_file.as_ref())?;

    let mut session = SigningSession::load(ctx, raw_envelopes);
    session.validate(now)?;
    session.compose(&key, &destination, args.amount, fee_policy)?;
    session.sign(&key)?;

    let (txid, fee, change) = {
        let signed = session
            .signed_transaction()
            .expect("signed session always holds a transaction");
        (signed.txid(), signed.fee, signed.change)
    };
    let hex = session.emit()?;

    eprintln!("txid={txid} fee={fee} change={change}");
    println!("{hex}");
    Ok(())
}

/// Read the WIF from a file or an interactive prompt, wiping the string
/// once the key is decoded.
fn read_key(wif_file: Option<&PathBuf>) -> Result<SecretKey, RunError> {
    let mut wif = match wif_file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading WIF file {}", path.display()))?,
        None => rpassword::prompt_password("WIF key: ").context("reading WIF from terminal")?,
    };
    let result = SecretKey::from_wif(wif.trim());
    wif.zeroize();
    Ok(result?)
}
