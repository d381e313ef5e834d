//! # ccbs
//!
//! Runs one cut-and-choose issuance end to end: generates an issuer key,
//! blinds one candidate credential per identity, answers the issuer's
//! challenge and prints the unblinded signature.

use anyhow::Context;
use ccbs::{Identity, Issuer, ProtocolConfig, Requester, RsaBlind};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Obtain a blind signature on one of K candidate credentials.
#[derive(Parser, Debug)]
#[command(name = "ccbs", version, about)]
struct Cli {
    /// JSON protocol configuration (batch_size, key_bits, template).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Candidates per batch; overrides the configuration file.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Issuer RSA modulus size in bits; overrides the configuration file.
    #[arg(long)]
    key_bits: Option<usize>,

    /// Identity labels, one per candidate. Defaults to "Agent A", "Agent B", ...
    identities: Vec<String>,
}

fn default_identities(k: usize) -> Vec<String> {
    (0..k)
        .map(|i| match u8::try_from(i) {
            Ok(i) if i < 26 => format!("Agent {}", (b'A' + i) as char),
            _ => format!("Agent {}", i + 1),
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ProtocolConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ProtocolConfig::default(),
    };
    if let Some(k) = cli.batch_size {
        config.batch_size = k;
    }
    if let Some(bits) = cli.key_bits {
        config.key_bits = bits;
    }
    config.validate().context("invalid configuration")?;

    let labels = if cli.identities.is_empty() {
        default_identities(config.batch_size)
    } else {
        cli.identities
    };
    let identities = labels
        .into_iter()
        .map(Identity::new)
        .collect::<Result<Vec<_>, _>>()
        .context("parsing identities")?;

    let issuer = Issuer::new(RsaBlind, &config).context("generating issuer key")?;
    let requester = Requester::for_issuer(&issuer);

    let issued = requester
        .request(&issuer, &identities)
        .map_err(|e| {
            let stage = e.stage();
            anyhow::Error::new(e).context(stage)
        })?;

    println!("issuer selected candidate {}", issued.selected_index);
    println!("identity:  {}", issued.identity);
    println!("document:  {}", issued.document);
    println!("signature: {:x}", issued.signature.inner());
    Ok(())
}
