use anyhow::{bail, Context};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use crate::{builder::QuoterBuilder, config::QuoterConfig};

/// Stablehop quoter - prices a cross-chain stablecoin transfer
///
/// Fetches DEX, gas, fee, price, timing, bridge and volatility data concurrently and prints one
/// quote as JSON on stdout. Logs go to stderr.
#[derive(Parser, Debug, Clone, PartialEq)]
#[clap(version = env!("CARGO_PKG_VERSION"))]
struct CliArgs {
    /// Path to the YAML config. Built-in mainnet defaults are used when omitted.
    #[clap(long, env = "STABLEHOP_CONFIG")]
    config: Option<String>,

    /// Amount of the source stablecoin to transfer, in whole units. Example: 1000.5
    #[clap(long)]
    amount: f64,

    /// Overrides the configured slippage tolerance, in basis points.
    #[clap(long)]
    slippage_bps: Option<u32>,

    /// Emit debug logs, including per source timings. RUST_LOG takes precedence.
    #[clap(long)]
    verbose: bool,
}

impl CliArgs {
    fn validate(&self) -> anyhow::Result<()> {
        if !(self.amount.is_finite() && self.amount > 0.0) {
            bail!("--amount must be a positive number, got {}", self.amount);
        }
        if let Some(bps) = self.slippage_bps {
            if bps > 10_000 {
                bail!("--slippage-bps must not exceed 10000, got {bps}");
            }
        }
        Ok(())
    }

    fn load_config(&self) -> anyhow::Result<QuoterConfig> {
        let mut config = match &self.config {
            Some(path) => QuoterConfig::from_yaml(path)
                .with_context(|| format!("Failed to load config from {path}"))?,
            None => QuoterConfig::default(),
        };
        if let Some(bps) = self.slippage_bps {
            config.parameters.slippage_bps = bps;
        }
        Ok(config)
    }
}

pub async fn run_cli() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    args.validate()?;

    let log_level = if args.verbose { "debug" } else { "info" };
    let format = fmt::format()
        .with_level(true)
        .with_target(false)
        .compact();
    let subscriber = tracing_subscriber::fmt()
        .event_format(format)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set up logging subscriber")?;

    let config = args.load_config()?;
    debug!(?config.endpoints, ?config.cache, ?config.timeouts, "ConfigLoaded");

    let aggregator = QuoterBuilder::new(config)
        .build()
        .context("Failed to set up quote sources")?;
    let quote = aggregator
        .compute_quote(args.amount)
        .await
        .with_context(|| format!("Failed to quote {} units", args.amount))?;
    info!(quoted_at = %quote.quoted_at, "QuoteReady");

    let rendered = serde_json::to_string_pretty(&quote).context("Failed to serialize quote")?;
    println!("{rendered}");
    Ok(())
}
