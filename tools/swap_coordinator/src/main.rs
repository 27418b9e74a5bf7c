use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use swap_coordinator::crypto::{self, parse_hex32};
use swap_coordinator::{
    find_best_quote, CoordinatorConfig, JsonFileRegistry, Preimage, QuoteRequest, TokenId,
};

#[derive(Parser)]
#[command(name = "swap-coordinator", version, about = "HTLC swap client utilities")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find the best provider quote for a trade
    Quote(QuoteArgs),
    /// Generate or check hashlocks
    #[command(subcommand)]
    Hashlock(HashlockCommand),
    /// Print the effective coordinator configuration
    Config,
}

#[derive(Parser)]
struct QuoteArgs {
    /// JSON file holding an array of provider records
    #[arg(long)]
    registry: PathBuf,
    /// Token to give, e.g. eth.wei
    #[arg(long)]
    provide: String,
    /// Amount to give in the token's smallest unit
    #[arg(long)]
    amount: u128,
    /// Token to receive, e.g. tari
    #[arg(long)]
    want: String,
}

#[derive(Subcommand)]
enum HashlockCommand {
    /// Draw a fresh secret and print it with its hashlock
    Generate,
    /// Print the hashlock of a hex secret
    Commit {
        #[arg(long)]
        secret: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Quote(args) => run_quote(args).await,
        Command::Hashlock(command) => run_hashlock(command),
        Command::Config => run_config(),
    }
}

async fn run_quote(args: QuoteArgs) -> Result<()> {
    let registry = JsonFileRegistry::new(&args.registry);
    let request = QuoteRequest {
        provided_token: TokenId::new(args.provide),
        provided_amount: args.amount,
        requested_token: TokenId::new(args.want),
    };
    let quote = find_best_quote(&registry, &request)
        .await
        .with_context(|| format!("quote from {}", args.registry.display()))?;
    println!("{}", serde_json::to_string_pretty(&quote)?);
    Ok(())
}

fn run_hashlock(command: HashlockCommand) -> Result<()> {
    let output = match command {
        HashlockCommand::Generate => {
            let commitment = crypto::generate()?;
            json!({
                "secret": commitment.preimage().to_hex(),
                "hashlock": commitment.hashlock().to_string(),
            })
        }
        HashlockCommand::Commit { secret } => {
            let preimage = Preimage::from_bytes(parse_hex32(&secret).context("parse secret")?);
            json!({ "hashlock": crypto::commit(&preimage).to_string() })
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_config() -> Result<()> {
    let config = CoordinatorConfig::from_env();
    config.validate().context("invalid coordinator configuration")?;
    let output = json!({
        "lock_duration_secs": config.lock_duration.as_secs(),
        "expected_round_trip_secs": config.expected_round_trip.as_secs(),
        "confirmation_timeout_secs": config.confirmation_timeout.as_secs(),
        "provider_rpc": {
            "timeout_ms": config.retry.timeout.as_millis() as u64,
            "max_retries": config.retry.max_retries,
            "base_delay_ms": config.retry.base_delay.as_millis() as u64,
            "max_delay_ms": config.retry.max_delay.as_millis() as u64,
            "jitter_ms": config.retry.jitter_ms,
        },
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
