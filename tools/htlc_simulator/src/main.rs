use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use htlc_simulator::{
    compute_hashlock_hex, verify_hashlock, ProviderBehavior, SimulatedChain, SimulatedLedger,
    SimulatedProvider,
};
use swap_coordinator::{
    select_best, Address, Chain, ChainAdapters, CoordinatorConfig, Position, ProviderRecord,
    QuoteRequest, SwapCoordinator, SwapState, TracingMetrics,
};

const GENESIS: u64 = 1_700_000_000;
const CLIENT_EVM: &str = "0x00000000000000000000000000000000000000c1";
const PROVIDER_EVM: &str = "0x00000000000000000000000000000000000000f1";
const CLIENT_TARI: &str = "client_tari_pk";
const PROVIDER_TARI: &str = "provider_tari_pk";

#[derive(Parser)]
#[command(name = "htlc-simulator", version, about = "Simulated EVM/Tari HTLC swap flow")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one eth.wei -> tari swap against simulated ledgers
    Demo(DemoArgs),
    /// Print the hashlock of a hex secret
    Hashlock {
        #[arg(long)]
        secret: String,
        /// Also check the secret against this hashlock
        #[arg(long)]
        verify: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Behavior {
    Honest,
    Reject,
    Decline,
    Stall,
}

impl From<Behavior> for ProviderBehavior {
    fn from(value: Behavior) -> Self {
        match value {
            Behavior::Honest => ProviderBehavior::Honest,
            Behavior::Reject => ProviderBehavior::RejectSwaps,
            Behavior::Decline => ProviderBehavior::DeclineLock,
            Behavior::Stall => ProviderBehavior::Stall,
        }
    }
}

#[derive(Parser)]
struct DemoArgs {
    /// Wei the client gives
    #[arg(long, default_value_t = 10)]
    amount: u128,
    #[arg(long, value_enum, default_value_t = Behavior::Honest)]
    provider: Behavior,
    /// Seconds to wait for the provider's lock
    #[arg(long, default_value_t = 2)]
    confirmation_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Demo(args) => run_demo(args).await,
        Command::Hashlock { secret, verify } => {
            let hashlock = compute_hashlock_hex(&secret)?;
            let matches = verify
                .map(|expected| verify_hashlock(&secret, &expected))
                .transpose()?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "hashlock": hashlock, "matches": matches }))?
            );
            Ok(())
        }
    }
}

async fn run_demo(args: DemoArgs) -> Result<()> {
    let evm = Arc::new(SimulatedLedger::new(Chain::Evm, GENESIS));
    let tari = Arc::new(SimulatedLedger::new(Chain::Tari, GENESIS));
    evm.fund(&Address::new(CLIENT_EVM), args.amount)?;
    tari.fund(&Address::new(PROVIDER_TARI), 1_000_000)?;

    let provider = Arc::new(
        SimulatedProvider::new(args.provider.into())
            .with_account(evm.clone(), Address::new(PROVIDER_EVM))
            .with_account(tari.clone(), Address::new(PROVIDER_TARI)),
    );
    let registry = vec![ProviderRecord {
        network_address: "http://simulated-provider.local".to_string(),
        public_key: PROVIDER_TARI.to_string(),
        positions: vec![Position {
            provided_token: "tari".into(),
            provided_token_balance: 1_000_000,
            requested_token: "eth.wei".into(),
            requested_token_balance: 100_000,
        }],
    }];
    let request = QuoteRequest {
        provided_token: "eth.wei".into(),
        provided_amount: args.amount,
        requested_token: "tari".into(),
    };
    let quote = select_best(&request, &registry).context("no simulated provider matches")?;

    let chains = ChainAdapters::new()
        .with(Arc::new(SimulatedChain::new(evm.clone(), Address::new(CLIENT_EVM))))
        .with(Arc::new(SimulatedChain::new(tari.clone(), Address::new(CLIENT_TARI))));
    let config = CoordinatorConfig {
        confirmation_timeout: Duration::from_secs(args.confirmation_timeout_secs),
        ..CoordinatorConfig::default()
    };
    let lock_duration = config.lock_duration.as_secs();
    let mut coordinator =
        SwapCoordinator::new(&quote, &chains, provider, config)?.with_metrics(TracingMetrics);

    if let Err(err) = coordinator.run().await {
        warn!(error = %err, "swap stopped");
    }
    let stuck = matches!(
        coordinator.state(),
        SwapState::SourceLocked | SwapState::Aborted { .. }
    );
    if stuck && coordinator.session().source_lock_id.is_some() {
        warn!("waiting out the source lock");
        evm.advance_clock(lock_duration)?;
        coordinator.refund_source().await?;
    }

    let output = json!({
        "session": coordinator.session(),
        "ledgers": [evm.snapshot()?, tari.snapshot()?],
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
