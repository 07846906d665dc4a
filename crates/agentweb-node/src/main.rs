//! agentweb - AgentWeb protocol node
//!
//! Runs the expiry sweeper over a configured node, and offers a few
//! offline helpers for pricing and fee arithmetic.

use agentweb_core::{Address, Amount, AssetId, Keypair, PricingPolicy, ReputationScore};
use agentweb_escrow::split_fee;
use agentweb_ledger::{LedgerClient, SimulatedLedger, Transfer};
use agentweb_node::{run_sweeper, NodeConfig, Protocol};
use agentweb_registry::{
    AgentRegistration, HeaderOwnershipVerifier, StaticOwnershipVerifier, WebsiteRegistration,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "agentweb")]
#[command(about = "AgentWeb protocol node")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node until interrupted
    Run {
        /// Path to config file
        #[arg(short, long, default_value = "agentweb.toml", env = "AGENTWEB_CONFIG")]
        config: PathBuf,
    },

    /// Generate a sample config file
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = "agentweb.toml")]
        output: PathBuf,
    },

    /// Quote the price of one access
    Price {
        /// Website reputation (0-1000)
        #[arg(long, default_value_t = 100)]
        reputation: u16,

        /// Website average payment, in micro-units
        #[arg(long, default_value_t = 5_000)]
        avg_payment: u64,

        /// Content descriptor to classify
        #[arg(long, default_value = "")]
        content: String,
    },

    /// Show the platform fee split for an amount
    Split {
        /// Amount in micro-units
        #[arg(long)]
        amount: u64,

        /// Platform fee in basis points
        #[arg(long, default_value_t = 100)]
        fee_bps: u32,
    },

    /// Walk one payment through a simulated ledger
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("agentweb=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            run_node(config).await?;
        }

        Commands::InitConfig { output } => {
            init_config(output)?;
        }

        Commands::Price {
            reputation,
            avg_payment,
            content,
        } => {
            quote(reputation, avg_payment, &content)?;
        }

        Commands::Split { amount, fee_bps } => {
            show_split(amount, fee_bps);
        }

        Commands::Demo => {
            demo().await?;
        }
    }

    Ok(())
}

async fn run_node(config_path: PathBuf) -> anyhow::Result<()> {
    info!(config = %config_path.display(), "starting agentweb node");

    let config = NodeConfig::from_file(&config_path)?;
    info!(
        name = %config.name,
        network = ?config.network,
        fee_bps = config.escrow.fee_basis_points,
        "loaded config"
    );

    let verifier = HeaderOwnershipVerifier::new(&config.registry)?;
    let ledger = Arc::new(SimulatedLedger::new(config.network));
    let protocol = Arc::new(Protocol::from_config(&config, ledger, verifier)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = tokio::spawn(run_sweeper(
        Arc::clone(&protocol),
        Duration::from_secs(config.escrow.sweep_interval_secs),
        shutdown_rx,
    ));

    tokio::signal::ctrl_c().await?;
    info!("interrupt received");
    shutdown_tx.send(true)?;

    match sweeper.await {
        Ok(expired) => info!(expired, "node stopped"),
        Err(e) => error!(error = %e, "sweeper task failed"),
    }

    let stuck = protocol.escrow().needing_reconciliation();
    if !stuck.is_empty() {
        error!(count = stuck.len(), "sessions need manual reconciliation");
    }

    Ok(())
}

fn init_config(output: PathBuf) -> anyhow::Result<()> {
    let config = NodeConfig::default();
    std::fs::write(&output, config.to_toml()?)?;

    println!("Config written to {}", output.display());
    println!();
    println!("Set registry.admin and escrow.platform_address, then run:");
    println!("  agentweb run --config {}", output.display());

    Ok(())
}

fn quote(reputation: u16, avg_payment: u64, content: &str) -> anyhow::Result<()> {
    let policy = PricingPolicy::default();
    let reputation = ReputationScore::new(reputation)?;
    let class = policy.classify(content);
    let price = policy.price_for(reputation, Amount::from_micro(avg_payment), content);

    println!("Class: {class:?}");
    println!("Price: {price} ({} micro)", price.as_micro());

    Ok(())
}

fn show_split(amount: u64, fee_bps: u32) {
    let split = split_fee(Amount::from_micro(amount), fee_bps);

    println!("Website: {} micro", split.website_share.as_micro());
    println!("Platform: {} micro", split.platform_fee.as_micro());
}

async fn demo() -> anyhow::Result<()> {
    const ASSET: AssetId = AssetId::NATIVE;
    const DOMAIN: &str = "news.example.com";

    let admin = Keypair::generate().address();
    let mut config = NodeConfig::default();
    config.registry = config.registry.with_admin(admin);
    config.escrow = config
        .escrow
        .with_platform_address(Keypair::generate().address());

    let ledger = Arc::new(SimulatedLedger::testnet().with_confirm_after_polls(2));
    let verifier = StaticOwnershipVerifier::new();
    verifier.allow(DOMAIN, "demo-token");
    let protocol = Protocol::from_config(&config, Arc::clone(&ledger), verifier)?;

    let agent = Keypair::generate();
    ledger.fund(&agent.address(), ASSET, Amount::from_units(1))?;
    protocol.register_agent(AgentRegistration::new(
        "demo-agent",
        agent.public_key(),
        agent.sign_registration("demo-agent"),
    ))?;

    let owner: Address = Keypair::generate().address();
    let website = protocol
        .register_website(WebsiteRegistration::new(DOMAIN, owner.clone(), "demo-token"))
        .await?;
    println!("Registered {} as {}", website.domain, website.alias);

    let session = protocol
        .create_priced_session("demo-agent", DOMAIN, "news article", ASSET)
        .await?;
    println!("Session {} for {}", session.id, session.amount);

    let funding = ledger
        .submit_transfer(&Transfer::new(
            agent.address(),
            session.escrow.clone(),
            session.amount,
            ASSET,
        ))
        .await?;
    protocol.mark_submitted(&session.id, funding).await?;
    protocol.confirm_and_verify(&session.id).await?;
    let settled = protocol.settle(&session.id).await?;

    println!("Settled in {settled}");
    println!("Website received {}", ledger.balance_of(&owner, ASSET));
    println!(
        "Platform received {}",
        ledger.balance_of(&config.escrow.platform_address, ASSET)
    );

    Ok(())
}
