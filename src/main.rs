//! USDM Peg Keeper
//!
//! Loads the pool registry from TOML, reads reserves over HTTP RPC and
//! reports (or executes) the correction pass for one pool version.
//!
//! Usage:
//!   peg-keeper --config keeper.toml pools
//!   peg-keeper --config keeper.toml rate --kind v2
//!   peg-keeper --config keeper.toml plan --kind v3
//!   peg-keeper --config keeper.toml correct --kind v2 --live

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use usdm_peg_keeper::chain::RpcChain;
use usdm_peg_keeper::config::{load_env, KeeperConfig};
use usdm_peg_keeper::pool::{PoolRegistry, ReserveReader};
use usdm_peg_keeper::types::{AggregateReport, CorrectionReport, PoolVersion};
use usdm_peg_keeper::PegKeeper;

#[derive(Parser)]
#[command(name = "peg-keeper", about = "Keep USDM pools in line with the market rate")]
struct Args {
    /// Keeper TOML configuration
    #[arg(short, long, env = "KEEPER_CONFIG", default_value = "config/keeper.toml")]
    config: PathBuf,

    /// .env file holding RPC_URL and PRIVATE_KEY
    #[arg(long)]
    env_file: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Deactivate a market pool (by exchange address) for this run
    #[arg(long = "deactivate", value_name = "EXCHANGE")]
    deactivate: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered pools with their resolved addresses
    Pools,
    /// Aggregate market rate for one pool version
    Rate {
        #[arg(long, default_value = "v2")]
        kind: PoolVersion,
    },
    /// Correction plan for one pool version (no transactions)
    Plan {
        #[arg(long, default_value = "v2")]
        kind: PoolVersion,
    },
    /// Run a correction pass
    Correct {
        #[arg(long, default_value = "v2")]
        kind: PoolVersion,
        /// Send transactions even if the config asks for a dry run
        #[arg(long)]
        live: bool,
    },
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs);

    info!("===========================================");
    info!("   USDM Peg Keeper");
    info!("===========================================");

    let config = KeeperConfig::load(&args.config)?;
    info!("Configuration loaded from {}", args.config.display());
    let env = load_env(args.env_file.as_deref())?;
    info!("RPC URL: {}", &env.rpc_url[..40.min(env.rpc_url.len())]);

    let operator = config.operator()?;
    let mut registry = config.build_registry()?;
    for exchange in &args.deactivate {
        let exchange: Address = exchange
            .parse()
            .with_context(|| format!("Invalid exchange address: {}", exchange))?;
        let active = registry.toggle_active(operator, exchange)?;
        if active {
            warn!("Market pool on {:?} was inactive and is now active", exchange);
        } else {
            info!("Market pool on {:?} deactivated", exchange);
        }
    }

    let url = env.rpc_url.parse().context("Invalid RPC URL")?;
    match env.private_key {
        Some(key) => {
            let signer: PrivateKeySigner = key.trim().parse().context("Invalid PRIVATE_KEY")?;
            let sender = signer.address();
            info!("Signer: {:?}", sender);
            let provider = ProviderBuilder::new()
                .wallet(EthereumWallet::from(signer))
                .connect_http(url);
            run(args.command, &config, &registry, Arc::new(provider), sender).await
        }
        None => {
            let live = matches!(args.command, Command::Correct { live: true, .. });
            if matches!(args.command, Command::Correct { .. }) && (live || !config.general.dry_run) {
                bail!("PRIVATE_KEY is required for a live correction");
            }
            let provider = ProviderBuilder::new().connect_http(url);
            // Without a key, simulate as the operator
            run(args.command, &config, &registry, Arc::new(provider), operator).await
        }
    }
}

async fn run<P: Provider + 'static>(
    command: Command,
    config: &KeeperConfig,
    registry: &PoolRegistry,
    provider: Arc<P>,
    sender: Address,
) -> Result<()> {
    let block = provider
        .get_block_number()
        .await
        .context("Failed to connect to RPC")?;
    info!("Connected! Latest block: {}", block);

    let chain = Arc::new(RpcChain::new(provider, sender));
    let mut settings = config.settings()?;

    match command {
        Command::Pools => {
            let reader = ReserveReader::new(chain);
            for (index, pool) in registry.pools().iter().enumerate() {
                let address = reader.locate(pool).await?;
                println!(
                    "#{:<3} {:<14} exchange={:?} native={:?} stable={:?} active={} pegged={} pool={}",
                    index,
                    pool.kind.to_string(),
                    pool.exchange,
                    pool.native_token,
                    pool.stable_token,
                    pool.active,
                    pool.is_pegged,
                    address.map_or_else(|| "not deployed".to_string(), |a| format!("{:?}", a)),
                );
            }
        }
        Command::Rate { kind } => {
            let keeper = PegKeeper::new(chain, settings);
            let aggregate = keeper.aggregate_rate(registry, kind).await?;
            println!("{}", serde_json::to_string_pretty(&AggregateReport::from(&aggregate))?);
        }
        Command::Plan { kind } => {
            let keeper = PegKeeper::new(chain, settings);
            let (aggregate, plan) = keeper.plan(registry, kind).await?;
            let report = CorrectionReport::new(kind, true, &aggregate, &plan, Vec::new());
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Correct { kind, live } => {
            settings.executor.dry_run = settings.executor.dry_run && !live;
            if !settings.executor.dry_run {
                warn!("LIVE correction: transactions will be sent from {:?}", sender);
            }
            let keeper = PegKeeper::new(chain, settings).with_policy(config.slippage_policy());
            let report = keeper.correct(sender, registry, kind).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
