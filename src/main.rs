//! Operator CLI for lottery contract administration.
//!
//! ```text
//! lottery-chain --config chain.toml status
//! lottery-chain transition-state --lottery 0x.. --state 2 --wait
//! lottery-chain set-stablecoin --coin 0x.. --name USDT --rate 100 --receiver 0x..
//! ```

use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use clap::{Parser, Subcommand};

use lottery_chain::blockchain::{ChainClient, ConfirmationStatus, SubmittedTx, Wallet};
use lottery_chain::config::loader::load_config;
use lottery_chain::lifecycle::{self, signals::spawn_signal_handler, Services, Shutdown};
use lottery_chain::lottery::{LotteryError, LotteryState, Stablecoin};
use lottery_chain::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "lottery-chain")]
#[command(about = "Submit lottery contract transactions from the admin signer", long_about = None)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Wait for the submitted transaction to confirm
    #[arg(short, long, global = true)]
    wait: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show signer nonce, gas budget and node health
    Status,
    /// Move a lottery manager to a new state
    TransitionState {
        #[arg(long)]
        lottery: Address,
        /// 0=ready 1=distribute 2=rollout 3=terminal
        #[arg(long)]
        state: u8,
    },
    /// Put a lottery into rollout and post draw results
    Draw {
        #[arg(long)]
        lottery: Address,
        #[arg(long, value_delimiter = ',', required = true)]
        results: Vec<U256>,
    },
    /// Ask the rollout contract to draw randomness for a lottery
    RequestRollout {
        #[arg(long)]
        lottery: Address,
    },
    /// Register or update a swap stablecoin on the LOT token
    SetStablecoin {
        #[arg(long)]
        coin: Address,
        #[arg(long)]
        name: String,
        #[arg(long)]
        rate: U256,
        #[arg(long)]
        receiver: Address,
    },
    /// Remove a swap stablecoin from the LOT token
    RemoveStablecoin {
        #[arg(long)]
        coin: Address,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    logging::init(&config.observability);
    tracing::info!("lottery-chain v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let wallet = Wallet::from_env(config.blockchain.chain_id)?;
    let services = lifecycle::start(&config, wallet).await?;

    let shutdown = Shutdown::new();
    let signal_task = spawn_signal_handler(shutdown.clone());
    let confirmation_timeout = Duration::from_secs(config.transactions.confirmation_timeout_secs);

    let outcome = run(&cli, &services, &shutdown, confirmation_timeout).await;
    signal_task.abort();

    if let Err(e) = outcome {
        eprintln!("Error: {}", e.user_message(config.observability.diagnostic_errors));
        std::process::exit(1);
    }
    Ok(())
}

async fn run(
    cli: &Cli,
    services: &Services,
    shutdown: &Shutdown,
    confirmation_timeout: Duration,
) -> Result<(), LotteryError> {
    let cancel = shutdown.subscribe();
    let lottery = &services.lottery;

    let submitted = match &cli.command {
        Commands::Status => return print_status(services, cli.json).await,
        Commands::TransitionState { lottery: addr, state } => {
            let state = LotteryState::try_from(*state).map_err(LotteryError::UnknownState)?;
            lottery.transition_state(&cancel, *addr, state).await?
        }
        Commands::Draw { lottery: addr, results } => {
            lottery
                .draw(&cancel, *addr, results.clone(), confirmation_timeout)
                .await?
        }
        Commands::RequestRollout { lottery: addr } => lottery.request_rollout(&cancel, *addr).await?,
        Commands::SetStablecoin {
            coin,
            name,
            rate,
            receiver,
        } => {
            let coin = Stablecoin {
                address: *coin,
                name: name.clone(),
                rate: *rate,
                receiver: *receiver,
            };
            lottery.set_stablecoin(&cancel, &coin).await?
        }
        Commands::RemoveStablecoin { coin } => lottery.remove_stablecoin(&cancel, *coin).await?,
    };

    print_submitted(&submitted, cli.json);
    if cli.wait {
        let status = lottery.confirm(&submitted, confirmation_timeout).await?;
        print_confirmation(&status, cli.json);
    }
    Ok(())
}

async fn print_status(services: &Services, json: bool) -> Result<(), LotteryError> {
    let signer = services.coordinator.signer();
    let gas = services.coordinator.gas();

    let healthy = services.client.is_healthy().await;
    let nonce = services
        .coordinator
        .client()
        .pending_nonce(signer.address())
        .await?;
    let gas_price = gas.current_gas_price().await?;
    let gas_limit = gas.current_gas_limit(None).await?;

    if json {
        let status = serde_json::json!({
            "signer": signer.address().to_string(),
            "chain_id": signer.chain_id(),
            "healthy": healthy,
            "pending_nonce": nonce,
            "gas_price_wei": gas_price.to_string(),
            "gas_limit": gas_limit,
        });
        println!("{}", status);
        return Ok(());
    }

    println!("signer:        {}", signer.address());
    println!("chain id:      {}", signer.chain_id());
    println!("healthy:       {}", healthy);
    println!("pending nonce: {}", nonce);
    println!("gas price:     {} wei", gas_price);
    println!("gas limit:     {}", gas_limit);
    Ok(())
}

fn print_submitted(tx: &SubmittedTx, json: bool) {
    if json {
        let submitted = serde_json::json!({
            "tx_hash": tx.tx_hash.to_string(),
            "nonce": tx.nonce,
            "gas_price_wei": tx.gas_price.to_string(),
            "gas_limit": tx.gas_limit,
            "attempts": tx.attempts,
        });
        println!("{}", submitted);
        return;
    }
    println!("tx hash:   {}", tx.tx_hash);
    println!("nonce:     {}", tx.nonce);
    println!("gas price: {} wei", tx.gas_price);
    println!("gas limit: {}", tx.gas_limit);
    println!("attempts:  {}", tx.attempts);
}

fn print_confirmation(status: &ConfirmationStatus, json: bool) {
    let (state, detail) = match status {
        ConfirmationStatus::Confirmed {
            block_number,
            gas_used,
        } => (
            "confirmed",
            format!("block {} (gas used {})", block_number, gas_used),
        ),
        ConfirmationStatus::Failed(reason) => ("failed", reason.clone()),
    };
    if json {
        println!("{}", serde_json::json!({ "status": state, "detail": detail }));
    } else {
        println!("{}: {}", state, detail);
    }
}
