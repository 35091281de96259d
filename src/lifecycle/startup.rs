//! Startup orchestration.
//!
//! # Responsibilities
//! - Connect to the chain with the admin key and verify the chain ID
//! - Create the signer context once connectivity is established
//! - Wire the coordinator, confirmation monitor and lottery operations
//!
//! # Design Decisions
//! - Fail fast: a chain ID mismatch or unreachable node is fatal
//! - Subsystems initialize in order, not concurrently

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::blockchain::{
    BlockchainClient, BlockchainError, ChainClient, SignerContext, TransactionCoordinator,
    TxMonitor, Wallet,
};
use crate::config::AppConfig;
use crate::lottery::{LotteryError, LotteryOperations};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Chain setup failed: {0}")]
    Chain(#[from] BlockchainError),

    #[error("Lottery setup failed: {0}")]
    Lottery(#[from] LotteryError),
}

/// Everything a caller needs to drive lottery transactions.
#[derive(Clone)]
pub struct Services {
    pub client: Arc<BlockchainClient>,
    pub coordinator: TransactionCoordinator,
    pub monitor: TxMonitor,
    pub lottery: LotteryOperations,
}

/// Build the service graph for `wallet` against the configured node.
pub async fn start(config: &AppConfig, wallet: Wallet) -> Result<Services, StartupError> {
    let client = BlockchainClient::with_wallet(config.blockchain.clone(), &wallet).await?;
    client.verify_chain_id().await?;
    let client = Arc::new(client);

    let signer = Arc::new(SignerContext::new(
        wallet,
        Duration::from_secs(config.transactions.resync_interval_secs),
        config.transactions.default_gas_limit,
    ));
    tracing::info!(
        signer = %signer.address(),
        chain_id = signer.chain_id(),
        resync_interval_secs = config.transactions.resync_interval_secs,
        "Signer context ready"
    );

    let chain: Arc<dyn ChainClient> = client.clone();
    let coordinator = TransactionCoordinator::new(
        chain.clone(),
        signer,
        &config.blockchain,
        &config.transactions,
    );
    let monitor = TxMonitor::new(chain, coordinator.gas().clone(), client.confirmation_blocks());
    let lottery = LotteryOperations::new(coordinator.clone(), monitor.clone(), &config.lottery)?
        .with_simulation(config.lottery.simulate_gas_limits);

    Ok(Services {
        client,
        coordinator,
        monitor,
        lottery,
    })
}
