//! Blockchain RPC client with timeout and error handling.
//!
//! # Responsibilities
//! - Define the `ChainClient` capability the coordinator consumes
//! - Connect to JSON-RPC endpoints (primary + read failovers)
//! - Query chain state (pending nonce, gas price, receipts, block number)
//! - Simulate calls for gas limits and execute read-only calls
//! - Sign and broadcast fully-parameterized transactions through the primary endpoint

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::types::{
    BlockchainConfig, BlockchainError, BlockchainResult, ChainId, EstimationPayload, ReceiptSummary,
};
use crate::blockchain::wallet::Wallet;
use crate::observability::metrics;

/// Read and submit access to the chain.
///
/// Every method is a network round-trip that may fail transiently.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Next nonce for `address`, counting transactions still in the mempool.
    async fn pending_nonce(&self, address: Address) -> BlockchainResult<u64>;

    /// Node-suggested gas price in wei.
    async fn gas_price(&self) -> BlockchainResult<u128>;

    /// Simulate `payload` sent from `from` and return the gas it consumes.
    async fn estimate_gas(&self, from: Address, payload: &EstimationPayload) -> BlockchainResult<u64>;

    /// Execute a read-only call against the latest state.
    async fn call(&self, payload: &EstimationPayload) -> BlockchainResult<Bytes>;

    /// Sign and broadcast a transaction whose nonce and gas fields are already set.
    async fn submit(&self, tx: TransactionRequest) -> BlockchainResult<TxHash>;

    /// Receipt for `tx_hash`, or `None` while the transaction is pending.
    async fn receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>>;

    /// Latest block number.
    async fn block_number(&self) -> BlockchainResult<u64>;
}

type DynProvider = Arc<dyn Provider + Send + Sync>;

/// Blockchain RPC client wrapper with failover support.
#[derive(Clone)]
pub struct BlockchainClient {
    /// List of providers (primary + failovers).
    providers: Vec<DynProvider>,
    /// Signs submissions; absent for read-only clients.
    wallet: Option<EthereumWallet>,
    config: BlockchainConfig,
    timeout_duration: Duration,
}

impl BlockchainClient {
    /// Create a read-only client.
    ///
    /// Succeeds even when the endpoint is unreachable; chain verification failures are logged.
    pub async fn new(config: BlockchainConfig) -> BlockchainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(Arc::new(ProviderBuilder::new().connect_http(primary_url)) as DynProvider);

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(Arc::new(ProviderBuilder::new().connect_http(url)) as DynProvider);
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        let client = Self {
            providers,
            wallet: None,
            config: config.clone(),
            timeout_duration,
        };

        match client.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    rpc_url = %config.rpc_url,
                    chain_id = config.chain_id,
                    "Blockchain client initialized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Blockchain client initialized but chain verification failed"
                );
            }
        }

        Ok(client)
    }

    /// Create a client able to submit transactions signed by `wallet`.
    pub async fn with_wallet(config: BlockchainConfig, wallet: &Wallet) -> BlockchainResult<Self> {
        if wallet.chain_id() != config.chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: config.chain_id,
                actual: wallet.chain_id(),
            });
        }
        let mut client = Self::new(config).await?;
        client.wallet = Some(wallet.ethereum_wallet());
        Ok(client)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> BlockchainResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id.0 != self.config.chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: self.config.chain_id,
                actual: chain_id.0,
            });
        }
        Ok(())
    }

    /// Get the chain ID from the RPC.
    pub async fn get_chain_id(&self) -> BlockchainResult<ChainId> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_chain_id()).await {
                Ok(Ok(result)) => return Ok(ChainId(result)),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, error = %e, "RPC error, trying next provider");
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, "RPC timeout, trying next provider");
                }
            }
        }
        Err(BlockchainError::Rpc("All RPC providers failed".to_string()))
    }

    /// Check if the blockchain is reachable and healthy.
    pub async fn is_healthy(&self) -> bool {
        let healthy = self.block_number().await.is_ok();
        metrics::record_rpc_health(healthy);
        healthy
    }

    /// Get the configuration.
    pub fn config(&self) -> &BlockchainConfig {
        &self.config
    }

    /// Get the number of confirmation blocks required.
    pub fn confirmation_blocks(&self) -> u32 {
        self.config.confirmation_blocks
    }

    fn primary(&self) -> &(dyn Provider + Send + Sync) {
        self.providers[0].as_ref()
    }
}

#[async_trait]
impl ChainClient for BlockchainClient {
    async fn pending_nonce(&self, address: Address) -> BlockchainResult<u64> {
        // Failovers may lag behind the primary's mempool, so nonce reads stay on the primary.
        match timeout(
            self.timeout_duration,
            self.primary().get_transaction_count(address).pending(),
        )
        .await
        {
            Ok(Ok(nonce)) => Ok(nonce),
            Ok(Err(e)) => Err(BlockchainError::Rpc(format!("Failed to get pending nonce: {}", e))),
            Err(_) => Err(BlockchainError::Timeout(self.config.rpc_timeout_secs)),
        }
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_gas_price()).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(BlockchainError::Rpc("All providers failed to get gas price".to_string()))
    }

    async fn estimate_gas(&self, from: Address, payload: &EstimationPayload) -> BlockchainResult<u64> {
        let request = payload.to_request(from);
        // A revert is a property of the call, not the endpoint: no failover here.
        match timeout(self.timeout_duration, self.primary().estimate_gas(request)).await {
            Ok(Ok(gas)) => Ok(gas),
            Ok(Err(e)) => Err(BlockchainError::Estimation(e.to_string())),
            Err(_) => Err(BlockchainError::Timeout(self.config.rpc_timeout_secs)),
        }
    }

    async fn call(&self, payload: &EstimationPayload) -> BlockchainResult<Bytes> {
        let request = payload.to_request(Address::ZERO);
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.call(request.clone())).await {
                Ok(Ok(output)) => return Ok(output),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(BlockchainError::Rpc("All providers failed to execute call".to_string()))
    }

    async fn submit(&self, tx: TransactionRequest) -> BlockchainResult<TxHash> {
        let wallet = self
            .wallet
            .as_ref()
            .ok_or_else(|| BlockchainError::NotAvailable("client has no signing wallet".to_string()))?;

        let envelope = tx
            .build(wallet)
            .await
            .map_err(|e| BlockchainError::Wallet(format!("Failed to sign transaction: {}", e)))?;
        let raw = envelope.encoded_2718();

        match timeout(self.timeout_duration, self.primary().send_raw_transaction(&raw)).await {
            Ok(Ok(pending)) => Ok(*pending.tx_hash()),
            Ok(Err(e)) => Err(BlockchainError::Submission(e.to_string())),
            Err(_) => Err(BlockchainError::Timeout(self.config.rpc_timeout_secs)),
        }
    }

    async fn receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_transaction_receipt(tx_hash)).await {
                Ok(Ok(result)) => {
                    return Ok(result.map(|receipt| ReceiptSummary {
                        tx_hash: receipt.transaction_hash,
                        block_number: receipt.block_number,
                        gas_used: receipt.gas_used,
                        success: receipt.status(),
                    }));
                }
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(BlockchainError::Rpc("All providers failed to get receipt".to_string()))
    }

    async fn block_number(&self) -> BlockchainResult<u64> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_block_number()).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        Err(BlockchainError::Rpc("All providers failed to get block number".to_string()))
    }
}

impl std::fmt::Debug for BlockchainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .field("can_submit", &self.wallet.is_some())
            .finish()
    }
}
