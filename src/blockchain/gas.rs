//! Gas price and gas limit estimation.
//!
//! # Price
//! Re-queried from the chain only when the cached value is older than the resync interval.
//! A failed re-query is an error; a stale price is never returned in its place.
//!
//! # Limit
//! ```text
//! payload with call data   → eth_estimateGas × safety factor, floored
//! no payload, history      → mean(history)   × safety factor, floored
//! no payload, no history   → default limit, floored
//! ```
//! Confirmed transactions feed their `gas_used` back into the history.

use std::sync::Arc;

use tokio::time::Instant;

use crate::blockchain::client::ChainClient;
use crate::blockchain::signer::{BudgetState, SignerContext};
use crate::blockchain::types::{
    BlockchainConfig, BlockchainError, BlockchainResult, EstimationPayload, TransactionConfig,
};
use crate::observability::metrics;

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Gas price and limit for one attempt, read under a single lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasBudget {
    pub gas_price: u128,
    pub gas_limit: u64,
}

/// Computes the gas budget attached to each submission.
#[derive(Clone)]
pub struct GasEstimator {
    client: Arc<dyn ChainClient>,
    signer: Arc<SignerContext>,
    safety_factor: f64,
    min_gas_limit: u64,
    default_gas_limit: u64,
    price_multiplier: f64,
    max_gas_price_gwei: u64,
}

impl GasEstimator {
    pub fn new(
        client: Arc<dyn ChainClient>,
        signer: Arc<SignerContext>,
        chain: &BlockchainConfig,
        config: &TransactionConfig,
    ) -> Self {
        Self {
            client,
            signer,
            safety_factor: config.gas_limit_safety_factor,
            min_gas_limit: config.min_gas_limit,
            default_gas_limit: config.default_gas_limit,
            price_multiplier: chain.gas_price_multiplier,
            max_gas_price_gwei: chain.max_gas_price_gwei,
        }
    }

    /// Gas price for the next submission, from cache while it is fresh.
    pub async fn current_gas_price(&self) -> BlockchainResult<u128> {
        let mut budget = self.signer.lock_budget().await;
        self.refresh_price(&mut budget).await
    }

    /// Gas limit for the next submission.
    ///
    /// A non-empty payload is simulated on-chain; a simulation failure is returned as an error.
    pub async fn current_gas_limit(&self, payload: Option<&EstimationPayload>) -> BlockchainResult<u64> {
        let mut budget = self.signer.lock_budget().await;
        self.compute_limit(&mut budget, payload).await
    }

    /// Price and limit together.
    ///
    /// `limit_override` replaces estimation when a retry has already raised the limit.
    pub async fn budget(
        &self,
        payload: Option<&EstimationPayload>,
        limit_override: Option<u64>,
    ) -> BlockchainResult<GasBudget> {
        let mut budget = self.signer.lock_budget().await;
        let gas_price = self.refresh_price(&mut budget).await?;
        let gas_limit = match limit_override {
            Some(limit) => {
                let limit = limit.max(self.min_gas_limit);
                budget.gas_limit = limit;
                limit
            }
            None => self.compute_limit(&mut budget, payload).await?,
        };
        Ok(GasBudget { gas_price, gas_limit })
    }

    /// Raise `limit` by the safety factor after an "out of gas" failure.
    pub async fn bump_gas_limit(&self, limit: u64) -> u64 {
        let bumped = self.scale(limit);
        let mut budget = self.signer.lock_budget().await;
        budget.gas_limit = bumped;
        metrics::record_gas_limit(bumped);
        tracing::info!(previous = limit, bumped, "Raised gas limit after out-of-gas failure");
        bumped
    }

    /// Record the gas a confirmed transaction actually used.
    pub async fn update_gas_usage_history(&self, gas_used: u64) {
        let mut budget = self.signer.lock_budget().await;
        budget.history.record(gas_used);
        tracing::debug!(gas_used, samples = budget.history.len(), "Gas usage recorded");
    }

    async fn refresh_price(&self, budget: &mut BudgetState) -> BlockchainResult<u128> {
        let now = Instant::now();
        if let Some(last) = budget.last_price_sync {
            if now.duration_since(last) < self.signer.resync_interval() {
                return Ok(budget.gas_price);
            }
        }

        let suggested = self.client.gas_price().await?;
        let suggested_gwei = suggested / WEI_PER_GWEI;
        if suggested_gwei > self.max_gas_price_gwei as u128 {
            return Err(BlockchainError::GasPriceTooHigh {
                current_gwei: u64::try_from(suggested_gwei).unwrap_or(u64::MAX),
                max_gwei: self.max_gas_price_gwei,
            });
        }

        let adjusted = (suggested as f64 * self.price_multiplier) as u128;
        budget.gas_price = adjusted;
        budget.last_price_sync = Some(now);
        metrics::record_gas_price(adjusted);
        tracing::debug!(suggested, adjusted, "Gas price resynchronized");

        Ok(adjusted)
    }

    async fn compute_limit(
        &self,
        budget: &mut BudgetState,
        payload: Option<&EstimationPayload>,
    ) -> BlockchainResult<u64> {
        let limit = match payload.filter(|p| !p.is_empty()) {
            Some(payload) => {
                let simulated = self
                    .client
                    .estimate_gas(self.signer.address(), payload)
                    .await?;
                self.scale(simulated)
            }
            None => match budget.history.mean() {
                Some(mean) => self.scale(mean),
                None => self.default_gas_limit.max(self.min_gas_limit),
            },
        };

        budget.gas_limit = limit;
        metrics::record_gas_limit(limit);
        Ok(limit)
    }

    fn scale(&self, gas: u64) -> u64 {
        let scaled = (gas as f64 * self.safety_factor).ceil() as u64;
        scaled.max(self.min_gas_limit)
    }
}

impl std::fmt::Debug for GasEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GasEstimator")
            .field("safety_factor", &self.safety_factor)
            .field("min_gas_limit", &self.min_gas_limit)
            .field("default_gas_limit", &self.default_gas_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::types::ReceiptSummary;
    use crate::blockchain::wallet::Wallet;
    use alloy::primitives::{Address, Bytes, TxHash};
    use alloy::rpc::types::TransactionRequest;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    /// Serves gas queries only.
    struct GasOracle {
        price: u128,
        price_queries: AtomicU32,
        simulated_gas: Option<u64>,
    }

    #[async_trait]
    impl ChainClient for GasOracle {
        async fn pending_nonce(&self, _address: Address) -> BlockchainResult<u64> {
            unimplemented!()
        }

        async fn gas_price(&self) -> BlockchainResult<u128> {
            self.price_queries.fetch_add(1, Ordering::SeqCst);
            Ok(self.price)
        }

        async fn estimate_gas(&self, _from: Address, _payload: &EstimationPayload) -> BlockchainResult<u64> {
            self.simulated_gas
                .ok_or_else(|| BlockchainError::Estimation("execution reverted".to_string()))
        }

        async fn call(&self, _payload: &EstimationPayload) -> BlockchainResult<Bytes> {
            unimplemented!()
        }

        async fn submit(&self, _tx: TransactionRequest) -> BlockchainResult<TxHash> {
            unimplemented!()
        }

        async fn receipt(&self, _tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>> {
            unimplemented!()
        }

        async fn block_number(&self) -> BlockchainResult<u64> {
            unimplemented!()
        }
    }

    fn estimator(oracle: Arc<GasOracle>, chain: BlockchainConfig) -> GasEstimator {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, chain.chain_id).unwrap();
        let config = TransactionConfig::default();
        let signer = Arc::new(SignerContext::new(
            wallet,
            Duration::from_secs(config.resync_interval_secs),
            config.default_gas_limit,
        ));
        GasEstimator::new(oracle, signer, &chain, &config)
    }

    fn oracle(price: u128, simulated_gas: Option<u64>) -> Arc<GasOracle> {
        Arc::new(GasOracle {
            price,
            price_queries: AtomicU32::new(0),
            simulated_gas,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_price_cached_within_window() {
        let oracle = oracle(20 * WEI_PER_GWEI, None);
        let gas = estimator(oracle.clone(), BlockchainConfig::default());

        let first = gas.current_gas_price().await.unwrap();
        let second = gas.current_gas_price().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(oracle.price_queries.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        gas.current_gas_price().await.unwrap();
        assert_eq!(oracle.price_queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_oversized_price_saturates_in_error() {
        let gas = estimator(oracle(u128::MAX, None), BlockchainConfig::default());
        match gas.current_gas_price().await {
            Err(BlockchainError::GasPriceTooHigh { current_gwei, max_gwei }) => {
                assert_eq!(current_gwei, u64::MAX);
                assert_eq!(max_gwei, 500);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_price_multiplier_and_ceiling() {
        let mut chain = BlockchainConfig::default();
        chain.gas_price_multiplier = 1.5;
        let gas = estimator(oracle(10 * WEI_PER_GWEI, None), chain.clone());
        assert_eq!(gas.current_gas_price().await.unwrap(), 15 * WEI_PER_GWEI);

        chain.max_gas_price_gwei = 5;
        let gas = estimator(oracle(10 * WEI_PER_GWEI, None), chain);
        let err = gas.current_gas_price().await.unwrap_err();
        assert!(matches!(err, BlockchainError::GasPriceTooHigh { current_gwei: 10, max_gwei: 5 }));
    }

    #[tokio::test]
    async fn test_limit_from_simulation() {
        let gas = estimator(oracle(1, Some(2_000_000)), BlockchainConfig::default());
        let payload = EstimationPayload::call(Address::ZERO, vec![0x01, 0x02]);
        assert_eq!(gas.current_gas_limit(Some(&payload)).await.unwrap(), 3_000_000);

        // Small simulations are lifted to the floor.
        let gas = estimator(oracle(1, Some(21_000)), BlockchainConfig::default());
        assert_eq!(gas.current_gas_limit(Some(&payload)).await.unwrap(), 1_000_000);
    }

    #[tokio::test]
    async fn test_simulation_failure_is_reported() {
        let gas = estimator(oracle(1, None), BlockchainConfig::default());
        let payload = EstimationPayload::deploy(vec![0x60, 0x80]);
        let err = gas.current_gas_limit(Some(&payload)).await.unwrap_err();
        assert!(matches!(err, BlockchainError::Estimation(_)));
    }

    #[tokio::test]
    async fn test_limit_fallbacks() {
        let gas = estimator(oracle(1, None), BlockchainConfig::default());

        // Empty payload behaves like no payload.
        let empty = EstimationPayload::default();
        assert_eq!(gas.current_gas_limit(Some(&empty)).await.unwrap(), 5_000_000);

        gas.update_gas_usage_history(1_000_000).await;
        gas.update_gas_usage_history(2_000_000).await;
        assert_eq!(gas.current_gas_limit(None).await.unwrap(), 2_250_000);
    }

    #[tokio::test]
    async fn test_bump_gas_limit() {
        let gas = estimator(oracle(1, None), BlockchainConfig::default());
        assert_eq!(gas.bump_gas_limit(2_000_000).await, 3_000_000);
        assert_eq!(gas.bump_gas_limit(100).await, 1_000_000);
        assert_eq!(gas.signer.current_gas_limit().await, 1_000_000);
    }
}
