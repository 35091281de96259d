//! Shared utilities for integration tests.
//!
//! `MockChain` stands in for a node: it tracks accepted nonces, hands out scripted submit
//! errors, counts queries and mines every accepted transaction into the current block.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;

use lottery_chain::blockchain::{
    BlockchainConfig, BlockchainError, BlockchainResult, ChainClient, EstimationPayload,
    ReceiptSummary, SignerContext, TransactionCoordinator, TxMonitor, Wallet,
};
use lottery_chain::config::TransactionConfig;

pub const TEST_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const CHAIN_ID: u64 = 31337;
pub const GWEI: u128 = 1_000_000_000;

#[derive(Default)]
struct MockState {
    base_nonce: u64,
    accepted: BTreeSet<u64>,
    submit_errors: VecDeque<BlockchainError>,
    nonce_error: Option<String>,
    attempts: Vec<TransactionRequest>,
    submitted: Vec<TransactionRequest>,
    receipts: HashMap<TxHash, ReceiptSummary>,
    call_output: Bytes,
}

pub struct MockChain {
    state: Mutex<MockState>,
    gas_price: u128,
    price_delay: Option<Duration>,
    simulated_gas: Option<u64>,
    gas_used: AtomicU64,
    block: AtomicU64,
    /// Report the base nonce forever, as a node that never sees its own mempool would.
    lagging: bool,
    pub nonce_queries: AtomicU32,
    pub price_queries: AtomicU32,
}

impl MockChain {
    pub fn new(base_nonce: u64) -> Self {
        Self {
            state: Mutex::new(MockState {
                base_nonce,
                ..MockState::default()
            }),
            gas_price: 20 * GWEI,
            price_delay: None,
            simulated_gas: None,
            gas_used: AtomicU64::new(50_000),
            block: AtomicU64::new(100),
            lagging: false,
            nonce_queries: AtomicU32::new(0),
            price_queries: AtomicU32::new(0),
        }
    }

    pub fn lagging(mut self) -> Self {
        self.lagging = true;
        self
    }

    pub fn with_gas_price(mut self, wei: u128) -> Self {
        self.gas_price = wei;
        self
    }

    /// Delay every gas price response, as a slow node would.
    pub fn with_price_delay(mut self, delay: Duration) -> Self {
        self.price_delay = Some(delay);
        self
    }

    pub fn with_simulated_gas(mut self, gas: u64) -> Self {
        self.simulated_gas = Some(gas);
        self
    }

    /// Fail the next submissions with `errors`, in order.
    pub fn script_submit_errors(&self, errors: impl IntoIterator<Item = BlockchainError>) {
        self.state.lock().unwrap().submit_errors.extend(errors);
    }

    /// Make every pending-nonce query fail with `message`.
    pub fn fail_nonce_queries(&self, message: &str) {
        self.state.lock().unwrap().nonce_error = Some(message.to_string());
    }

    pub fn set_call_output(&self, output: impl Into<Bytes>) {
        self.state.lock().unwrap().call_output = output.into();
    }

    /// Gas used reported by receipts of transactions accepted from now on.
    pub fn set_gas_used(&self, gas_used: u64) {
        self.gas_used.store(gas_used, Ordering::SeqCst);
    }

    pub fn advance_blocks(&self, blocks: u64) {
        self.block.fetch_add(blocks, Ordering::SeqCst);
    }

    /// Every request that reached `submit`, including rejected ones.
    pub fn attempts(&self) -> Vec<TransactionRequest> {
        self.state.lock().unwrap().attempts.clone()
    }

    /// Requests the node accepted.
    pub fn submitted(&self) -> Vec<TransactionRequest> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn accepted_nonces(&self) -> Vec<u64> {
        self.state.lock().unwrap().accepted.iter().copied().collect()
    }

    fn next_pending(state: &MockState) -> u64 {
        let mut nonce = state.base_nonce;
        while state.accepted.contains(&nonce) {
            nonce += 1;
        }
        nonce
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn pending_nonce(&self, _address: Address) -> BlockchainResult<u64> {
        self.nonce_queries.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if let Some(message) = &state.nonce_error {
            return Err(BlockchainError::Rpc(message.clone()));
        }
        if self.lagging {
            return Ok(state.base_nonce);
        }
        Ok(Self::next_pending(&state))
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        self.price_queries.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.price_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.gas_price)
    }

    async fn estimate_gas(&self, _from: Address, _payload: &EstimationPayload) -> BlockchainResult<u64> {
        self.simulated_gas
            .ok_or_else(|| BlockchainError::Estimation("execution reverted".to_string()))
    }

    async fn call(&self, _payload: &EstimationPayload) -> BlockchainResult<Bytes> {
        Ok(self.state.lock().unwrap().call_output.clone())
    }

    async fn submit(&self, tx: TransactionRequest) -> BlockchainResult<TxHash> {
        let mut state = self.state.lock().unwrap();
        state.attempts.push(tx.clone());

        if let Some(error) = state.submit_errors.pop_front() {
            return Err(error);
        }

        let nonce = tx.nonce.unwrap_or_default();
        if nonce < state.base_nonce || state.accepted.contains(&nonce) {
            return Err(BlockchainError::Submission(format!(
                "nonce too low: next nonce {}, tx nonce {}",
                Self::next_pending(&state),
                nonce
            )));
        }

        state.accepted.insert(nonce);
        let tx_hash = B256::from(U256::from(nonce + 1));
        let receipt = ReceiptSummary {
            tx_hash,
            block_number: Some(self.block.load(Ordering::SeqCst)),
            gas_used: self.gas_used.load(Ordering::SeqCst),
            success: true,
        };
        state.receipts.insert(tx_hash, receipt);
        state.submitted.push(tx);
        Ok(tx_hash)
    }

    async fn receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>> {
        Ok(self.state.lock().unwrap().receipts.get(&tx_hash).copied())
    }

    async fn block_number(&self) -> BlockchainResult<u64> {
        Ok(self.block.load(Ordering::SeqCst))
    }
}

pub fn test_wallet() -> Wallet {
    Wallet::from_private_key(TEST_PRIVATE_KEY, CHAIN_ID).unwrap()
}

pub fn chain_config() -> BlockchainConfig {
    BlockchainConfig {
        chain_id: CHAIN_ID,
        confirmation_blocks: 1,
        ..BlockchainConfig::default()
    }
}

pub fn signer(config: &TransactionConfig) -> Arc<SignerContext> {
    Arc::new(SignerContext::new(
        test_wallet(),
        Duration::from_secs(config.resync_interval_secs),
        config.default_gas_limit,
    ))
}

pub fn coordinator(chain: Arc<MockChain>, config: &TransactionConfig) -> TransactionCoordinator {
    TransactionCoordinator::new(chain, signer(config), &chain_config(), config)
}

pub fn monitor(chain: Arc<MockChain>, coordinator: &TransactionCoordinator) -> TxMonitor {
    TxMonitor::new(chain, coordinator.gas().clone(), 1).with_poll_interval(Duration::from_millis(10))
}

/// Submit the request built from `params` through `chain`.
pub async fn submit_plain(
    chain: Arc<MockChain>,
    params: lottery_chain::TxParams,
) -> BlockchainResult<TxHash> {
    chain.submit(params.apply(TransactionRequest::default())).await
}
