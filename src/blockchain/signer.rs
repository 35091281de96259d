//! Shared state of the signing account.
//!
//! One `SignerContext` exists per process and is shared by every caller through an `Arc`.
//! Its mutable fields sit behind two independent locks:
//!
//! - the sequence lock, taken by the nonce allocator around "query pending nonce, hand it out"
//! - the budget lock, taken by the gas estimator around price refreshes and limit updates
//!
//! Neither lock is held while a signed transaction is in flight.

use std::collections::VecDeque;
use std::time::Duration;

use alloy::primitives::Address;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use crate::blockchain::wallet::Wallet;

/// Number of gas usage samples kept for fallback estimation.
pub const GAS_HISTORY_CAPACITY: usize = 10;

/// Bounded FIFO of recently observed `gas_used` values.
#[derive(Debug, Clone, Default)]
pub struct GasUsageHistory {
    samples: VecDeque<u64>,
}

impl GasUsageHistory {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(GAS_HISTORY_CAPACITY),
        }
    }

    /// Append a sample, evicting the oldest once full.
    pub fn record(&mut self, gas_used: u64) {
        if self.samples.len() == GAS_HISTORY_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(gas_used);
    }

    /// Arithmetic mean of the samples, `None` when empty.
    pub fn mean(&self) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let total: u128 = self.samples.iter().map(|&g| g as u128).sum();
        Some((total / self.samples.len() as u128) as u64)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples from oldest to newest.
    pub fn samples(&self) -> Vec<u64> {
        self.samples.iter().copied().collect()
    }
}

/// Fields guarded by the sequence lock.
#[derive(Debug, Default)]
pub(crate) struct SequenceState {
    /// Lowest nonce the next allocation may return. Covers the window between handing out
    /// a nonce and the node counting the resulting transaction as pending.
    pub(crate) floor: Option<u64>,
}

/// Fields guarded by the budget lock.
#[derive(Debug)]
pub(crate) struct BudgetState {
    pub(crate) gas_price: u128,
    pub(crate) last_price_sync: Option<Instant>,
    pub(crate) history: GasUsageHistory,
    pub(crate) gas_limit: u64,
}

/// The signing account plus the nonce and gas fields every submission carries.
#[derive(Debug)]
pub struct SignerContext {
    wallet: Wallet,
    resync_interval: Duration,
    sequence: Mutex<SequenceState>,
    budget: Mutex<BudgetState>,
}

impl SignerContext {
    /// Create the context once chain connectivity and the key are established.
    ///
    /// `initial_gas_limit` is reported until the first estimate replaces it.
    pub fn new(wallet: Wallet, resync_interval: Duration, initial_gas_limit: u64) -> Self {
        Self {
            wallet,
            resync_interval,
            sequence: Mutex::new(SequenceState::default()),
            budget: Mutex::new(BudgetState {
                gas_price: 0,
                last_price_sync: None,
                history: GasUsageHistory::new(),
                gas_limit: initial_gas_limit,
            }),
        }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.wallet.chain_id()
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn resync_interval(&self) -> Duration {
        self.resync_interval
    }

    /// Last gas price applied; zero before the first sync.
    pub async fn current_gas_price(&self) -> u128 {
        self.budget.lock().await.gas_price
    }

    pub async fn current_gas_limit(&self) -> u64 {
        self.budget.lock().await.gas_limit
    }

    /// Copy of the gas usage history, oldest first.
    pub async fn gas_usage_history(&self) -> Vec<u64> {
        self.budget.lock().await.history.samples()
    }

    pub(crate) async fn lock_sequence(&self) -> MutexGuard<'_, SequenceState> {
        self.sequence.lock().await
    }

    pub(crate) async fn lock_budget(&self) -> MutexGuard<'_, BudgetState> {
        self.budget.lock().await
    }
}
