//! Confirmation monitoring for submitted transactions.
//!
//! # Responsibilities
//! - Poll receipts until the required confirmation depth
//! - Report reverted transactions
//! - Feed confirmed gas usage back into the estimator's history

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::TxHash;
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::blockchain::client::ChainClient;
use crate::blockchain::gas::GasEstimator;
use crate::blockchain::types::{BlockchainError, BlockchainResult, ConfirmationStatus};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Waits for transactions to reach a confirmation depth.
#[derive(Clone)]
pub struct TxMonitor {
    client: Arc<dyn ChainClient>,
    gas: GasEstimator,
    required_confirmations: u32,
    poll_interval: Duration,
}

impl TxMonitor {
    pub fn new(client: Arc<dyn ChainClient>, gas: GasEstimator, required_confirmations: u32) -> Self {
        Self {
            client,
            gas,
            required_confirmations: required_confirmations.max(1),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Wait for `tx_hash` to be confirmed.
    ///
    /// The block containing the transaction counts as the first confirmation. Returns
    /// `Failed` for a reverted receipt and `ConfirmationTimeout` when `max_wait` elapses.
    pub async fn wait_for_confirmation(
        &self,
        tx_hash: TxHash,
        max_wait: Duration,
    ) -> BlockchainResult<ConfirmationStatus> {
        let required = self.required_confirmations;

        let result = timeout(max_wait, async {
            let mut ticker = interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let receipt = match self.client.receipt(tx_hash).await? {
                    Some(r) => r,
                    None => {
                        tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                        continue;
                    }
                };

                if !receipt.success {
                    tracing::warn!(tx_hash = %tx_hash, gas_used = receipt.gas_used, "Transaction reverted");
                    return Ok(ConfirmationStatus::Failed("Transaction reverted".to_string()));
                }

                let current_block = self.client.block_number().await?;
                let tx_block = receipt.block_number.unwrap_or(current_block);
                let confirmations = current_block.saturating_sub(tx_block) as u32 + 1;

                if confirmations >= required {
                    self.gas.update_gas_usage_history(receipt.gas_used).await;
                    tracing::info!(
                        tx_hash = %tx_hash,
                        block_number = tx_block,
                        gas_used = receipt.gas_used,
                        "Transaction confirmed"
                    );
                    return Ok(ConfirmationStatus::Confirmed {
                        block_number: tx_block,
                        gas_used: receipt.gas_used,
                    });
                }

                tracing::debug!(
                    tx_hash = %tx_hash,
                    confirmations = confirmations,
                    required = required,
                    "Waiting for confirmations"
                );
            }
        })
        .await;

        match result {
            Ok(status) => status,
            Err(_) => Err(BlockchainError::ConfirmationTimeout(required)),
        }
    }
}

impl std::fmt::Debug for TxMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxMonitor")
            .field("required_confirmations", &self.required_confirmations)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}
