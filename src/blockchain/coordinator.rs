//! Transaction coordinator: nonce + gas allocation, submission, classification, retry.
//!
//! # Attempt State Machine
//! ```text
//! Allocating ──fail──────────────────────────────▶ Failed(Setup)
//!     │
//!     ▼
//! Submitting (caller's operation with TxParams)
//!     │
//!     ├── Ok(hash) ─────────────────────────────▶ Succeeded
//!     ├── "nonce too low/high" ──▶ Retrying (no backoff)
//!     ├── "ran out of gas" ──────▶ Retrying (gas limit × safety factor)
//!     ├── cancelled ─────────────────────────────▶ Failed(Cancelled)
//!     └── anything else ─────────▶ Retrying
//!
//! Retrying ──attempts left──▶ Allocating
//!          ──exhausted──────▶ Failed(RetriesExhausted { last_error })
//! ```
//!
//! # Cancellation
//! A cancelled token aborts allocation or submission and returns `Cancelled`. A transaction
//! that was already broadcast cannot be recalled and may still be mined.
//!
//! # Confirmation
//! Success means the operation reported a hash without error. Waiting for inclusion is left to
//! the caller (see `transaction::TxMonitor`), since required depth differs per use case.

use std::future::Future;
use std::sync::Arc;

use alloy::primitives::TxHash;
use tokio_util::sync::CancellationToken;

use crate::blockchain::client::ChainClient;
use crate::blockchain::gas::GasEstimator;
use crate::blockchain::nonce::NonceAllocator;
use crate::blockchain::signer::SignerContext;
use crate::blockchain::types::{
    BlockchainConfig, BlockchainError, BlockchainResult, EstimationPayload, SubmittedTx,
    TransactionConfig, TxParams,
};
use crate::observability::metrics;

const NONCE_CONFLICT_PATTERNS: &[&str] = &[
    "nonce too low",
    "nonce too high",
    "replacement transaction underpriced",
];
const OUT_OF_GAS_PATTERNS: &[&str] = &["ran out of gas"];

/// Classification of one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(TxHash),
    /// The nonce was stale or already used; retry with a fresh allocation.
    RetryableSequenceConflict,
    /// The gas limit was too small; retry with a raised limit.
    RetryableUnderpriced,
    /// Any other rejection; retried until attempts run out.
    SubmissionRejected,
    /// Not retried.
    TerminalFailure,
}

impl AttemptOutcome {
    /// Label used for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success(_) => "success",
            AttemptOutcome::RetryableSequenceConflict => "nonce_conflict",
            AttemptOutcome::RetryableUnderpriced => "out_of_gas",
            AttemptOutcome::SubmissionRejected => "rejected",
            AttemptOutcome::TerminalFailure => "terminal",
        }
    }
}

/// Decide how the coordinator reacts to a failed attempt.
///
/// Chain clients expose no structured codes for these conditions, so this matches on the
/// error text (case-insensitive). Unmatched errors fall through to a generic retry.
pub fn classify_chain_error(error: &BlockchainError) -> AttemptOutcome {
    match error {
        BlockchainError::Cancelled => return AttemptOutcome::TerminalFailure,
        BlockchainError::SequenceConflict(_) => return AttemptOutcome::RetryableSequenceConflict,
        BlockchainError::OutOfGas(_) => return AttemptOutcome::RetryableUnderpriced,
        _ => {}
    }

    let text = error.to_string().to_lowercase();
    if NONCE_CONFLICT_PATTERNS.iter().any(|p| text.contains(p)) {
        AttemptOutcome::RetryableSequenceConflict
    } else if OUT_OF_GAS_PATTERNS.iter().any(|p| text.contains(p)) {
        AttemptOutcome::RetryableUnderpriced
    } else {
        AttemptOutcome::SubmissionRejected
    }
}

/// Classify the result of one attempt.
pub fn classify_attempt(result: &BlockchainResult<TxHash>) -> AttemptOutcome {
    match result {
        Ok(hash) => AttemptOutcome::Success(*hash),
        Err(error) => classify_chain_error(error),
    }
}

/// Runs caller operations against the shared signer with nonce, gas and retry discipline.
#[derive(Clone)]
pub struct TransactionCoordinator {
    client: Arc<dyn ChainClient>,
    signer: Arc<SignerContext>,
    nonces: NonceAllocator,
    gas: GasEstimator,
    max_attempts: u32,
}

impl TransactionCoordinator {
    pub fn new(
        client: Arc<dyn ChainClient>,
        signer: Arc<SignerContext>,
        chain: &BlockchainConfig,
        config: &TransactionConfig,
    ) -> Self {
        Self {
            nonces: NonceAllocator::new(client.clone(), signer.clone()),
            gas: GasEstimator::new(client.clone(), signer.clone(), chain, config),
            client,
            signer,
            max_attempts: config.max_attempts.max(1),
        }
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    pub fn signer(&self) -> &Arc<SignerContext> {
        &self.signer
    }

    pub fn nonces(&self) -> &NonceAllocator {
        &self.nonces
    }

    pub fn gas(&self) -> &GasEstimator {
        &self.gas
    }

    /// Run `operation` until it submits successfully, fails terminally, or attempts run out.
    ///
    /// `payload` is only used to simulate the call for a gas limit; pass `None` when the call
    /// is built inside `operation`. The operation receives fresh `TxParams` on every attempt
    /// and must stamp them onto the transaction it submits.
    #[tracing::instrument(name = "run_transaction", skip_all, fields(signer = %self.signer.address()))]
    pub async fn run_transaction<F, Fut>(
        &self,
        cancel: &CancellationToken,
        payload: Option<&EstimationPayload>,
        mut operation: F,
    ) -> BlockchainResult<SubmittedTx>
    where
        F: FnMut(TxParams) -> Fut,
        Fut: Future<Output = BlockchainResult<TxHash>>,
    {
        let mut limit_override: Option<u64> = None;
        let mut last_error: Option<BlockchainError> = None;
        let mut attempts = 0u32;

        while attempts < self.max_attempts {
            if cancel.is_cancelled() {
                return Err(BlockchainError::Cancelled);
            }
            attempts += 1;

            let params = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BlockchainError::Cancelled),
                allocated = self.allocate(payload, limit_override) => allocated,
            };
            let params = match params {
                Ok(params) => params,
                Err(e) => {
                    tracing::error!(attempt = attempts, error = %e, "Transaction setup failed");
                    metrics::record_attempt("setup_failed");
                    return Err(BlockchainError::Setup(Box::new(e)));
                }
            };

            tracing::debug!(
                attempt = attempts,
                nonce = params.nonce,
                gas_price = params.gas_price,
                gas_limit = params.gas_limit,
                "Submitting transaction"
            );

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.nonces.invalidate().await;
                    return Err(BlockchainError::Cancelled);
                }
                result = operation(params) => result,
            };

            let outcome = classify_attempt(&result);
            metrics::record_attempt(outcome.as_str());

            let error = match result {
                Ok(tx_hash) => {
                    tracing::info!(
                        tx_hash = %tx_hash,
                        nonce = params.nonce,
                        attempts,
                        "Transaction submitted"
                    );
                    return Ok(SubmittedTx {
                        tx_hash,
                        nonce: params.nonce,
                        gas_price: params.gas_price,
                        gas_limit: params.gas_limit,
                        attempts,
                    });
                }
                Err(error) => error,
            };

            self.nonces.invalidate().await;

            match outcome {
                AttemptOutcome::RetryableSequenceConflict => {
                    tracing::warn!(
                        attempt = attempts,
                        nonce = params.nonce,
                        error = %error,
                        "Nonce conflict, reallocating"
                    );
                }
                AttemptOutcome::RetryableUnderpriced => {
                    tracing::warn!(
                        attempt = attempts,
                        gas_limit = params.gas_limit,
                        error = %error,
                        "Transaction ran out of gas"
                    );
                    limit_override = Some(self.gas.bump_gas_limit(params.gas_limit).await);
                }
                AttemptOutcome::TerminalFailure => {
                    tracing::warn!(attempt = attempts, error = %error, "Transaction aborted");
                    return Err(error);
                }
                AttemptOutcome::SubmissionRejected | AttemptOutcome::Success(_) => {
                    tracing::warn!(attempt = attempts, error = %error, "Transaction rejected");
                }
            }
            last_error = Some(error);
        }

        let last_error = last_error.unwrap_or_else(|| {
            BlockchainError::Submission("no attempt was made".to_string())
        });
        tracing::error!(attempts, error = %last_error, "Transaction retries exhausted");
        Err(BlockchainError::RetriesExhausted {
            attempts,
            last_error: Box::new(last_error),
        })
    }

    async fn allocate(
        &self,
        payload: Option<&EstimationPayload>,
        limit_override: Option<u64>,
    ) -> BlockchainResult<TxParams> {
        // The nonce is allocated last: once the floor moves there is no await left in which a
        // cancelled caller could drop this future and strand it.
        let budget = self.gas.budget(payload, limit_override).await?;
        let nonce = self.nonces.next_nonce().await?;

        Ok(TxParams {
            from: self.signer.address(),
            chain_id: self.signer.chain_id(),
            nonce,
            gas_price: budget.gas_price,
            gas_limit: budget.gas_limit,
        })
    }
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("signer", &self.signer.address())
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}
