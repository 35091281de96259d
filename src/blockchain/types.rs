//! Chain-specific types and error definitions.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use thiserror::Error;

// Re-export config sections from config module to avoid duplication
pub use crate::config::schema::{BlockchainConfig, TransactionConfig};

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Nonce or gas budget could not be obtained; the chain link is unhealthy.
    #[error("Transaction setup failed: {0}")]
    Setup(Box<BlockchainError>),

    /// The chain rejected the nonce ("nonce too low" / "nonce too high").
    #[error("Nonce conflict: {0}")]
    SequenceConflict(String),

    /// The operation ran out of gas.
    #[error("Out of gas: {0}")]
    OutOfGas(String),

    /// Generic chain rejection of a submitted transaction.
    #[error("Submission rejected: {0}")]
    Submission(String),

    /// The caller cancelled the operation.
    #[error("Operation cancelled by caller")]
    Cancelled,

    /// Every attempt failed; wraps the last concrete chain error.
    #[error("Transaction failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: Box<BlockchainError>,
    },

    /// Call simulation for a gas limit failed.
    #[error("Gas estimation failed: {0}")]
    Estimation(String),

    /// Transaction was not confirmed within expected time.
    #[error("Transaction not confirmed after {0} blocks")]
    ConfirmationTimeout(u32),

    /// Invalid private key format or derivation error.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Blockchain client not initialized or disabled.
    #[error("Blockchain not available: {0}")]
    NotAvailable(String),
}

impl BlockchainError {
    /// Message suitable for end users; raw chain text is withheld unless `diagnostic`.
    pub fn user_message(&self, diagnostic: bool) -> String {
        if diagnostic {
            return self.to_string();
        }
        match self {
            BlockchainError::Cancelled => "operation cancelled".to_string(),
            _ => "operation failed, try again".to_string(),
        }
    }
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// Nonce and gas budget handed to an operation for one attempt.
///
/// All fields come from a single allocation, so price and limit are always consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxParams {
    pub from: Address,
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
}

impl TxParams {
    /// Stamp these parameters onto a transaction request.
    pub fn apply(&self, tx: TransactionRequest) -> TransactionRequest {
        tx.with_from(self.from)
            .with_nonce(self.nonce)
            .with_gas_price(self.gas_price)
            .with_gas_limit(self.gas_limit)
            .with_chain_id(self.chain_id)
    }
}

/// Call data used to simulate an operation for its gas limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EstimationPayload {
    /// Contract to call; `None` simulates a deployment.
    pub to: Option<Address>,
    pub input: Bytes,
    pub value: U256,
}

impl EstimationPayload {
    /// Payload for a call to an existing contract.
    pub fn call(to: Address, input: impl Into<Bytes>) -> Self {
        Self {
            to: Some(to),
            input: input.into(),
            value: U256::ZERO,
        }
    }

    /// Payload for a contract deployment.
    pub fn deploy(code: impl Into<Bytes>) -> Self {
        Self {
            to: None,
            input: code.into(),
            value: U256::ZERO,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    /// Build the request the node simulates.
    pub fn to_request(&self, from: Address) -> TransactionRequest {
        let tx = TransactionRequest::default()
            .with_from(from)
            .with_value(self.value);
        match self.to {
            Some(to) => tx.with_to(to).with_input(self.input.clone()),
            None => tx.with_deploy_code(self.input.clone()),
        }
    }
}

/// The receipt fields the coordinator and confirmation monitor rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub success: bool,
}

/// Outcome of a successful `run_transaction` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedTx {
    pub tx_hash: TxHash,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    /// Number of submission attempts, including the successful one.
    pub attempts: u32,
}

/// Transaction confirmation status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// Transaction is confirmed with required block depth.
    Confirmed { block_number: u64, gas_used: u64 },
    /// Transaction was mined but reverted.
    Failed(String),
}
