//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! caller (lottery operations)
//!     → coordinator.rs (attempt loop, error classification)
//!         → nonce.rs (pending nonce under the sequence lock)
//!         → gas.rs (price/limit under the budget lock)
//!     → caller's operation with TxParams
//!     → client.rs (sign, broadcast, RPC with timeouts)
//!     → transaction.rs (optional confirmation wait, gas history feedback)
//! ```
//!
//! # Security Constraints
//! - One signing key per process, loaded once at startup
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod coordinator;
pub mod gas;
pub mod nonce;
pub mod signer;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::{BlockchainClient, ChainClient};
pub use coordinator::{classify_chain_error, AttemptOutcome, TransactionCoordinator};
pub use gas::{GasBudget, GasEstimator};
pub use nonce::NonceAllocator;
pub use signer::{GasUsageHistory, SignerContext, GAS_HISTORY_CAPACITY};
pub use transaction::TxMonitor;
pub use types::{
    BlockchainConfig, BlockchainError, BlockchainResult, ChainId, ConfirmationStatus,
    EstimationPayload, ReceiptSummary, SubmittedTx, TxParams,
};
pub use wallet::Wallet;
