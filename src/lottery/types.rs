//! Lottery domain types and errors.

use alloy::primitives::{Address, TxHash, U256};
use thiserror::Error;

use crate::blockchain::{BlockchainError, SubmittedTx};

/// A bet picks exactly this many numbers.
pub const BET_NUMBERS: usize = 3;

#[derive(Debug, Error)]
pub enum LotteryError {
    #[error("Invalid bet: {0}")]
    InvalidBet(String),

    #[error("Invalid address for {field}: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Unknown lottery state {0}")]
    UnknownState(u8),

    #[error("Failed to decode contract response: {0}")]
    Decode(String),

    #[error("State transition {tx_hash} did not confirm: {status}")]
    TransitionFailed { tx_hash: TxHash, status: String },

    #[error(transparent)]
    Chain(#[from] BlockchainError),
}

impl LotteryError {
    /// Message safe to show an operator. Chain errors keep their own redaction rules.
    pub fn user_message(&self, diagnostic: bool) -> String {
        match self {
            LotteryError::Chain(e) => e.user_message(diagnostic),
            other => other.to_string(),
        }
    }
}

pub type LotteryResult<T> = Result<T, LotteryError>;

/// A contract creation that has been broadcast.
#[derive(Debug, Clone)]
pub struct DeployedContract {
    /// Derived from the sender and the nonce the deployment used.
    pub address: Address,
    pub tx: SubmittedTx,
}

/// Stablecoin accepted by the LOT token for swaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stablecoin {
    pub address: Address,
    pub name: String,
    pub rate: U256,
    pub receiver: Address,
}
