//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the coordinator.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Chain connectivity settings.
    pub blockchain: BlockchainConfig,

    /// Nonce, gas and retry policy for submitted transactions.
    pub transactions: TransactionConfig,

    /// Lottery contract addresses.
    pub lottery: LotteryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Blockchain integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs (reads only).
    #[serde(default)]
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Number of block confirmations required for finality.
    pub confirmation_blocks: u32,

    /// Gas price multiplier (1.0 = suggested, 1.2 = 20% buffer).
    pub gas_price_multiplier: f64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 1,
            rpc_timeout_secs: 10,
            confirmation_blocks: 3,
            gas_price_multiplier: 1.0,
            max_gas_price_gwei: 500,
        }
    }
}

/// Transaction coordinator policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Minimum age of the cached gas price before it is re-queried.
    pub resync_interval_secs: u64,

    /// Maximum submission attempts per transaction.
    pub max_attempts: u32,

    /// Multiplier applied to estimated gas limits and on "out of gas" retries.
    pub gas_limit_safety_factor: f64,

    /// Floor for every computed gas limit.
    pub min_gas_limit: u64,

    /// Gas limit used when there is neither a payload to simulate nor usage history.
    pub default_gas_limit: u64,

    /// How long callers wait for confirmation when they choose to wait.
    pub confirmation_timeout_secs: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            resync_interval_secs: 60,
            max_attempts: 3,
            gas_limit_safety_factor: 1.5,
            min_gas_limit: 1_000_000,
            default_gas_limit: 5_000_000,
            confirmation_timeout_secs: 120,
        }
    }
}

/// Lottery contract configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LotteryConfig {
    /// Address of the LOTToken contract (bets and stablecoins go through it).
    pub token_contract_address: String,

    /// Address of the rollout (randomness) contract handed to new lotteries.
    pub rollout_contract_address: String,

    /// Simulate every lottery call for its gas limit. State transitions always simulate.
    pub simulate_gas_limits: bool,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Include raw chain error text in user-facing messages.
    pub diagnostic_errors: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            diagnostic_errors: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
