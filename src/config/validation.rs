//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, factors > 1.0)
//! - Check that URLs and contract addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::Address;
use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let chain = &config.blockchain;
    let tx = &config.transactions;

    if chain.rpc_url.parse::<url::Url>().is_err() {
        errors.push(ValidationError::new("blockchain.rpc_url", format!("invalid URL '{}'", chain.rpc_url)));
    }
    if chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("blockchain.rpc_timeout_secs", "must be greater than 0"));
    }
    if chain.gas_price_multiplier <= 0.0 {
        errors.push(ValidationError::new("blockchain.gas_price_multiplier", "must be positive"));
    }

    if tx.max_attempts == 0 {
        errors.push(ValidationError::new("transactions.max_attempts", "must be at least 1"));
    }
    if tx.resync_interval_secs == 0 {
        errors.push(ValidationError::new("transactions.resync_interval_secs", "must be greater than 0"));
    }
    if tx.gas_limit_safety_factor <= 1.0 {
        errors.push(ValidationError::new(
            "transactions.gas_limit_safety_factor",
            format!("must be greater than 1.0, got {}", tx.gas_limit_safety_factor),
        ));
    }
    if tx.min_gas_limit == 0 {
        errors.push(ValidationError::new("transactions.min_gas_limit", "must be greater than 0"));
    }
    if tx.default_gas_limit == 0 {
        errors.push(ValidationError::new("transactions.default_gas_limit", "must be greater than 0"));
    }

    for (field, value) in [
        ("lottery.token_contract_address", &config.lottery.token_contract_address),
        ("lottery.rollout_contract_address", &config.lottery.rollout_contract_address),
    ] {
        if !value.is_empty() && value.parse::<Address>().is_err() {
            errors.push(ValidationError::new(field, format!("invalid address '{}'", value)));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
