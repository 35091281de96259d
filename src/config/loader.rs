//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from an optional TOML file, apply environment overrides, then validate.
///
/// Without a file every section starts from its defaults.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment values on top of the file configuration.
///
/// Unparseable values are ignored with a warning and the file value is kept.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("ETHEREUM_NODE_URL") {
        config.blockchain.rpc_url = url;
    }
    if let Some(address) = lookup("TOKEN_CONTRACT_ADDRESS") {
        config.lottery.token_contract_address = address;
    }
    if let Some(address) = lookup("ROLLOUT_CONTRACT_ADDRESS") {
        config.lottery.rollout_contract_address = address;
    }

    let tx = &mut config.transactions;
    override_parsed(&lookup, "BLOCKCHAIN_SYNC_INTERVAL", &mut tx.resync_interval_secs);
    override_parsed(&lookup, "MAX_BLOCKCHAIN_RETRIES", &mut tx.max_attempts);
    override_parsed(&lookup, "GAS_LIMIT_INCREASE_FACTOR", &mut tx.gas_limit_safety_factor);
    override_parsed(&lookup, "MIN_GAS_LIMIT", &mut tx.min_gas_limit);
    override_parsed(&lookup, "DEFAULT_GAS_LIMIT", &mut tx.default_gas_limit);
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!(key, value = %raw, "Ignoring unparseable environment override"),
    }
}
