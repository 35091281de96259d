//! Metrics collection and exposition.
//!
//! # Metrics
//! - `chain_tx_attempts_total` (counter): submission attempts by outcome
//! - `chain_signer_nonce` (gauge): last allocated nonce
//! - `chain_gas_price_wei` (gauge): gas price applied to submissions
//! - `chain_gas_limit` (gauge): last computed gas limit
//! - `chain_rpc_health` (gauge): 1=healthy, 0=unhealthy
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_attempt(outcome: &'static str) {
    ::metrics::counter!("chain_tx_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_nonce(nonce: u64) {
    ::metrics::gauge!("chain_signer_nonce").set(nonce as f64);
}

pub fn record_gas_price(wei: u128) {
    ::metrics::gauge!("chain_gas_price_wei").set(wei as f64);
}

pub fn record_gas_limit(limit: u64) {
    ::metrics::gauge!("chain_gas_limit").set(limit as f64);
}

pub fn record_rpc_health(healthy: bool) {
    ::metrics::gauge!("chain_rpc_health").set(if healthy { 1.0 } else { 0.0 });
}
