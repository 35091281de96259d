//! Transaction coordination for the lottery backend.
//!
//! One admin key submits every contract call. The coordinator serializes nonce allocation
//! for that key, keeps gas price and limit estimates fresh, and retries attempts that fail
//! for recoverable reasons.

pub mod config;
pub mod blockchain;
pub mod lottery;
pub mod lifecycle;
pub mod observability;

pub use blockchain::{SignerContext, TransactionCoordinator, TxParams};
pub use config::AppConfig;
pub use lifecycle::Shutdown;
pub use lottery::LotteryOperations;
