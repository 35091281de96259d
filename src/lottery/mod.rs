//! Lottery contract operations.
//!
//! # Data Flow
//! ```text
//! CLI / service caller
//!     → operations.rs (encode contract call, validate inputs)
//!         → blockchain::TransactionCoordinator (nonce, gas, retries)
//!     → contracts.rs (ABI bindings, lifecycle states)
//! ```

pub mod contracts;
pub mod operations;
pub mod types;

pub use contracts::LotteryState;
pub use operations::LotteryOperations;
pub use types::{DeployedContract, LotteryError, LotteryResult, Stablecoin, BET_NUMBERS};
