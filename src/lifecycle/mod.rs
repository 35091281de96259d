//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Wallet → Client → SignerContext → Coordinator
//!
//! Shutdown (shutdown.rs):
//!     Signal received → cancel tokens → in-flight runs return Cancelled
//!
//! Signals (signals.rs):
//!     SIGINT → Trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: the signer context is created only once chain connectivity and the key
//!   are established
//! - Fail fast: any startup error is fatal

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{start, Services, StartupError};
