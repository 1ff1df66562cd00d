//! Pool node wiring.
//!
//! Couples the consensus engine to its embedding application: typed TOML
//! configuration, fire-and-forget side-effect hooks, and template building.
//! Network surfaces (p2p, stratum, primary-chain ingestion) live outside
//! this workspace and talk to the engine through [`PoolNode`].

pub mod config;
pub mod error;
pub mod hooks;
pub mod pool;

pub use config::PoolConfig;
pub use error::NodeError;
pub use hooks::{NullHooks, PoolHooks};
pub use pool::{new_extra_nonce, PoolNode};

/// Initialize structured logging for an embedding binary.
///
/// Thin wrapper so applications depend on one crate; respects `RUST_LOG`.
pub fn init_logging() {
    sidepool_utils::init_tracing();
}
