//! The sidechain consensus core.
//!
//! This crate owns the fork-tolerant block DAG, the verification state
//! machine that promotes candidate blocks to verified or invalid, per-block
//! difficulty retargeting glue, GHOST-style fork choice with uncle credit,
//! PPLNS share accounting, and the duplicate-suppression filter, all behind
//! the [`SideChain`] engine facade.

pub mod block;
pub mod engine;
pub mod error;
pub mod event;
pub mod fork;
pub mod seen;
pub mod shares;
pub mod store;
pub mod template;
pub mod testing;
mod verify;

pub use block::{CoinbaseOutput, MainchainData, PoolBlock, SideData};
pub use engine::{AddOutcome, SideChain, TipSnapshot};
pub use error::{SideChainError, VerifyError};
pub use event::ChainEvent;
pub use fork::is_longer_chain;
pub use seen::DedupFilter;
pub use shares::get_shares;
pub use store::BlockStore;
pub use template::TemplateInput;
