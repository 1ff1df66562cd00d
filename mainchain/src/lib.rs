//! Primary-chain collaborator contracts.
//!
//! The sidechain core never talks to the primary chain directly; it consumes
//! header data and the proof-of-work hash through the traits defined here.

pub mod header;
pub mod lookup;

use thiserror::Error;

pub use header::ChainMain;
pub use lookup::{MainchainLookup, PowHasher};

/// Errors surfaced by a primary-chain lookup implementation.
#[derive(Debug, Error)]
pub enum MainchainError {
    #[error("primary chain node unreachable: {0}")]
    Unreachable(String),

    #[error("malformed primary chain response: {0}")]
    Malformed(String),
}
