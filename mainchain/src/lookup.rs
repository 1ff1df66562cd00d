//! Lookup contracts supplied by the primary-chain collaborator.

use crate::header::ChainMain;
use crate::MainchainError;
use sidepool_types::{ChainId, Difficulty};

/// Read access to primary-chain headers.
///
/// Implemented by the RPC/ZMQ ingestion layer. The sidechain core consults
/// it during verification and for the fork-choice tie-break. Lookups for
/// heights or hashes the collaborator has not yet seen return `Ok(None)`;
/// `Err` is reserved for transport-level failures.
pub trait MainchainLookup: Send + Sync {
    fn difficulty_by_height(&self, height: u64) -> Result<Option<Difficulty>, MainchainError>;

    fn header_by_height(&self, height: u64) -> Result<Option<ChainMain>, MainchainError>;

    fn header_by_hash(&self, id: &ChainId) -> Result<Option<ChainMain>, MainchainError>;
}

/// Opaque proof-of-work hash function, consumed where a block claims its
/// primary-chain proof-of-work is itself sufficient.
pub trait PowHasher: Send + Sync {
    fn hash(&self, seed: &ChainId, blob: &[u8]) -> [u8; 32];
}
