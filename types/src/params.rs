//! Network-wide consensus parameters.
//!
//! A `SidechainParams` value is immutable after construction and shared by
//! reference across the engine. Two nodes agree on a sidechain iff their
//! derived consensus ids match, so the id is a hash over every parameter
//! that affects block validity.

use crate::difficulty::Difficulty;
use crate::hash::ChainId;
use crate::network::NetworkId;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};

/// How far back (in heights) a block may reach for an uncle.
pub const UNCLE_BLOCK_DEPTH: u64 = 3;

/// Primary-chain target block time in seconds.
pub const MAINCHAIN_BLOCK_TIME_SECS: u64 = 120;

/// Consensus parameters for one sidechain network.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SidechainParams {
    /// Which network these parameters describe.
    pub network: NetworkId,
    /// Sidechain target block time in seconds.
    pub target_block_time: u64,
    /// Difficulty floor; also the genesis difficulty.
    pub min_difficulty: Difficulty,
    /// PPLNS window length in blocks.
    pub window: u64,
    /// Percentage of an uncle's weight withheld from the uncle's miner and
    /// credited to the including block (0..=100).
    pub uncle_penalty_percent: u64,
    /// Protocol share version (hard-fork schedule gate).
    pub share_version: u8,
    /// Derived consensus id, computed once at construction.
    consensus_id: ChainId,
}

impl SidechainParams {
    /// Construct parameters, deriving the consensus id.
    pub fn new(
        network: NetworkId,
        target_block_time: u64,
        min_difficulty: Difficulty,
        window: u64,
        uncle_penalty_percent: u64,
        share_version: u8,
    ) -> Self {
        let consensus_id = derive_consensus_id(
            network,
            target_block_time,
            min_difficulty,
            window,
            uncle_penalty_percent,
            share_version,
        );
        Self {
            network,
            target_block_time,
            min_difficulty,
            window,
            uncle_penalty_percent,
            share_version,
            consensus_id,
        }
    }

    /// Parameters of the production network.
    pub fn main_defaults() -> Self {
        Self::new(
            NetworkId::Main,
            10,
            Difficulty::from_u64(100_000),
            2160,
            20,
            2,
        )
    }

    /// Parameters of the public test network.
    pub fn test_defaults() -> Self {
        Self::new(
            NetworkId::Test,
            10,
            Difficulty::from_u64(1_000),
            2160,
            20,
            2,
        )
    }

    /// Small-window parameters for local development and tests.
    pub fn dev_defaults() -> Self {
        Self::new(NetworkId::Dev, 1, Difficulty::from_u64(10), 30, 20, 2)
    }

    /// The derived consensus id.
    pub fn consensus_id(&self) -> ChainId {
        self.consensus_id
    }

    /// Height distance below the tip beyond which blocks become prunable.
    pub fn prune_distance(&self) -> u64 {
        2 * self.window + MAINCHAIN_BLOCK_TIME_SECS / self.target_block_time.max(1)
    }

    /// Depth beyond which a block skips detailed verification: the network
    /// is assumed to have already validated anything buried this far.
    pub fn deep_block_depth(&self) -> u64 {
        2 * (self.window - 1) + UNCLE_BLOCK_DEPTH
    }

    /// Age after which an unconfirmed side-branch is reclaimed by pruning
    /// regardless of depth.
    pub fn prune_grace_secs(&self) -> u64 {
        4 * self.window * self.target_block_time
    }
}

impl Default for SidechainParams {
    fn default() -> Self {
        Self::main_defaults()
    }
}

/// Hash the canonical parameter encoding into the consensus id.
///
/// Field order and encoding are consensus-relevant: changing either forks
/// the network.
fn derive_consensus_id(
    network: NetworkId,
    target_block_time: u64,
    min_difficulty: Difficulty,
    window: u64,
    uncle_penalty_percent: u64,
    share_version: u8,
) -> ChainId {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(network.as_str().as_bytes());
    hasher.update(target_block_time.to_le_bytes());
    hasher.update(min_difficulty.to_le_bytes());
    hasher.update(window.to_le_bytes());
    hasher.update(uncle_penalty_percent.to_le_bytes());
    hasher.update([share_version]);
    ChainId(hasher.finalize().into())
}
