//! Fundamental types for the sidepool consensus engine.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: difficulty values, hash identifiers, miner addresses,
//! timestamps, consensus parameters, and the dedup block identity.

pub mod address;
pub mod difficulty;
pub mod hash;
pub mod id;
pub mod network;
pub mod params;
pub mod time;

pub use address::MinerAddress;
pub use difficulty::Difficulty;
pub use hash::{BlockId, ChainId, MerkleRoot};
pub use id::FullId;
pub use network::NetworkId;
pub use params::{SidechainParams, MAINCHAIN_BLOCK_TIME_SECS, UNCLE_BLOCK_DEPTH};
pub use time::Timestamp;
