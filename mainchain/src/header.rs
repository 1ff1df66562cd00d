//! Primary-chain block header snapshot.

use serde::{Deserialize, Serialize};
use sidepool_types::{ChainId, Difficulty, Timestamp};

/// The consensus-relevant fields of a primary-chain block header.
///
/// Created and updated by the primary-chain collaborator (RPC/ZMQ
/// ingestion); read-only to the sidechain core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMain {
    pub height: u64,
    pub id: ChainId,
    pub timestamp: Timestamp,
    pub difficulty: Difficulty,
    /// Base block reward plus fees, in atomic units.
    pub reward: u64,
}
