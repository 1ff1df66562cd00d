//! Network identifier.

use serde::{Deserialize, Serialize};

/// Identifies which sidechain network a node participates in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkId {
    /// The production network, layered on the primary mainnet.
    Main,
    /// The public test network.
    Test,
    /// Local development network.
    Dev,
}

impl NetworkId {
    /// Default p2p port for this network.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Main => 37889,
            Self::Test => 38889,
            Self::Dev => 39889,
        }
    }

    /// Human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Test => "test",
            Self::Dev => "dev",
        }
    }
}
