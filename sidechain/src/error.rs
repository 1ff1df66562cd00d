//! Verification failure taxonomy.
//!
//! Structural rejection happens before the core (at decode time) and is the
//! p2p layer's concern. Everything here is a verification verdict on a
//! well-formed block. Indeterminate results (unknown or still-pending
//! ancestors, insufficient retarget history) are not errors and never
//! appear in these types.

use sidepool_types::{BlockId, Difficulty};
use thiserror::Error;

/// Why a block was marked invalid.
///
/// `is_ban_worthy` distinguishes violations any honest peer could have
/// caught (cryptographic or structural, worth penalizing the sender) from
/// soft failures that can arise without malice.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("genesis block malformed: {0}")]
    GenesisMalformed(&'static str),

    #[error("height {got} does not follow parent height {parent}")]
    WrongHeight { parent: u64, got: u64 },

    #[error("parent {0} is invalid")]
    AncestorInvalid(BlockId),

    #[error("uncle ids are not strictly ascending")]
    UnclesNotAscending,

    #[error("uncle {id} at height {uncle_height} outside allowed range for height {height}")]
    UncleOutOfRange {
        id: BlockId,
        uncle_height: u64,
        height: u64,
    },

    #[error("uncle {0} was already mined by an ancestor")]
    UncleAlreadyMined(BlockId),

    #[error("uncle {0} is invalid")]
    UncleInvalid(BlockId),

    #[error("uncle {0} does not share the parent's ancestry line")]
    UncleOnForeignChain(BlockId),

    #[error("transaction seed does not match either deterministic derivation")]
    WrongSeed,

    #[error("cumulative difficulty {got} != expected {expected}")]
    WrongCumulativeDifficulty {
        expected: Difficulty,
        got: Difficulty,
    },

    #[error("difficulty {got} != retarget output {expected}")]
    DifficultyMismatch {
        expected: Difficulty,
        got: Difficulty,
    },

    #[error("primary-chain height {got} does not follow referenced header at {referenced}")]
    MainchainHeightMismatch { referenced: u64, got: u64 },

    #[error("coinbase has {got} outputs, reward split requires {expected}")]
    WrongRewardCount { expected: usize, got: usize },

    #[error("coinbase output {index} pays {got}, reward split requires {expected}")]
    WrongRewardAmount {
        index: usize,
        expected: u64,
        got: u64,
    },

    #[error("coinbase output {index} ephemeral key does not match derivation")]
    WrongEphemeralKey { index: usize },

    #[error("coinbase outputs do not split the reward (zero total weight)")]
    UnsplittableReward,
}

impl VerifyError {
    /// Whether the sender of such a block deserves a peer-level penalty.
    pub fn is_ban_worthy(&self) -> bool {
        !matches!(
            self,
            Self::DifficultyMismatch { .. } | Self::AncestorInvalid(_) | Self::UncleInvalid(_)
        )
    }
}

/// Top-level engine error, surfaced by `add_block`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SideChainError {
    #[error("block verification failed: {0}")]
    Verification(#[from] VerifyError),
}

impl SideChainError {
    pub fn is_ban_worthy(&self) -> bool {
        match self {
            Self::Verification(e) => e.is_ban_worthy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_failures_are_not_ban_worthy() {
        let soft = VerifyError::DifficultyMismatch {
            expected: Difficulty::from_u64(10),
            got: Difficulty::from_u64(5),
        };
        assert!(!soft.is_ban_worthy());
        assert!(!VerifyError::AncestorInvalid(BlockId::ZERO).is_ban_worthy());
    }

    #[test]
    fn structural_failures_are_ban_worthy() {
        assert!(VerifyError::UnclesNotAscending.is_ban_worthy());
        assert!(VerifyError::WrongSeed.is_ban_worthy());
        assert!(VerifyError::WrongEphemeralKey { index: 0 }.is_ban_worthy());
    }

    #[test]
    fn classification_passes_through_top_level_error() {
        let err = SideChainError::from(VerifyError::UnclesNotAscending);
        assert!(err.is_ban_worthy());
    }
}
