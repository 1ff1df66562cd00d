//! Contributor shares within a PPLNS window.

use serde::{Deserialize, Serialize};
use sidepool_types::{Difficulty, MinerAddress};

/// One contributor's weight within a PPLNS window.
///
/// Created transiently per reward computation and merged by address via
/// [`compact`](crate::compact).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub miner: MinerAddress,
    pub weight: Difficulty,
}

impl Share {
    pub fn new(miner: MinerAddress, weight: Difficulty) -> Self {
        Self { miner, weight }
    }
}

/// Sort shares by raw address bytes and merge duplicates by summing weight.
///
/// Sorting is by raw bytes so the ordering is deterministic and
/// implementation independent; the output is byte-identical for any
/// permutation of the input.
pub fn compact(mut shares: Vec<Share>) -> Vec<Share> {
    shares.sort_by(|a, b| a.miner.cmp(&b.miner));

    let mut out: Vec<Share> = Vec::with_capacity(shares.len());
    for share in shares {
        match out.last_mut() {
            Some(last) if last.miner == share.miner => {
                last.weight = last.weight.saturating_add(share.weight);
            }
            _ => out.push(share),
        }
    }
    out
}
