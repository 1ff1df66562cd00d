//! PPLNS share accumulation over the DAG.
//!
//! Walking backward from a tip, each of the most recent `window` blocks
//! contributes its difficulty as weight for its miner. An included uncle
//! contributes too, discounted by the uncle penalty; the withheld remainder
//! is credited to the including block's miner, so total weight is conserved
//! exactly.

use sidepool_rewards::Share;
use sidepool_types::{BlockId, SidechainParams};
use tracing::warn;

use crate::store::BlockStore;

/// Collect the raw (uncompacted) share list for the PPLNS window ending at
/// `tip`. Returns `None` when `tip` is unknown; an incomplete ancestor walk
/// short of `window` blocks is not an error, it is the bootstrap case and
/// simply yields fewer shares.
pub fn get_shares(
    store: &BlockStore,
    tip: BlockId,
    params: &SidechainParams,
) -> Option<Vec<Share>> {
    let tip_block = store.get(&tip)?;
    let window_floor = tip_block.side.height.saturating_sub(params.window - 1);
    let penalty = params.uncle_penalty_percent;

    let mut shares = Vec::with_capacity(params.window as usize);
    let mut cursor = tip;
    for _ in 0..params.window {
        let Some(block) = store.get(&cursor) else {
            // The contiguous ancestor line is missing a block; the walk is
            // best-effort for callers, but a verified tip should never hit
            // this short of pruned history.
            warn!(%cursor, "share walk interrupted by missing ancestor");
            break;
        };

        let mut own_weight = block.side.difficulty;
        for uncle_id in &block.side.uncles {
            let Some(uncle) = store.get(uncle_id) else {
                warn!(%uncle_id, "share walk missing uncle");
                continue;
            };
            if uncle.side.height < window_floor {
                continue;
            }
            let uncle_share = uncle
                .side
                .difficulty
                .saturating_mul_u64(100 - penalty)
                .div_u64(100);
            // The withheld remainder goes to the including block's miner,
            // keeping the window's total weight exact.
            own_weight = own_weight.saturating_add(uncle.side.difficulty - uncle_share);
            shares.push(Share::new(uncle.side.miner, uncle_share));
        }
        shares.push(Share::new(block.side.miner, own_weight));

        if block.side.parent.is_zero() {
            break;
        }
        cursor = block.side.parent;
    }

    Some(shares)
}
