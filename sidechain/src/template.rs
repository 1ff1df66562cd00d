//! Local block template construction.
//!
//! Builds the next `PoolBlock` on top of the current tip: uncle candidates
//! are collected from verified side-branches, the difficulty comes from the
//! retarget of the tip's window, and the coinbase outputs are the PPLNS
//! reward split the verifier will recompute. A template built here passes
//! verification unchanged.

use sidepool_crypto::{derive_chained_seed, KeyDerivation};
use sidepool_rewards::{compact, split_reward};
use sidepool_types::{
    BlockId, ChainId, MerkleRoot, MinerAddress, SidechainParams, Timestamp, UNCLE_BLOCK_DEPTH,
};
use tracing::debug;

use crate::block::{CoinbaseOutput, MainchainData, PoolBlock, SideData};
use crate::shares::get_shares;
use crate::store::BlockStore;
use crate::verify::required_difficulty;

/// Caller-supplied inputs for a new template.
#[derive(Clone, Debug)]
pub struct TemplateInput {
    /// Address to credit for this block.
    pub miner: MinerAddress,
    /// Primary-chain height the template will be mined at.
    pub mainchain_height: u64,
    /// Primary-chain block the template builds on.
    pub mainchain_prev: ChainId,
    /// Template timestamp.
    pub timestamp: Timestamp,
    /// Total coinbase reward (base + fees), atomic units.
    pub reward: u64,
    /// Per-miner extra nonce.
    pub extra_nonce: u32,
}

/// Build the next block template on `tip` (the engine wraps this behind its
/// read lock). On an empty chain this returns the genesis block, whose
/// fields are fixed by consensus.
pub(crate) fn build_template(
    store: &BlockStore,
    tip: Option<BlockId>,
    params: &SidechainParams,
    derivation: &dyn KeyDerivation,
    input: &TemplateInput,
) -> PoolBlock {
    let parent = tip.and_then(|id| store.get(&id));
    let Some(parent) = parent else {
        return PoolBlock::genesis(params);
    };
    let tip_id = parent.cached_id;

    let height = parent.side.height + 1;
    let uncles = collect_uncles(store, parent, height);

    let difficulty = required_difficulty(store, parent, params);
    let mut cumulative = parent
        .side
        .cumulative_difficulty
        .saturating_add(difficulty);
    for uncle_id in &uncles {
        if let Some(uncle) = store.get(uncle_id) {
            cumulative = cumulative.saturating_add(uncle.side.difficulty);
        }
    }

    let tx_seed = derive_chained_seed(&parent.side.tx_seed, &input.mainchain_prev);

    let shares = compact(get_shares(store, tip_id, params).unwrap_or_default());
    let payouts = split_reward(input.reward, &shares).unwrap_or_default();
    let outputs: Vec<CoinbaseOutput> = shares
        .iter()
        .zip(&payouts)
        .enumerate()
        .map(|(index, (share, payout))| {
            let (ephemeral_pubkey, view_tag) =
                derivation.ephemeral_public_key(&share.miner, &tx_seed, index as u32);
            CoinbaseOutput {
                amount: *payout,
                ephemeral_pubkey,
                view_tag,
            }
        })
        .collect();

    debug!(height, uncles = uncles.len(), "template built");

    PoolBlock::new(
        MainchainData {
            height: input.mainchain_height,
            prev_id: input.mainchain_prev,
            timestamp: input.timestamp,
            reward: input.reward,
            outputs,
            extra_nonce: input.extra_nonce,
            nonce: 0,
        },
        SideData {
            miner: input.miner,
            parent: tip_id,
            uncles,
            height,
            difficulty,
            cumulative_difficulty: cumulative,
            tx_seed,
        },
        MerkleRoot::ZERO,
    )
}

/// Verified side-branch blocks eligible as uncles of a block at `height`
/// built on `parent`, in ascending id order.
fn collect_uncles(store: &BlockStore, parent: &PoolBlock, height: u64) -> Vec<BlockId> {
    // The parent line from height-1 downward; an uncle already credited by
    // a line block must not be mined again.
    let mut line: Vec<&PoolBlock> = Vec::new();
    let mut cursor = Some(parent);
    while let Some(block) = cursor {
        line.push(block);
        if line.len() as u64 > UNCLE_BLOCK_DEPTH + 1 || block.side.parent.is_zero() {
            break;
        }
        cursor = store.get(&block.side.parent);
    }
    let line_at = |h: u64| {
        line.iter()
            .find(|b| b.side.height == h)
            .map(|b| b.cached_id)
    };

    let floor = height.saturating_sub(UNCLE_BLOCK_DEPTH);
    let mut uncles = Vec::new();
    for h in floor..height {
        for candidate_id in store.blocks_at_height(h) {
            let Some(candidate) = store.get(candidate_id) else {
                continue;
            };
            if !candidate.verified || candidate.invalid {
                continue;
            }
            let already_mined = line.iter().any(|anc| {
                height - anc.side.height <= UNCLE_BLOCK_DEPTH
                    && (anc.cached_id == *candidate_id
                        || anc.side.uncles.contains(candidate_id))
            });
            if already_mined {
                continue;
            }
            // Same ancestry line as the parent.
            if candidate.side.height > 0 {
                match line_at(candidate.side.height - 1) {
                    Some(anc_id) if anc_id == candidate.side.parent => {}
                    _ => continue,
                }
            }
            uncles.push(*candidate_id);
        }
    }
    uncles.sort();
    uncles
}
