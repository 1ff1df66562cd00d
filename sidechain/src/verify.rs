//! The verification state machine.
//!
//! Blocks move `pending → {verified-valid, verified-invalid}`; both verified
//! states are terminal for that block object. A block whose ancestors are
//! unknown or themselves pending yields an indeterminate outcome and is
//! retried once the dependency resolves; indeterminate is never conflated
//! with invalid.

use std::collections::HashMap;

use rayon::prelude::*;
use sidepool_crypto::{derive_chained_seed, derive_fresh_seed, KeyDerivation};
use sidepool_mainchain::MainchainLookup;
use sidepool_rewards::{compact, split_reward};
use sidepool_types::{BlockId, ChainId, Difficulty, SidechainParams, UNCLE_BLOCK_DEPTH};
use sidepool_work::{retarget, RetargetOutcome, WindowEntry};

use crate::block::PoolBlock;
use crate::error::VerifyError;
use crate::shares::get_shares;
use crate::store::BlockStore;

/// Result of evaluating one block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    Valid,
    Invalid(VerifyError),
    /// Indeterminate: verification is deferred until the listed blocks
    /// arrive. An empty list means every ancestor is present but at least
    /// one is still pending.
    Pending { missing: Vec<BlockId> },
}

/// Memo of chained-seed derivations, keyed by (parent id, primary-chain
/// prev id). Cleared when the engine first synchronizes and on pruning.
pub(crate) type SeedCache = HashMap<(BlockId, ChainId), ChainId>;

/// Everything `check_block` consults besides the store.
pub(crate) struct VerifyContext<'a> {
    pub params: &'a SidechainParams,
    pub derivation: &'a dyn KeyDerivation,
    pub mainchain: Option<&'a dyn MainchainLookup>,
}

/// Evaluate the verification rules for `id`, top-down.
///
/// The caller owns flag mutation: this function only reads the store.
pub(crate) fn check_block(
    store: &BlockStore,
    ctx: &VerifyContext<'_>,
    seed_cache: &mut SeedCache,
    id: &BlockId,
) -> VerifyOutcome {
    let Some(block) = store.get(id) else {
        return VerifyOutcome::Pending { missing: vec![*id] };
    };

    // 1. Genesis.
    if block.side.height == 0 {
        return check_genesis(block, ctx.params);
    }

    // 2. Deep block: the network is assumed to have validated anything
    // buried this far; skip re-deriving rewards and difficulty.
    if block.depth > ctx.params.deep_block_depth() {
        return VerifyOutcome::Valid;
    }

    // 3. Parent linkage.
    let parent_id = block.side.parent;
    let Some(parent) = store.get(&parent_id) else {
        return VerifyOutcome::Pending {
            missing: vec![parent_id],
        };
    };
    if !parent.verified {
        return VerifyOutcome::Pending { missing: Vec::new() };
    }
    if parent.invalid {
        return VerifyOutcome::Invalid(VerifyError::AncestorInvalid(parent_id));
    }
    if block.side.height != parent.side.height + 1 {
        return VerifyOutcome::Invalid(VerifyError::WrongHeight {
            parent: parent.side.height,
            got: block.side.height,
        });
    }

    if let Some(mainchain) = ctx.mainchain {
        if let Ok(Some(header)) = mainchain.header_by_hash(&block.mainchain.prev_id) {
            if block.mainchain.height != header.height + 1 {
                return VerifyOutcome::Invalid(VerifyError::MainchainHeightMismatch {
                    referenced: header.height,
                    got: block.mainchain.height,
                });
            }
        }
    }

    // Uncle list must be strictly ascending (rules out double-counting by
    // repetition).
    for pair in block.side.uncles.windows(2) {
        if pair[0] >= pair[1] {
            return VerifyOutcome::Invalid(VerifyError::UnclesNotAscending);
        }
    }

    match check_uncles(store, block, parent) {
        Ok(VerifyOutcome::Valid) => {}
        Ok(other) => return other,
        Err(e) => return VerifyOutcome::Invalid(e),
    }

    // Cumulative difficulty: parent's, plus this block, plus every counted
    // uncle.
    let mut expected_cumulative = parent
        .side
        .cumulative_difficulty
        .saturating_add(block.side.difficulty);
    for uncle_id in &block.side.uncles {
        if let Some(uncle) = store.get(uncle_id) {
            expected_cumulative = expected_cumulative.saturating_add(uncle.side.difficulty);
        }
    }
    if block.side.cumulative_difficulty != expected_cumulative {
        return VerifyOutcome::Invalid(VerifyError::WrongCumulativeDifficulty {
            expected: expected_cumulative,
            got: block.side.cumulative_difficulty,
        });
    }

    // Transaction seed: chained from the parent on an unbroken primary
    // chain, freshly derived at a reorg boundary.
    let chained = seed_cache
        .entry((parent_id, block.mainchain.prev_id))
        .or_insert_with(|| derive_chained_seed(&parent.side.tx_seed, &block.mainchain.prev_id));
    if block.side.tx_seed != *chained {
        let fresh = derive_fresh_seed(&ctx.params.consensus_id(), &block.mainchain.prev_id);
        if block.side.tx_seed != fresh {
            return VerifyOutcome::Invalid(VerifyError::WrongSeed);
        }
    }

    // 4. Deep checks only inside the PPLNS window.
    if block.depth < ctx.params.window {
        if let Some(outcome) = check_required_difficulty(store, block, parent, ctx.params) {
            return outcome;
        }
        if let Some(outcome) = check_coinbase(store, block, parent_id, ctx) {
            return outcome;
        }
    }

    VerifyOutcome::Valid
}

fn check_genesis(block: &PoolBlock, params: &SidechainParams) -> VerifyOutcome {
    if !block.side.parent.is_zero() || !block.side.uncles.is_empty() {
        return VerifyOutcome::Invalid(VerifyError::GenesisMalformed(
            "genesis cannot reference other blocks",
        ));
    }
    if block.side.difficulty != params.min_difficulty
        || block.side.cumulative_difficulty != params.min_difficulty
    {
        return VerifyOutcome::Invalid(VerifyError::GenesisMalformed(
            "genesis difficulty must be the consensus minimum",
        ));
    }
    if params.share_version >= 2 && block.side.tx_seed != params.consensus_id() {
        return VerifyOutcome::Invalid(VerifyError::GenesisMalformed(
            "genesis seed must be the consensus id",
        ));
    }
    VerifyOutcome::Valid
}

/// Validate the uncle list: presence, verdicts, height range, not already
/// mined, and shared ancestry with the parent line.
fn check_uncles(
    store: &BlockStore,
    block: &PoolBlock,
    parent: &PoolBlock,
) -> Result<VerifyOutcome, VerifyError> {
    if block.side.uncles.is_empty() {
        return Ok(VerifyOutcome::Valid);
    }

    let height = block.side.height;

    // The parent-line ancestors from height-1 down to height-1-UNCLE_BLOCK_DEPTH,
    // used both for the already-mined check and the shared-ancestry check.
    let mut line: Vec<&PoolBlock> = Vec::with_capacity(UNCLE_BLOCK_DEPTH as usize + 2);
    let mut missing = Vec::new();
    let mut cursor = Some(parent);
    while let Some(anc) = cursor {
        line.push(anc);
        if line.len() as u64 > UNCLE_BLOCK_DEPTH + 1 || anc.side.parent.is_zero() {
            break;
        }
        match store.get(&anc.side.parent) {
            Some(next) => cursor = Some(next),
            None => {
                missing.push(anc.side.parent);
                break;
            }
        }
    }
    if !missing.is_empty() {
        return Ok(VerifyOutcome::Pending { missing });
    }

    let line_at = |h: u64| line.iter().find(|b| b.side.height == h);

    let mut any_pending = false;
    for uncle_id in &block.side.uncles {
        let Some(uncle) = store.get(uncle_id) else {
            missing.push(*uncle_id);
            continue;
        };
        if !uncle.verified {
            any_pending = true;
            continue;
        }
        if uncle.invalid {
            return Err(VerifyError::UncleInvalid(*uncle_id));
        }

        let uncle_height = uncle.side.height;
        if uncle_height >= height || height - uncle_height > UNCLE_BLOCK_DEPTH {
            return Err(VerifyError::UncleOutOfRange {
                id: *uncle_id,
                uncle_height,
                height,
            });
        }

        // Already mined: the uncle must not be an ancestor on the parent
        // line nor listed as an uncle by one, within the depth window.
        for anc in &line {
            if height - anc.side.height > UNCLE_BLOCK_DEPTH {
                break;
            }
            if anc.cached_id == *uncle_id {
                return Err(VerifyError::UncleAlreadyMined(*uncle_id));
            }
            if anc.side.uncles.contains(uncle_id) {
                return Err(VerifyError::UncleAlreadyMined(*uncle_id));
            }
        }

        // Shared ancestry: the uncle's parent must sit on the block's own
        // ancestor line.
        if uncle_height > 0 {
            match line_at(uncle_height - 1) {
                Some(anc) if anc.cached_id == uncle.side.parent => {}
                Some(_) => return Err(VerifyError::UncleOnForeignChain(*uncle_id)),
                None => {
                    // The line ended early (pruned history); treat as
                    // indeterminate rather than invalid.
                    return Ok(VerifyOutcome::Pending { missing: Vec::new() });
                }
            }
        }
    }

    if !missing.is_empty() || any_pending {
        return Ok(VerifyOutcome::Pending { missing });
    }
    Ok(VerifyOutcome::Valid)
}

/// Collect the retarget window walking back from `reference` along parent
/// links.
pub(crate) fn window_entries(
    store: &BlockStore,
    reference: &PoolBlock,
    params: &SidechainParams,
) -> Vec<WindowEntry> {
    let mut entries = Vec::with_capacity(params.window as usize);
    let mut cursor = Some(reference);
    while let Some(block) = cursor {
        entries.push(WindowEntry {
            timestamp: block.mainchain.timestamp.as_secs(),
            difficulty: block.side.difficulty,
        });
        if entries.len() as u64 >= params.window || block.side.parent.is_zero() {
            break;
        }
        cursor = store.get(&block.side.parent);
    }
    entries
}

/// The difficulty required of the block given its parent's window; the
/// bootstrap (insufficient history) case requires the consensus minimum.
pub(crate) fn required_difficulty(
    store: &BlockStore,
    parent: &PoolBlock,
    params: &SidechainParams,
) -> Difficulty {
    match retarget(&window_entries(store, parent, params), params) {
        RetargetOutcome::Required(d) => d,
        RetargetOutcome::InsufficientHistory => params.min_difficulty,
    }
}

fn check_required_difficulty(
    store: &BlockStore,
    block: &PoolBlock,
    parent: &PoolBlock,
    params: &SidechainParams,
) -> Option<VerifyOutcome> {
    let expected = required_difficulty(store, parent, params);
    if block.side.difficulty != expected {
        return Some(VerifyOutcome::Invalid(VerifyError::DifficultyMismatch {
            expected,
            got: block.side.difficulty,
        }));
    }
    None
}

/// The coinbase output set must match the PPLNS reward split applied to the
/// parent, in count, amount, and derived one-time key. The per-output key
/// checks are pure CPU work and fan out across the rayon pool; one failure
/// fails the block, and in-flight siblings are simply discarded.
fn check_coinbase(
    store: &BlockStore,
    block: &PoolBlock,
    parent_id: BlockId,
    ctx: &VerifyContext<'_>,
) -> Option<VerifyOutcome> {
    let Some(raw_shares) = get_shares(store, parent_id, ctx.params) else {
        return Some(VerifyOutcome::Pending {
            missing: vec![parent_id],
        });
    };
    let shares = compact(raw_shares);

    let Some(payouts) = split_reward(block.mainchain.reward, &shares) else {
        return Some(VerifyOutcome::Invalid(VerifyError::UnsplittableReward));
    };

    if block.mainchain.outputs.len() != payouts.len() {
        return Some(VerifyOutcome::Invalid(VerifyError::WrongRewardCount {
            expected: payouts.len(),
            got: block.mainchain.outputs.len(),
        }));
    }

    for (index, (output, payout)) in block.mainchain.outputs.iter().zip(&payouts).enumerate() {
        if output.amount != *payout {
            return Some(VerifyOutcome::Invalid(VerifyError::WrongRewardAmount {
                index,
                expected: *payout,
                got: output.amount,
            }));
        }
    }

    let bad_output = block
        .mainchain
        .outputs
        .par_iter()
        .enumerate()
        .find_any(|(index, output)| {
            let (pubkey, view_tag) = ctx.derivation.ephemeral_public_key(
                &shares[*index].miner,
                &block.side.tx_seed,
                *index as u32,
            );
            pubkey != output.ephemeral_pubkey || view_tag != output.view_tag
        });

    if let Some((index, _)) = bad_output {
        return Some(VerifyOutcome::Invalid(VerifyError::WrongEphemeralKey {
            index,
        }));
    }

    None
}
