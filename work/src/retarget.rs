//! Windowed difficulty retargeting.
//!
//! The required difficulty for a block is computed from the timestamps and
//! difficulties of up to `window` contiguous same-chain ancestors of its
//! parent. Outlier timestamps are trimmed from both ends before the average
//! solve time is measured, then the average recent difficulty is scaled by
//! `target_block_time / average_solve_time` and clamped to the network
//! minimum. All arithmetic is exact 128-bit integer math.

use sidepool_types::{Difficulty, SidechainParams};

/// One ancestor's contribution to the retarget window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowEntry {
    /// Block timestamp in seconds.
    pub timestamp: u64,
    /// The difficulty that block was mined at.
    pub difficulty: Difficulty,
}

/// Result of a retarget computation.
///
/// `InsufficientHistory` mirrors genesis bootstrap: fewer than `window`
/// ancestors exist yet. It is a value, not an error, and must never be
/// conflated with an invalid block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetargetOutcome {
    /// The required difficulty for the next block.
    Required(Difficulty),
    /// Fewer than `window` ancestors were available.
    InsufficientHistory,
}

/// Fraction of the window trimmed from each end of the sorted timestamp
/// list before measuring solve time (denominator; 6 = one sixth per side).
const OUTLIER_CUT_DENOM: usize = 6;

/// Compute the required difficulty from a window of ancestor entries.
///
/// `entries` is the contiguous ancestor sequence walking back from the
/// parent of the block being retargeted, most recent first or oldest first
/// (order does not matter; timestamps are sorted internally).
pub fn retarget(entries: &[WindowEntry], params: &SidechainParams) -> RetargetOutcome {
    let n = entries.len();
    if (n as u64) < params.window || n < 2 {
        return RetargetOutcome::InsufficientHistory;
    }

    let mut timestamps: Vec<u64> = entries.iter().map(|e| e.timestamp).collect();
    timestamps.sort_unstable();

    let mut cut = n / OUTLIER_CUT_DENOM;
    if n - 2 * cut < 2 {
        cut = (n - 2) / 2;
    }
    let trimmed = &timestamps[cut..n - cut];
    let k = trimmed.len() as u64;

    let delta_t = (trimmed[trimmed.len() - 1] - trimmed[0]).max(1);
    let avg_solve = (delta_t / (k - 1)).max(1);

    let diff_sum: Difficulty = entries.iter().map(|e| e.difficulty).sum();
    let avg_diff = diff_sum.div_u64(n as u64);

    let required = avg_diff
        .saturating_mul_u64(params.target_block_time)
        .div_u64(avg_solve);

    RetargetOutcome::Required(required.max(params.min_difficulty))
}
