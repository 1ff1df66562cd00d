//! Consensus-critical reward splitting.
//!
//! The split is part of block validity: every implementation must produce
//! bit-identical payouts for the same input, so the rounding rule here is
//! fixed and must not be changed. Rewards are distributed left to right
//! over the (already compacted, address-sorted) share list using cumulative
//! integer division; the running difference construction guarantees the
//! payouts sum to the total exactly.

use crate::share::Share;

/// Split `total` proportionally to each share's weight.
///
/// Returns one payout per input share, in input order, with
/// `sum(payouts) == total` exactly. Returns `None` for an empty share list
/// or a zero total weight.
///
/// Weights are right-shifted until their sum fits in 64 bits so that every
/// intermediate product fits in u128. The shift is derived from the sum, so
/// all implementations normalize identically.
pub fn split_reward(total: u64, shares: &[Share]) -> Option<Vec<u64>> {
    if shares.is_empty() {
        return None;
    }

    let mut sum: u128 = 0;
    for share in shares {
        sum = sum.saturating_add(share.weight.as_u128());
    }
    if sum == 0 {
        return None;
    }

    let shift = (128 - sum.leading_zeros()).saturating_sub(64);
    let weights: Vec<u128> = shares
        .iter()
        .map(|s| s.weight.as_u128() >> shift)
        .collect();
    let total_weight: u128 = weights.iter().sum();
    if total_weight == 0 {
        return None;
    }

    let mut payouts = Vec::with_capacity(shares.len());
    let mut cumulative: u128 = 0;
    let mut paid: u128 = 0;
    for w in weights {
        cumulative += w;
        let due = total as u128 * cumulative / total_weight;
        payouts.push((due - paid) as u64);
        paid = due;
    }

    Some(payouts)
}
