//! Fork choice and depth propagation.

use sidepool_types::{BlockId, UNCLE_BLOCK_DEPTH};
use tracing::trace;

use crate::block::PoolBlock;
use crate::store::BlockStore;

/// Whether `candidate` should replace `current` as the chain tip.
///
/// Strictly ordered: higher cumulative difficulty wins; ties break on the
/// referenced primary-chain height, then on the referenced primary-chain id
/// bytes, and finally on the template id (two candidates can reference the
/// same primary-chain block). Arrival time never participates, so every
/// peer resolves the same fork the same way, and
/// `is_longer_chain(a, b) && is_longer_chain(b, a)` is impossible.
pub fn is_longer_chain(current: &PoolBlock, candidate: &PoolBlock) -> bool {
    if candidate.side.cumulative_difficulty != current.side.cumulative_difficulty {
        return candidate.side.cumulative_difficulty > current.side.cumulative_difficulty;
    }
    if candidate.mainchain.height != current.mainchain.height {
        return candidate.mainchain.height > current.mainchain.height;
    }
    if candidate.mainchain.prev_id != current.mainchain.prev_id {
        return candidate.mainchain.prev_id.as_bytes() > current.mainchain.prev_id.as_bytes();
    }
    candidate.cached_id > current.cached_id
}

/// Propagate depths outward from `start`.
///
/// Walks backward to ancestors (parent and uncle links, incrementing) and
/// forward to descendants (decrementing), with an explicit work-stack:
/// chain length is attacker-influenceable and must not become call-stack
/// depth. Depth only ever increases, so re-running to a fixpoint never
/// changes a stable value.
pub(crate) fn propagate_depths(store: &mut BlockStore, start: BlockId) {
    let mut stack = vec![start];

    while let Some(id) = stack.pop() {
        let Some(block) = store.get(&id) else {
            continue;
        };
        let depth = block.depth;
        let height = block.side.height;
        let parent = block.side.parent;
        let uncles = block.side.uncles.clone();

        // Backward: every block this one links to sits one hop further
        // from the tip.
        let mut ancestors = uncles;
        if !parent.is_zero() {
            ancestors.push(parent);
        }
        for ancestor_id in ancestors {
            if let Some(ancestor) = store.get_mut(&ancestor_id) {
                if ancestor.depth < depth + 1 {
                    ancestor.depth = depth + 1;
                    trace!(%ancestor_id, depth = ancestor.depth, "depth raised");
                    stack.push(ancestor_id);
                }
            }
        }

        // Forward: any block linking to this one is at least one hop
        // closer to the tip.
        if depth > 0 {
            let mut descendants = Vec::new();
            for h in height + 1..=height + UNCLE_BLOCK_DEPTH {
                for candidate_id in store.blocks_at_height(h) {
                    let Some(candidate) = store.get(candidate_id) else {
                        continue;
                    };
                    let links = candidate.side.parent == id
                        || candidate.side.uncles.contains(&id);
                    if links && candidate.depth + 1 < depth {
                        descendants.push(*candidate_id);
                    }
                }
            }
            for descendant_id in descendants {
                if let Some(descendant) = store.get_mut(&descendant_id) {
                    descendant.depth = depth - 1;
                    stack.push(descendant_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{MainchainData, PoolBlock, SideData};
    use sidepool_types::{
        ChainId, Difficulty, MerkleRoot, MinerAddress, SidechainParams, Timestamp,
    };

    fn params() -> SidechainParams {
        SidechainParams::dev_defaults()
    }

    fn block_with(cumdiff: u64, main_height: u64, prev_byte: u8) -> PoolBlock {
        PoolBlock::new(
            MainchainData {
                height: main_height,
                prev_id: ChainId([prev_byte; 32]),
                timestamp: Timestamp::new(0),
                reward: 0,
                outputs: Vec::new(),
                extra_nonce: 0,
                nonce: 0,
            },
            SideData {
                miner: MinerAddress::new([1; 64]),
                parent: BlockId::ZERO,
                uncles: Vec::new(),
                height: 1,
                difficulty: Difficulty::from_u64(1),
                cumulative_difficulty: Difficulty::from_u64(cumdiff),
                tx_seed: ChainId::ZERO,
            },
            MerkleRoot::ZERO,
        )
    }

    #[test]
    fn higher_cumulative_difficulty_wins() {
        let a = block_with(100, 5, 1);
        let b = block_with(200, 5, 1);
        assert!(is_longer_chain(&a, &b));
        assert!(!is_longer_chain(&b, &a));
    }

    #[test]
    fn tie_breaks_on_mainchain_height_then_id() {
        let a = block_with(100, 5, 1);
        let b = block_with(100, 6, 1);
        assert!(is_longer_chain(&a, &b));
        assert!(!is_longer_chain(&b, &a));

        let c = block_with(100, 5, 2);
        assert!(is_longer_chain(&a, &c));
        assert!(!is_longer_chain(&c, &a));
    }

    #[test]
    fn never_longer_in_both_directions() {
        let cases = [
            (block_with(100, 5, 1), block_with(100, 5, 1)),
            (block_with(100, 5, 1), block_with(100, 5, 2)),
            (block_with(100, 5, 1), block_with(200, 4, 0)),
        ];
        for (a, b) in &cases {
            assert!(!(is_longer_chain(a, b) && is_longer_chain(b, a)));
        }
    }

    #[test]
    fn identical_candidate_is_not_longer() {
        let a = block_with(100, 5, 1);
        assert!(!is_longer_chain(&a, &a));
    }

    #[test]
    fn same_mainchain_reference_breaks_tie_on_template_id() {
        let mut a = block_with(100, 5, 1);
        let mut b = block_with(100, 5, 1);
        a.cached_id = BlockId::new([1; 32]);
        b.cached_id = BlockId::new([2; 32]);
        assert!(is_longer_chain(&a, &b));
        assert!(!is_longer_chain(&b, &a));
    }

    proptest::proptest! {
        // Fork choice is a strict order: never longer in both directions,
        // for arbitrary cumulative difficulties and tie-break inputs.
        #[test]
        fn fork_choice_is_antisymmetric(
            cd_a in proptest::prelude::any::<u64>(),
            cd_b in proptest::prelude::any::<u64>(),
            mh_a in 0u64..4,
            mh_b in 0u64..4,
            prev_a in 0u8..4,
            prev_b in 0u8..4,
            id_a in 0u8..4,
            id_b in 0u8..4,
        ) {
            let mut a = block_with(cd_a, mh_a, prev_a);
            let mut b = block_with(cd_b, mh_b, prev_b);
            a.cached_id = BlockId::new([id_a; 32]);
            b.cached_id = BlockId::new([id_b; 32]);
            proptest::prop_assert!(!(is_longer_chain(&a, &b) && is_longer_chain(&b, &a)));
        }
    }

    fn linked_block(miner: u8, parent: BlockId, height: u64) -> PoolBlock {
        let mut b = block_with(0, 100 + height, miner);
        b.side.miner = MinerAddress::new([miner; 64]);
        b.side.parent = parent;
        b.side.height = height;
        b
    }

    #[test]
    fn depths_increase_toward_genesis() {
        let p = params();
        let mut store = BlockStore::new();
        let mut parent = BlockId::ZERO;
        let mut ids = Vec::new();
        for h in 0..5 {
            let id = store
                .insert(linked_block(h as u8, parent, h), &p, Timestamp::new(h))
                .unwrap();
            propagate_depths(&mut store, id);
            ids.push(id);
            parent = id;
        }

        for (i, id) in ids.iter().enumerate() {
            assert_eq!(store.get(id).unwrap().depth, (ids.len() - 1 - i) as u64);
        }
    }

    #[test]
    fn depth_is_monotonic_under_repropagation() {
        let p = params();
        let mut store = BlockStore::new();
        let a = store
            .insert(linked_block(1, BlockId::ZERO, 0), &p, Timestamp::new(0))
            .unwrap();
        let b = store
            .insert(linked_block(2, a, 1), &p, Timestamp::new(1))
            .unwrap();
        propagate_depths(&mut store, b);
        let before = store.get(&a).unwrap().depth;

        propagate_depths(&mut store, b);
        propagate_depths(&mut store, a);
        assert_eq!(store.get(&a).unwrap().depth, before);
    }

    #[test]
    fn uncle_links_propagate_depth() {
        let p = params();
        let mut store = BlockStore::new();
        let g = store
            .insert(linked_block(1, BlockId::ZERO, 0), &p, Timestamp::new(0))
            .unwrap();
        let uncle = store
            .insert(linked_block(2, g, 1), &p, Timestamp::new(1))
            .unwrap();
        let mainline = store
            .insert(linked_block(3, g, 1), &p, Timestamp::new(1))
            .unwrap();
        let mut top = linked_block(4, mainline, 2);
        top.side.uncles.push(uncle);
        let tip = store.insert(top, &p, Timestamp::new(2)).unwrap();
        propagate_depths(&mut store, tip);

        assert_eq!(store.get(&tip).unwrap().depth, 0);
        assert_eq!(store.get(&mainline).unwrap().depth, 1);
        // The uncle is one hop from the tip via the uncle link.
        assert_eq!(store.get(&uncle).unwrap().depth, 1);
        assert_eq!(store.get(&g).unwrap().depth, 2);
    }
}
