//! The block DAG store.
//!
//! Holds every known candidate block behind three indices: by template id,
//! by merge-mining merkle root, and by height bucket. Index consistency is
//! a struct invariant; callers only see whole-operation methods. The DAG is
//! acyclic by construction (height strictly increases along every edge), so
//! parent and uncle references are stored as ids and resolved through the
//! store on demand.

use std::collections::{BTreeMap, HashMap};

use sidepool_types::{BlockId, FullId, MerkleRoot, SidechainParams, Timestamp};
use tracing::{debug, error};

use crate::block::PoolBlock;

/// All known candidate blocks, indexed three ways.
#[derive(Default)]
pub struct BlockStore {
    blocks: HashMap<BlockId, PoolBlock>,
    by_merkle_root: HashMap<MerkleRoot, BlockId>,
    by_height: BTreeMap<u64, Vec<BlockId>>,
}

impl BlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a block under all indices.
    ///
    /// Returns the template id if the block was new, `None` if a block with
    /// the same template id is already present (idempotent insert).
    /// Insertion never fails structurally; malformed blocks are rejected at
    /// decode time by the serialization layer before reaching the store.
    pub fn insert(
        &mut self,
        mut block: PoolBlock,
        params: &SidechainParams,
        now: Timestamp,
    ) -> Option<BlockId> {
        let id = block.template_id(params);
        if self.blocks.contains_key(&id) {
            return None;
        }

        block.cached_id = id;
        block.received_at = now;

        if block.merkle_root != MerkleRoot::ZERO {
            self.by_merkle_root.insert(block.merkle_root, id);
        }
        self.by_height.entry(block.side.height).or_default().push(id);
        self.blocks.insert(id, block);

        debug!(%id, "block inserted");
        Some(id)
    }

    pub fn get(&self, id: &BlockId) -> Option<&PoolBlock> {
        self.blocks.get(id)
    }

    pub fn get_mut(&mut self, id: &BlockId) -> Option<&mut PoolBlock> {
        self.blocks.get_mut(id)
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.blocks.contains_key(id)
    }

    pub fn get_by_merkle_root(&self, root: &MerkleRoot) -> Option<&PoolBlock> {
        let id = self.by_merkle_root.get(root)?;
        match self.blocks.get(id) {
            Some(block) => Some(block),
            None => {
                // Index inconsistency is a programming-invariant violation;
                // degrade to a miss rather than corrupting or crashing.
                error!(%id, "merkle-root index points at a missing block");
                None
            }
        }
    }

    /// Template ids of every block at a height (competing candidates share
    /// a bucket).
    pub fn blocks_at_height(&self, height: u64) -> &[BlockId] {
        self.by_height.get(&height).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Remove stale blocks below `tip_height`.
    ///
    /// A block is a candidate once it sits more than the prune distance
    /// below the tip and its depth confirms it is buried that far, or once
    /// its age exceeds the grace period (which reclaims orphaned
    /// side-branches that never confirmed). A candidate still referenced as
    /// parent or uncle by a block staying outside this prune cycle is
    /// retained, so the horizon advances one fence block at a time and no
    /// block above the horizon ever dangles.
    ///
    /// Returns the `FullId`s of removed blocks so the dedup filter can drop
    /// them in tandem.
    pub fn prune(
        &mut self,
        tip_height: u64,
        params: &SidechainParams,
        now: Timestamp,
    ) -> Vec<FullId> {
        let distance = params.prune_distance();
        let grace = params.prune_grace_secs();
        let Some(height_floor) = tip_height.checked_sub(distance) else {
            return Vec::new();
        };

        let mut candidates: Vec<BlockId> = Vec::new();
        for (&height, ids) in self.by_height.range(..height_floor) {
            for id in ids {
                let Some(block) = self.blocks.get(id) else {
                    error!(%id, height, "height index points at a missing block");
                    continue;
                };
                let buried = block.depth >= distance;
                let expired = block.received_at.has_expired(grace, now);
                if buried || expired {
                    candidates.push(*id);
                }
            }
        }
        if candidates.is_empty() {
            return Vec::new();
        }

        // Never remove a block a surviving block still links to.
        let removing: std::collections::HashSet<BlockId> = candidates.iter().copied().collect();
        let mut referenced: std::collections::HashSet<BlockId> = std::collections::HashSet::new();
        for block in self.blocks.values() {
            if removing.contains(&block.cached_id) {
                continue;
            }
            referenced.insert(block.side.parent);
            referenced.extend(block.side.uncles.iter().copied());
        }

        let mut removed = Vec::new();
        for id in candidates {
            if referenced.contains(&id) {
                continue;
            }
            if let Some(block) = self.blocks.remove(&id) {
                if block.merkle_root != MerkleRoot::ZERO {
                    self.by_merkle_root.remove(&block.merkle_root);
                }
                if let Some(bucket) = self.by_height.get_mut(&block.side.height) {
                    bucket.retain(|b| b != &id);
                    if bucket.is_empty() {
                        self.by_height.remove(&block.side.height);
                    }
                }
                removed.push(block.full_id(params));
            }
        }

        if !removed.is_empty() {
            debug!(count = removed.len(), tip_height, "pruned stale blocks");
        }
        removed
    }
}
