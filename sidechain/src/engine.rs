//! The `SideChain` engine facade.
//!
//! Concurrency contract: one readers-writer lock protects the combined
//! store, verification flags, depth propagation, and tip selection as a
//! single critical section per operation; cross-index consistency must be
//! atomic with respect to insert and prune, so these are deliberately not
//! finer-grained locks. The dedup filter has its own lock and is consulted
//! first, before the DAG lock, to reject duplicates cheaply. The chain tip
//! and current PPLNS difficulty are read far more often than written and
//! are exposed as an atomically swapped snapshot so hot-path reads (e.g.
//! template building) never block on the DAG lock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use sidepool_crypto::KeyDerivation;
use sidepool_mainchain::MainchainLookup;
use sidepool_rewards::{compact, Share};
use sidepool_types::{BlockId, Difficulty, SidechainParams, Timestamp, UNCLE_BLOCK_DEPTH};
use tracing::{debug, info, warn};

use crate::block::PoolBlock;
use crate::error::SideChainError;
use crate::event::ChainEvent;
use crate::fork::{is_longer_chain, propagate_depths};
use crate::seen::DedupFilter;
use crate::shares::get_shares;
use crate::store::BlockStore;
use crate::verify::{check_block, required_difficulty, SeedCache, VerifyContext, VerifyOutcome};

/// Lock-free view of the canonical tip for hot-path readers.
#[derive(Clone, Debug)]
pub struct TipSnapshot {
    /// Template id of the tip; zero before the first verified block.
    pub id: BlockId,
    pub height: u64,
    pub cumulative_difficulty: Difficulty,
    /// Required difficulty for the next block built on this tip.
    pub pplns_difficulty: Difficulty,
}

/// Outcome of `add_block` for a block that was not rejected outright.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    /// The block entered the DAG and verified as valid.
    Added { events: Vec<ChainEvent> },
    /// The exact block (by `FullId` or template id) was already known.
    AlreadySeen,
    /// The block entered the DAG but verification is deferred. `missing`
    /// lists ancestors to request from peers; an empty list means every
    /// ancestor is present but at least one is still pending.
    Deferred {
        missing: Vec<BlockId>,
        events: Vec<ChainEvent>,
    },
}

struct ChainState {
    store: BlockStore,
    tip: Option<BlockId>,
    seed_cache: SeedCache,
}

/// The sidechain consensus engine.
pub struct SideChain {
    params: Arc<SidechainParams>,
    derivation: Arc<dyn KeyDerivation>,
    mainchain: Option<Arc<dyn MainchainLookup>>,
    inner: RwLock<ChainState>,
    seen: Mutex<DedupFilter>,
    tip_snapshot: RwLock<Arc<TipSnapshot>>,
    synchronized: AtomicBool,
    sync_target: AtomicU64,
}

impl SideChain {
    pub fn new(
        params: Arc<SidechainParams>,
        derivation: Arc<dyn KeyDerivation>,
        mainchain: Option<Arc<dyn MainchainLookup>>,
    ) -> Self {
        let dedup_capacity = 4 * params.prune_distance() as usize;
        let snapshot = TipSnapshot {
            id: BlockId::ZERO,
            height: 0,
            cumulative_difficulty: Difficulty::ZERO,
            pplns_difficulty: params.min_difficulty,
        };
        Self {
            params,
            derivation,
            mainchain,
            inner: RwLock::new(ChainState {
                store: BlockStore::new(),
                tip: None,
                seed_cache: SeedCache::new(),
            }),
            seen: Mutex::new(DedupFilter::new(dedup_capacity)),
            tip_snapshot: RwLock::new(Arc::new(snapshot)),
            synchronized: AtomicBool::new(false),
            sync_target: AtomicU64::new(0),
        }
    }

    pub fn params(&self) -> &SidechainParams {
        &self.params
    }

    /// Add a block received from a peer or built locally.
    ///
    /// Verification failures are recorded on the block and surfaced as a
    /// descriptive, non-fatal error; the engine keeps operating. The
    /// returned events must be dispatched by the caller (outside any engine
    /// lock); they are fire-and-forget.
    pub fn add_block(
        &self,
        block: PoolBlock,
        now: Timestamp,
    ) -> Result<AddOutcome, SideChainError> {
        let full_id = block.full_id(&self.params);
        {
            let mut seen = self.seen.lock().expect("dedup lock poisoned");
            if seen.seen(full_id) {
                return Ok(AddOutcome::AlreadySeen);
            }
        }

        let mut state = self.inner.write().expect("chain lock poisoned");
        let Some(id) = state.store.insert(block, &self.params, now) else {
            return Ok(AddOutcome::AlreadySeen);
        };
        propagate_depths(&mut state.store, id);

        let mut events = Vec::new();
        let resolution = self.run_verification(&mut state, id, &mut events);
        self.refresh_tip_snapshot(&state);
        drop(state);

        match resolution {
            VerifyOutcome::Valid => Ok(AddOutcome::Added { events }),
            VerifyOutcome::Pending { missing } => Ok(AddOutcome::Deferred { missing, events }),
            VerifyOutcome::Invalid(error) => Err(SideChainError::Verification(error)),
        }
    }

    /// Work-list verification cascade seeded by the inserted block.
    ///
    /// Every newly verified block re-seeds the blocks at the next
    /// `UNCLE_BLOCK_DEPTH` heights, so children deferred on a pending
    /// ancestor are re-evaluated without an explicit re-submit. An explicit
    /// queue bounds stack depth on attacker-length chains.
    fn run_verification(
        &self,
        state: &mut ChainState,
        inserted: BlockId,
        events: &mut Vec<ChainEvent>,
    ) -> VerifyOutcome {
        let ctx = VerifyContext {
            params: &self.params,
            derivation: self.derivation.as_ref(),
            mainchain: self.mainchain.as_deref(),
        };

        let mut queue: VecDeque<BlockId> = VecDeque::new();
        queue.push_back(inserted);
        let mut inserted_outcome = VerifyOutcome::Pending { missing: Vec::new() };

        while let Some(id) = queue.pop_front() {
            let Some(block) = state.store.get(&id) else {
                continue;
            };
            if block.verified {
                continue;
            }
            let height = block.side.height;

            let outcome = check_block(&state.store, &ctx, &mut state.seed_cache, &id);
            match &outcome {
                VerifyOutcome::Valid => {
                    if let Some(block) = state.store.get_mut(&id) {
                        block.verified = true;
                        block.invalid = false;
                    }
                    debug!(%id, height, "block verified");
                    events.push(ChainEvent::StoreBlock(id));
                    events.push(ChainEvent::Broadcast(id));

                    self.consider_tip(state, id, events);

                    // Anything at the next few heights may have been waiting
                    // on this block as parent or uncle.
                    for h in height + 1..=height + UNCLE_BLOCK_DEPTH {
                        for candidate in state.store.blocks_at_height(h) {
                            queue.push_back(*candidate);
                        }
                    }
                }
                VerifyOutcome::Invalid(error) => {
                    if let Some(block) = state.store.get_mut(&id) {
                        block.verified = true;
                        block.invalid = true;
                    }
                    warn!(%id, height, %error, "block invalid");
                    // Blocks listing this one as parent or uncle fail their
                    // own ancestor check; evaluate them now.
                    for h in height + 1..=height + UNCLE_BLOCK_DEPTH {
                        for candidate in state.store.blocks_at_height(h) {
                            queue.push_back(*candidate);
                        }
                    }
                }
                VerifyOutcome::Pending { .. } => {
                    debug!(%id, height, "verification deferred");
                }
            }

            if id == inserted {
                inserted_outcome = outcome;
            }
        }

        inserted_outcome
    }

    /// Fork choice for a newly verified block.
    fn consider_tip(&self, state: &mut ChainState, candidate_id: BlockId, events: &mut Vec<ChainEvent>) {
        let better = match state.tip {
            None => true,
            Some(tip_id) => {
                let (Some(tip), Some(candidate)) = (
                    state.store.get(&tip_id),
                    state.store.get(&candidate_id),
                ) else {
                    return;
                };
                is_longer_chain(tip, candidate)
            }
        };
        if !better {
            return;
        }

        state.tip = Some(candidate_id);
        events.push(ChainEvent::TipUpdated(candidate_id));
        let height = state
            .store
            .get(&candidate_id)
            .map(|b| b.side.height)
            .unwrap_or(0);
        info!(id = %candidate_id, height, "chain tip updated");

        // First transition from catching-up to caught-up: invalidate the
        // derivation memo and raise the one-time synchronized flag.
        if !self.synchronized.load(Ordering::Acquire)
            && height >= self.sync_target.load(Ordering::Acquire)
        {
            self.synchronized.store(true, Ordering::Release);
            state.seed_cache.clear();
            events.push(ChainEvent::Synchronized);
            info!(height, "sidechain synchronized");
        }
    }

    /// Recompute the lock-free tip snapshot from the current state.
    fn refresh_tip_snapshot(&self, state: &ChainState) {
        let snapshot = match state.tip.and_then(|id| state.store.get(&id)) {
            Some(tip) => TipSnapshot {
                id: tip.cached_id,
                height: tip.side.height,
                cumulative_difficulty: tip.side.cumulative_difficulty,
                pplns_difficulty: required_difficulty(&state.store, tip, &self.params),
            },
            None => TipSnapshot {
                id: BlockId::ZERO,
                height: 0,
                cumulative_difficulty: Difficulty::ZERO,
                pplns_difficulty: self.params.min_difficulty,
            },
        };
        *self.tip_snapshot.write().expect("snapshot lock poisoned") = Arc::new(snapshot);
    }

    /// Record the highest chain height any peer has claimed; drives the
    /// one-time synchronized transition.
    pub fn update_sync_target(&self, height: u64) {
        self.sync_target.fetch_max(height, Ordering::AcqRel);
    }

    pub fn is_synchronized(&self) -> bool {
        self.synchronized.load(Ordering::Acquire)
    }

    /// Cheap snapshot of the canonical tip; never touches the DAG lock.
    pub fn tip(&self) -> Arc<TipSnapshot> {
        self.tip_snapshot
            .read()
            .expect("snapshot lock poisoned")
            .clone()
    }

    /// Clone of a stored block.
    pub fn get_block(&self, id: &BlockId) -> Option<PoolBlock> {
        self.inner
            .read()
            .expect("chain lock poisoned")
            .store
            .get(id)
            .cloned()
    }

    /// Template ids of all candidates at a height.
    pub fn blocks_at_height(&self, height: u64) -> Vec<BlockId> {
        self.inner
            .read()
            .expect("chain lock poisoned")
            .store
            .blocks_at_height(height)
            .to_vec()
    }

    pub fn block_count(&self) -> usize {
        self.inner.read().expect("chain lock poisoned").store.len()
    }

    /// Compacted PPLNS shares for the window ending at the current tip.
    pub fn pplns_shares(&self) -> Option<Vec<Share>> {
        let state = self.inner.read().expect("chain lock poisoned");
        let tip = state.tip?;
        get_shares(&state.store, tip, &self.params).map(compact)
    }

    /// Compacted PPLNS shares for the window ending at `tip`.
    pub fn shares_at(&self, tip: &BlockId) -> Option<Vec<Share>> {
        let state = self.inner.read().expect("chain lock poisoned");
        get_shares(&state.store, *tip, &self.params).map(compact)
    }

    /// The difficulty required of a block built on `parent`.
    pub fn required_difficulty_at(&self, parent: &BlockId) -> Option<Difficulty> {
        let state = self.inner.read().expect("chain lock poisoned");
        let parent = state.store.get(parent)?;
        Some(required_difficulty(&state.store, parent, &self.params))
    }

    /// Prune stale blocks and drop their dedup entries in tandem.
    ///
    /// Returns the number of blocks removed.
    pub fn prune(&self, now: Timestamp) -> usize {
        let mut state = self.inner.write().expect("chain lock poisoned");
        let Some(tip_id) = state.tip else {
            return 0;
        };
        let Some(tip_height) = state.store.get(&tip_id).map(|b| b.side.height) else {
            return 0;
        };

        let removed = state.store.prune(tip_height, &self.params, now);
        if removed.is_empty() {
            return 0;
        }

        // Release cached ancestor data for the removed blocks.
        let removed_ids: std::collections::HashSet<BlockId> =
            removed.iter().map(|f| f.template_id()).collect();
        state
            .seed_cache
            .retain(|(parent_id, _), _| !removed_ids.contains(parent_id));
        drop(state);

        let mut seen = self.seen.lock().expect("dedup lock poisoned");
        for full_id in &removed {
            seen.remove(full_id);
        }
        removed.len()
    }
}

impl SideChain {
    /// Build the next block template on the current tip (see
    /// [`crate::template`]). Takes the read lock only.
    pub fn build_template(&self, input: &crate::template::TemplateInput) -> PoolBlock {
        let state = self.inner.read().expect("chain lock poisoned");
        crate::template::build_template(
            &state.store,
            state.tip,
            &self.params,
            self.derivation.as_ref(),
            input,
        )
    }
}

/// Convenience verdict accessors used by callers inspecting stored blocks.
impl SideChain {
    /// `Some(true)` if valid, `Some(false)` if invalid, `None` if pending
    /// or unknown.
    pub fn verdict(&self, id: &BlockId) -> Option<bool> {
        let state = self.inner.read().expect("chain lock poisoned");
        let block = state.store.get(id)?;
        if !block.verified {
            return None;
        }
        Some(!block.invalid)
    }
}
