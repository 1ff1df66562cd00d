//! The pool node: engine plus event dispatch.

use std::sync::Arc;

use sidepool_crypto::KeyDerivation;
use sidepool_mainchain::MainchainLookup;
use sidepool_sidechain::{
    AddOutcome, ChainEvent, PoolBlock, SideChain, SideChainError, TemplateInput,
};
use sidepool_types::Timestamp;
use sidepool_utils::format_duration;
use tracing::debug;

use crate::config::PoolConfig;
use crate::hooks::PoolHooks;

/// A running pool node: the consensus engine wired to its collaborators.
///
/// The p2p layer, stratum server, and primary-chain ingestion all sit
/// outside this crate; they feed blocks in through [`PoolNode::submit_block`]
/// and receive side effects through the [`PoolHooks`] they supplied.
pub struct PoolNode {
    chain: Arc<SideChain>,
    hooks: Arc<dyn PoolHooks>,
    started_at: Timestamp,
}

impl PoolNode {
    pub fn new(
        config: &PoolConfig,
        derivation: Arc<dyn KeyDerivation>,
        mainchain: Option<Arc<dyn MainchainLookup>>,
        hooks: Arc<dyn PoolHooks>,
        now: Timestamp,
    ) -> Self {
        let chain = Arc::new(SideChain::new(
            Arc::new(config.params()),
            derivation,
            mainchain,
        ));
        Self {
            chain,
            hooks,
            started_at: now,
        }
    }

    /// The consensus engine, for read-side queries.
    pub fn chain(&self) -> &Arc<SideChain> {
        &self.chain
    }

    /// Feed a block into the engine and dispatch the resulting events.
    ///
    /// Verification failures pass through as non-fatal errors; the caller
    /// decides whether the sending peer deserves a penalty via
    /// [`SideChainError::is_ban_worthy`].
    pub fn submit_block(
        &self,
        block: PoolBlock,
        now: Timestamp,
    ) -> Result<AddOutcome, SideChainError> {
        let outcome = self.chain.add_block(block, now)?;
        match &outcome {
            AddOutcome::Added { events } | AddOutcome::Deferred { events, .. } => {
                self.dispatch(events);
            }
            AddOutcome::AlreadySeen => {}
        }
        Ok(outcome)
    }

    /// Build the next mining template on the current tip.
    pub fn build_template(&self, input: &TemplateInput) -> PoolBlock {
        self.chain.build_template(input)
    }

    /// Drop stale blocks; see the engine's pruning rules.
    pub fn prune(&self, now: Timestamp) -> usize {
        self.chain.prune(now)
    }

    /// One-line status summary for periodic logging.
    pub fn status(&self, now: Timestamp) -> String {
        let tip = self.chain.tip();
        format!(
            "tip height {} ({} blocks stored, up {})",
            tip.height,
            self.chain.block_count(),
            format_duration(self.started_at.elapsed_since(now)),
        )
    }

    fn dispatch(&self, events: &[ChainEvent]) {
        for event in events {
            match event {
                ChainEvent::StoreBlock(id) => {
                    if let Some(block) = self.chain.get_block(id) {
                        self.hooks.store(&block);
                    }
                }
                ChainEvent::Broadcast(id) => {
                    if let Some(block) = self.chain.get_block(id) {
                        self.hooks.broadcast(&block);
                    }
                }
                ChainEvent::TipUpdated(id) => {
                    if let Some(block) = self.chain.get_block(id) {
                        self.hooks.update_tip(&block);
                    }
                }
                ChainEvent::Synchronized => self.hooks.synchronized(),
            }
        }
        debug!(count = events.len(), "dispatched chain events");
    }
}

/// Fresh extra-nonce for a new local template; miners randomize this so
/// identical templates from different workers get distinct identities.
pub fn new_extra_nonce() -> u32 {
    rand::random()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidepool_sidechain::testing::StubDerivation;
    use sidepool_types::{ChainId, MinerAddress, NetworkId, Timestamp};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHooks {
        stored: AtomicUsize,
        broadcast: AtomicUsize,
        tips: Mutex<Vec<u64>>,
        synchronized: AtomicUsize,
    }

    impl PoolHooks for RecordingHooks {
        fn store(&self, _block: &PoolBlock) {
            self.stored.fetch_add(1, Ordering::Relaxed);
        }
        fn broadcast(&self, _block: &PoolBlock) {
            self.broadcast.fetch_add(1, Ordering::Relaxed);
        }
        fn update_tip(&self, block: &PoolBlock) {
            self.tips.lock().unwrap().push(block.side.height);
        }
        fn synchronized(&self) {
            self.synchronized.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn dev_config() -> PoolConfig {
        PoolConfig {
            network: NetworkId::Dev,
            ..Default::default()
        }
    }

    fn node_with_hooks() -> (PoolNode, Arc<RecordingHooks>) {
        let hooks = Arc::new(RecordingHooks::default());
        let node = PoolNode::new(
            &dev_config(),
            Arc::new(StubDerivation),
            None,
            hooks.clone(),
            Timestamp::new(500),
        );
        (node, hooks)
    }

    fn template_input(height: u64) -> TemplateInput {
        TemplateInput {
            miner: MinerAddress::new([7; 64]),
            mainchain_height: 3_000_000 + height,
            mainchain_prev: ChainId([0x22; 32]),
            timestamp: Timestamp::new(1_000 + height),
            reward: 1_000_000,
            extra_nonce: height as u32,
        }
    }

    #[test]
    fn submitted_blocks_reach_the_hooks() {
        let (node, hooks) = node_with_hooks();

        let genesis = node.build_template(&template_input(0));
        node.submit_block(genesis, Timestamp::new(1_000)).unwrap();

        for h in 1..=3 {
            let block = node.build_template(&template_input(h));
            node.submit_block(block, Timestamp::new(1_000 + h)).unwrap();
        }

        assert_eq!(hooks.stored.load(Ordering::Relaxed), 4);
        assert_eq!(hooks.broadcast.load(Ordering::Relaxed), 4);
        assert_eq!(*hooks.tips.lock().unwrap(), vec![0, 1, 2, 3]);
        // Sync target defaults to zero: the genesis tip already satisfies it.
        assert_eq!(hooks.synchronized.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn duplicate_submission_dispatches_nothing() {
        let (node, hooks) = node_with_hooks();
        let genesis = node.build_template(&template_input(0));
        node.submit_block(genesis.clone(), Timestamp::new(1_000))
            .unwrap();
        let stored = hooks.stored.load(Ordering::Relaxed);

        let outcome = node.submit_block(genesis, Timestamp::new(1_001)).unwrap();
        assert_eq!(outcome, AddOutcome::AlreadySeen);
        assert_eq!(hooks.stored.load(Ordering::Relaxed), stored);
    }

    #[test]
    fn status_mentions_tip_and_uptime() {
        let (node, _hooks) = node_with_hooks();
        let genesis = node.build_template(&template_input(0));
        node.submit_block(genesis, Timestamp::new(1_000)).unwrap();

        let status = node.status(Timestamp::new(560));
        assert!(status.contains("tip height 0"));
        assert!(status.contains("1 blocks stored"));
        assert!(status.contains("1m 0s"));
    }

    #[test]
    fn pool_block_round_trips_through_bincode_for_persistence() {
        let (node, _hooks) = node_with_hooks();
        let genesis = node.build_template(&template_input(0));

        let bytes = bincode::serialize(&genesis).unwrap();
        let decoded: PoolBlock = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded.side, genesis.side);
        assert_eq!(decoded.mainchain, genesis.mainchain);
    }

    #[test]
    fn extra_nonces_vary() {
        let a = new_extra_nonce();
        let b = new_extra_nonce();
        let c = new_extra_nonce();
        // Three consecutive draws are overwhelmingly unlikely to collide.
        assert!(a != b || b != c);
    }
}
