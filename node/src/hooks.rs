//! Side-effect hooks.
//!
//! The consensus core returns events from its mutating operations; the node
//! maps them onto these fire-and-forget hooks outside the engine's locks.
//! Hook implementations own their error handling: nothing they do feeds
//! back into consensus state.

use sidepool_sidechain::PoolBlock;

/// Persistence and relay callbacks supplied by the embedding application.
pub trait PoolHooks: Send + Sync {
    /// Persist a block that verified as valid.
    fn store(&self, block: &PoolBlock);

    /// Relay a block to peers.
    fn broadcast(&self, block: &PoolBlock);

    /// The canonical chain tip changed.
    fn update_tip(&self, block: &PoolBlock);

    /// The engine caught up with the network (fires once).
    fn synchronized(&self) {}
}

/// No-op hooks for tests and tools that only need the engine.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullHooks;

impl PoolHooks for NullHooks {
    fn store(&self, _block: &PoolBlock) {}
    fn broadcast(&self, _block: &PoolBlock) {}
    fn update_tip(&self, _block: &PoolBlock) {}
}
