//! Output events from mutating engine operations.
//!
//! The core never spawns its own tasks for side effects. Persistence,
//! broadcast, and tip notifications are returned as events from the
//! mutating call and dispatched by the caller outside the DAG lock; a
//! failed dispatch never feeds back into consensus state.

use sidepool_types::BlockId;

/// A side effect requested by the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainEvent {
    /// Persist the block (it verified as valid).
    StoreBlock(BlockId),
    /// Relay the block to peers.
    Broadcast(BlockId),
    /// The canonical chain tip changed.
    TipUpdated(BlockId),
    /// The engine caught up with the network for the first time.
    Synchronized,
}
