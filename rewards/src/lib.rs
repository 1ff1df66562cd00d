//! PPLNS share accounting and reward distribution.
//!
//! The share walk itself lives in the sidechain crate (it needs the DAG);
//! this crate holds the pure, consensus-critical pieces: the share type,
//! deterministic compaction, and the exact integer reward split.

pub mod share;
pub mod split;

pub use share::{compact, Share};
pub use split::split_reward;
