//! Difficulty retargeting for the sidechain.

pub mod retarget;

pub use retarget::{retarget, RetargetOutcome, WindowEntry};
