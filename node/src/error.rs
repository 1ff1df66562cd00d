//! Node-level errors.

use thiserror::Error;

/// Errors raised outside the consensus engine itself.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),
}
