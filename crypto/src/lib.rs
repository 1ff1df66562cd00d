//! Cryptographic helpers for the sidepool engine.
//!
//! - **Blake2b** for template ids, consensus ids, and seed derivation
//! - Deterministic transaction-seed derivation (chained and fresh forms)
//! - The `KeyDerivation` seam consumed during coinbase verification
//!
//! Curve arithmetic and proof-of-work functions are out of scope here;
//! collaborators supply them behind the traits in this crate and in
//! `sidepool-mainchain`.

pub mod derive;
pub mod hash;

pub use derive::{derive_chained_seed, derive_fresh_seed, KeyDerivation};
pub use hash::{blake2b_256, blake2b_256_multi, hash_template, merge_mining_id};
