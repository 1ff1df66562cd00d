//! Deterministic test doubles.
//!
//! The real key-derivation module performs curve arithmetic; tests (here
//! and in dependent crates) substitute a Blake2b-based stand-in that is
//! deterministic and collision-resistant enough to exercise every
//! verification path.

use sidepool_crypto::{blake2b_256_multi, KeyDerivation};
use sidepool_types::{ChainId, MinerAddress};

/// Blake2b-backed [`KeyDerivation`] stand-in.
#[derive(Clone, Copy, Debug, Default)]
pub struct StubDerivation;

impl KeyDerivation for StubDerivation {
    fn ephemeral_public_key(
        &self,
        address: &MinerAddress,
        tx_seed: &ChainId,
        output_index: u32,
    ) -> ([u8; 32], u8) {
        let digest = blake2b_256_multi(&[
            b"ephemeral",
            address.as_bytes(),
            tx_seed.as_bytes(),
            &output_index.to_le_bytes(),
        ]);
        let tag = blake2b_256_multi(&[b"view-tag", &digest]);
        (digest, tag[0])
    }
}
