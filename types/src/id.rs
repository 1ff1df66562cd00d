//! Full block identity for duplicate suppression.
//!
//! Two miners can produce blocks with identical template ids that differ
//! only in mining address or extra-nonce. The `FullId` appends a short
//! fingerprint of those fields so the dedup filter distinguishes them.

use crate::address::MinerAddress;
use crate::hash::BlockId;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Template id plus an 8-byte miner fingerprint and the 4-byte extra-nonce.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FullId {
    template_id: BlockId,
    fingerprint: [u8; 8],
    extra_nonce: u32,
}

impl FullId {
    pub fn new(template_id: BlockId, miner: &MinerAddress, extra_nonce: u32) -> Self {
        Self {
            template_id,
            fingerprint: miner_fingerprint(miner),
            extra_nonce,
        }
    }

    pub fn template_id(&self) -> BlockId {
        self.template_id
    }
}

/// First 8 bytes of Blake2b-256 over the raw address bytes.
fn miner_fingerprint(miner: &MinerAddress) -> [u8; 8] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(miner.as_bytes());
    let digest = hasher.finalize();
    digest[..8].try_into().expect("fixed split")
}

impl fmt::Debug for FullId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FullId({:?}, {:02x}{:02x}\u{2026}, {})",
            self.template_id, self.fingerprint[0], self.fingerprint[1], self.extra_nonce
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> MinerAddress {
        MinerAddress::new([n; 64])
    }

    #[test]
    fn same_inputs_same_id() {
        let id = BlockId::new([1; 32]);
        assert_eq!(FullId::new(id, &addr(7), 3), FullId::new(id, &addr(7), 3));
    }

    #[test]
    fn differs_by_miner_and_nonce() {
        let id = BlockId::new([1; 32]);
        let base = FullId::new(id, &addr(7), 3);
        assert_ne!(base, FullId::new(id, &addr(8), 3));
        assert_ne!(base, FullId::new(id, &addr(7), 4));
    }

    #[test]
    fn template_id_accessor() {
        let id = BlockId::new([9; 32]);
        assert_eq!(FullId::new(id, &addr(1), 0).template_id(), id);
    }
}
