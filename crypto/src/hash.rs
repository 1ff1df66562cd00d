//! Blake2b hashing for template ids and derived seeds.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use sidepool_types::{BlockId, ChainId};

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash a template-id preimage blob to produce a `BlockId`.
pub fn hash_template(parts: &[&[u8]]) -> BlockId {
    BlockId::new(blake2b_256_multi(parts))
}

/// The merge-mining domain id used in template-id preimages for
/// share-version ≥ 3.
pub fn merge_mining_id(consensus_id: &ChainId) -> ChainId {
    ChainId(blake2b_256_multi(&[b"merge-mining", consensus_id.as_bytes()]))
}
