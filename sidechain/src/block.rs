//! Candidate sidechain blocks.
//!
//! A `PoolBlock` couples a primary-chain block template with the side-data
//! that places it in the sidechain DAG. The template id is a hash over both
//! parts plus the consensus id; field order and the zeroing convention in
//! the hashing blobs are consensus-relevant and must not change.

use serde::{Deserialize, Serialize};
use sidepool_crypto::hash_template;
use sidepool_types::{
    BlockId, ChainId, Difficulty, FullId, MerkleRoot, MinerAddress, SidechainParams, Timestamp,
};

/// One coinbase output of the primary-chain template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinbaseOutput {
    /// Payout amount in atomic units.
    pub amount: u64,
    /// One-time output public key derived from the payee's address.
    pub ephemeral_pubkey: [u8; 32],
    /// One-byte view tag for scan acceleration.
    pub view_tag: u8,
}

/// The primary-chain template segment of a pool block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainchainData {
    /// Primary-chain height this template would be mined at.
    pub height: u64,
    /// Primary-chain block the template builds on.
    pub prev_id: ChainId,
    /// Template timestamp in seconds.
    pub timestamp: Timestamp,
    /// Total coinbase reward (base reward plus fees), atomic units.
    pub reward: u64,
    /// Coinbase outputs, one per PPLNS payee, in payee order.
    pub outputs: Vec<CoinbaseOutput>,
    /// Per-miner extra nonce.
    pub extra_nonce: u32,
    /// Template nonce; zeroed in the template-id preimage.
    pub nonce: u32,
}

/// The sidechain segment of a pool block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideData {
    /// Address the miner of this block wants credited.
    pub miner: MinerAddress,
    /// Template id of the parent block; zero for genesis.
    pub parent: BlockId,
    /// Template ids of included uncles, strictly ascending.
    pub uncles: Vec<BlockId>,
    /// Sidechain height.
    pub height: u64,
    /// Difficulty this block was mined at.
    pub difficulty: Difficulty,
    /// Parent's cumulative difficulty + own + every counted uncle's.
    pub cumulative_difficulty: Difficulty,
    /// Deterministically derived coinbase transaction seed.
    pub tx_seed: ChainId,
}

/// A candidate sidechain block.
///
/// The consensus fields (`mainchain`, `side`, `merkle_root`) are immutable
/// after construction; the trailing fields are runtime state owned by the
/// store and the verification machine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolBlock {
    pub mainchain: MainchainData,
    pub side: SideData,
    /// Merge-mining merkle root this block is committed under.
    pub merkle_root: MerkleRoot,
    /// Merkle path proving inclusion under `merkle_root` (share-version ≥ 3).
    pub merkle_proof: Vec<[u8; 32]>,

    /// Whether the verification state machine has reached a verdict.
    pub verified: bool,
    /// Verdict, meaningful once `verified` is true.
    pub invalid: bool,
    /// Distance in hops from the nearest known chain tip.
    pub depth: u64,
    /// When this block entered the store (drives age-based pruning).
    pub received_at: Timestamp,
    /// Template id, cached by the store at insertion.
    pub cached_id: BlockId,
}

impl PoolBlock {
    /// Construct an unverified block from its consensus fields.
    pub fn new(mainchain: MainchainData, side: SideData, merkle_root: MerkleRoot) -> Self {
        Self {
            mainchain,
            side,
            merkle_root,
            merkle_proof: Vec::new(),
            verified: false,
            invalid: false,
            depth: 0,
            received_at: Timestamp::EPOCH,
            cached_id: BlockId::ZERO,
        }
    }

    /// The genesis block for a parameter set.
    pub fn genesis(params: &SidechainParams) -> Self {
        let mainchain = MainchainData {
            height: 0,
            prev_id: ChainId::ZERO,
            timestamp: Timestamp::EPOCH,
            reward: 0,
            outputs: Vec::new(),
            extra_nonce: 0,
            nonce: 0,
        };
        let side = SideData {
            miner: MinerAddress::new([0u8; 64]),
            parent: BlockId::ZERO,
            uncles: Vec::new(),
            height: 0,
            difficulty: params.min_difficulty,
            cumulative_difficulty: params.min_difficulty,
            tx_seed: params.consensus_id(),
        };
        Self::new(mainchain, side, MerkleRoot::ZERO)
    }

    /// Whether this is a genesis block position.
    pub fn is_genesis(&self) -> bool {
        self.side.height == 0
    }

    /// Compute the template id: Blake2b-256 over the zeroed main-chain blob,
    /// the side-data blob, and the consensus id (merge-mining id for
    /// share-version ≥ 3).
    pub fn template_id(&self, params: &SidechainParams) -> BlockId {
        let main_blob = self.mainchain_hashing_blob();
        let side_blob = self.side_hashing_blob();
        let domain = if params.share_version >= 3 {
            sidepool_crypto::hash::merge_mining_id(&params.consensus_id())
        } else {
            params.consensus_id()
        };
        hash_template(&[&main_blob, &side_blob, domain.as_bytes()])
    }

    /// The dedup identity: template id plus miner fingerprint and extra-nonce.
    pub fn full_id(&self, params: &SidechainParams) -> FullId {
        let id = if self.cached_id.is_zero() {
            self.template_id(params)
        } else {
            self.cached_id
        };
        FullId::new(id, &self.side.miner, self.mainchain.extra_nonce)
    }

    /// Serialize the primary-chain segment for hashing, with the nonce and
    /// the merkle-root commitment zeroed (they commit to the template id,
    /// which is what this blob is producing).
    fn mainchain_hashing_blob(&self) -> Vec<u8> {
        let m = &self.mainchain;
        let mut blob = Vec::with_capacity(64 + m.outputs.len() * 41);
        blob.extend_from_slice(&m.height.to_le_bytes());
        blob.extend_from_slice(m.prev_id.as_bytes());
        blob.extend_from_slice(&m.timestamp.as_secs().to_le_bytes());
        blob.extend_from_slice(&m.reward.to_le_bytes());
        blob.extend_from_slice(&(m.outputs.len() as u64).to_le_bytes());
        for out in &m.outputs {
            blob.extend_from_slice(&out.amount.to_le_bytes());
            blob.extend_from_slice(&out.ephemeral_pubkey);
            blob.push(out.view_tag);
        }
        blob.extend_from_slice(&m.extra_nonce.to_le_bytes());
        blob.extend_from_slice(&0u32.to_le_bytes()); // nonce, zeroed
        blob.extend_from_slice(&[0u8; 32]); // merkle root, zeroed
        blob
    }

    /// Serialize the sidechain segment for hashing.
    fn side_hashing_blob(&self) -> Vec<u8> {
        let s = &self.side;
        let mut blob = Vec::with_capacity(160 + s.uncles.len() * 32);
        blob.extend_from_slice(s.miner.as_bytes());
        blob.extend_from_slice(s.parent.as_bytes());
        blob.extend_from_slice(&(s.uncles.len() as u64).to_le_bytes());
        for uncle in &s.uncles {
            blob.extend_from_slice(uncle.as_bytes());
        }
        blob.extend_from_slice(&s.height.to_le_bytes());
        blob.extend_from_slice(&s.difficulty.to_le_bytes());
        blob.extend_from_slice(&s.cumulative_difficulty.to_le_bytes());
        blob.extend_from_slice(s.tx_seed.as_bytes());
        blob
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SidechainParams {
        SidechainParams::dev_defaults()
    }

    #[test]
    fn genesis_shape() {
        let p = params();
        let g = PoolBlock::genesis(&p);
        assert!(g.is_genesis());
        assert!(g.side.parent.is_zero());
        assert!(g.side.uncles.is_empty());
        assert_eq!(g.side.difficulty, p.min_difficulty);
        assert_eq!(g.side.cumulative_difficulty, p.min_difficulty);
        assert_eq!(g.side.tx_seed, p.consensus_id());
    }

    #[test]
    fn template_id_ignores_nonce_and_merkle_root() {
        let p = params();
        let mut a = PoolBlock::genesis(&p);
        let mut b = a.clone();
        a.mainchain.nonce = 7;
        b.mainchain.nonce = 99;
        b.merkle_root = MerkleRoot([5u8; 32]);
        assert_eq!(a.template_id(&p), b.template_id(&p));
    }

    #[test]
    fn template_id_covers_side_fields() {
        let p = params();
        let a = PoolBlock::genesis(&p);
        let mut b = a.clone();
        b.side.height = 1;
        assert_ne!(a.template_id(&p), b.template_id(&p));

        let mut c = a.clone();
        c.side.uncles.push(BlockId::new([1; 32]));
        assert_ne!(a.template_id(&p), c.template_id(&p));
    }

    #[test]
    fn template_id_covers_extra_nonce() {
        let p = params();
        let a = PoolBlock::genesis(&p);
        let mut b = a.clone();
        b.mainchain.extra_nonce = 1;
        assert_ne!(a.template_id(&p), b.template_id(&p));
    }

    #[test]
    fn share_version_3_changes_domain() {
        let p2 = params();
        let p3 = SidechainParams::new(
            p2.network,
            p2.target_block_time,
            p2.min_difficulty,
            p2.window,
            p2.uncle_penalty_percent,
            3,
        );
        let block = PoolBlock::genesis(&p2);
        assert_ne!(block.template_id(&p2), block.template_id(&p3));
    }

    #[test]
    fn full_id_distinguishes_miners() {
        let p = params();
        let a = PoolBlock::genesis(&p);
        let mut b = a.clone();
        b.side.miner = MinerAddress::new([9u8; 64]);
        // Different miners also mean different template ids here, but the
        // FullId must differ even via the fingerprint alone.
        assert_ne!(a.full_id(&p), b.full_id(&p));
    }
}
