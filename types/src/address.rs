//! Miner address type.
//!
//! A miner is identified by its public address pair (spend key + view key,
//! 32 bytes each). Ordering and equality are over the raw bytes: share
//! compaction sorts by this ordering, so it must be identical across
//! implementations.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// A miner's public address: spend public key followed by view public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MinerAddress([u8; 64]);

impl MinerAddress {
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Build an address from its two component keys.
    pub fn from_keys(spend: [u8; 32], view: [u8; 32]) -> Self {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&spend);
        bytes[32..].copy_from_slice(&view);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// The spend public key half.
    pub fn spend_key(&self) -> [u8; 32] {
        self.0[..32].try_into().expect("fixed split")
    }

    /// The view public key half.
    pub fn view_key(&self) -> [u8; 32] {
        self.0[32..].try_into().expect("fixed split")
    }
}

impl PartialOrd for MinerAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MinerAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.as_slice().cmp(other.0.as_slice())
    }
}

impl fmt::Debug for MinerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MinerAddress(")?;
        for b in &self.0[..4] {
            write!(f, "{:02x}", b)?;
        }
        write!(f, "\u{2026})")
    }
}

impl fmt::Display for MinerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl Serialize for MinerAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for MinerAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AddrVisitor;

        impl<'de> serde::de::Visitor<'de> for AddrVisitor {
            type Value = MinerAddress;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "64 bytes")
            }

            fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                let arr: [u8; 64] = v
                    .try_into()
                    .map_err(|_| E::invalid_length(v.len(), &self))?;
                Ok(MinerAddress(arr))
            }

            fn visit_seq<A: serde::de::SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> Result<Self::Value, A::Error> {
                let mut arr = [0u8; 64];
                for (i, byte) in arr.iter_mut().enumerate() {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| serde::de::Error::invalid_length(i, &self))?;
                }
                Ok(MinerAddress(arr))
            }
        }

        deserializer.deserialize_bytes(AddrVisitor)
    }
}
