//! Content hashes.
//!
//! [`Hash`] is the full 32-byte BLAKE3-256 digest of a block's canonical
//! bytes. [`ShortHash`] is the 4-byte prefix used everywhere a block needs
//! to be referenced compactly (dots, version maps, link sets) without
//! paying for the full digest; collisions within a chain are treated as
//! an inconsistency rather than assumed away, see [`crate::chain_index`].

use serde::{Deserialize, Serialize};

/// Length in bytes of a full content hash.
pub const HASH_LEN: usize = 32;

/// Length in bytes of a short hash (the prefix used in dots).
pub const SHORT_HASH_LEN: usize = 4;

/// Full 256-bit BLAKE3 content hash.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// Computes a new [`Hash`] as the BLAKE3-256 hash of `data`.
    pub fn compute(data: &[u8]) -> Self {
        let h = blake3::hash(data);
        Hash(*h.as_bytes())
    }

    /// Returns the underlying 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Truncates this hash to its [`ShortHash`] prefix.
    pub fn short(&self) -> ShortHash {
        let mut buf = [0u8; SHORT_HASH_LEN];
        buf.copy_from_slice(&self.0[..SHORT_HASH_LEN]);
        ShortHash(buf)
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

/// 4-byte prefix of a [`Hash`], used as the compact identity of a block
/// within a single chain's version map and in [`crate::types::Dot`].
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ShortHash(pub [u8; SHORT_HASH_LEN]);

impl ShortHash {
    /// Zero short hash, used as part of the genesis dot.
    pub const ZERO: ShortHash = ShortHash([0u8; SHORT_HASH_LEN]);

    pub fn as_bytes(&self) -> &[u8; SHORT_HASH_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for ShortHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ShortHash({})", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_is_deterministic_prefix_of_full_hash() {
        let full = Hash::compute(b"hello world");
        let short = full.short();
        assert_eq!(&full.0[..SHORT_HASH_LEN], short.as_bytes());
    }

    #[test]
    fn compute_is_stable_for_same_input() {
        let a = Hash::compute(b"same bytes");
        let b = Hash::compute(b"same bytes");
        assert_eq!(a, b);
    }
}
