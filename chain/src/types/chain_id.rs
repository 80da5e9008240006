//! Chain identifiers.
//!
//! A chain is named by an optional one-byte prefix (distinguishing
//! sub-communities, e.g. a witnessing chain from a regular one) followed
//! by an opaque community identifier. Concatenated together they form the
//! key under which [`crate::db::DatabaseManager`] looks up a
//! [`crate::chain_index::ChainIndex`].

use serde::{Deserialize, Serialize};

/// Opaque chain identifier: an optional single-byte prefix plus a
/// community id, carried as one flat byte buffer.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ChainId(Vec<u8>);

impl ChainId {
    /// Identifier for the implicit "no sub-community" chain.
    pub const EMPTY: &'static [u8] = &[];

    /// Builds a chain id from a prefix byte (use `0` for "no prefix") and
    /// a community id.
    pub fn with_prefix(prefix: u8, com_id: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(1 + com_id.len());
        buf.push(prefix);
        buf.extend_from_slice(com_id);
        ChainId(buf)
    }

    /// Builds a chain id with no prefix byte, from a raw community id.
    pub fn new(com_id: impl Into<Vec<u8>>) -> Self {
        ChainId(com_id.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChainId({})", hex::encode(&self.0))
    }
}

impl From<Vec<u8>> for ChainId {
    fn from(bytes: Vec<u8>) -> Self {
        ChainId(bytes)
    }
}
