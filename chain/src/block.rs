//! Block record (C1): the immutable, self-signed unit of the DAG.
//!
//! A block lives in two chains at once — the author's personal chain,
//! addressed by `(sequence_number, short_hash)`, and (optionally) a
//! community chain, addressed by `(com_seq_num, short_hash)`. Both
//! embeddings are first-class; [`Block::pers_dot`] and [`Block::com_dot`]
//! expose them directly rather than forcing callers to reconstruct a dot
//! from loose fields.

use serde::{Deserialize, Serialize};

use crate::types::{ChainId, Dot, Hash, Links, SeqNum};
use crate::wire;

/// Canonical, signable representation of a block.
///
/// `signature` is zeroed out when computing [`Block::hash`], matching the
/// wire format's "signature field zeroed for hashing" rule — the hash
/// must be stable across the sign step.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub block_type: Vec<u8>,
    pub transaction: Vec<u8>,
    pub public_key: Vec<u8>,
    pub sequence_number: SeqNum,
    pub previous: Links,
    pub links: Links,
    pub com_prefix: Vec<u8>,
    pub com_id: ChainId,
    pub com_seq_num: SeqNum,
    pub timestamp: u64,
    pub signature: Vec<u8>,
}

/// Parameters used to construct a new block, mirroring the public
/// `create_signed_block` surface of §6.
pub struct CreateParams {
    pub block_type: Vec<u8>,
    pub transaction: Vec<u8>,
    pub public_key: Vec<u8>,
    pub sequence_number: SeqNum,
    pub previous: Links,
    pub links: Links,
    pub com_prefix: Vec<u8>,
    pub com_id: ChainId,
    pub com_seq_num: SeqNum,
    pub timestamp: u64,
}

impl Block {
    /// Builds an unsigned block from the given parameters.
    pub fn create(params: CreateParams) -> Self {
        Block {
            block_type: params.block_type,
            transaction: params.transaction,
            public_key: params.public_key,
            sequence_number: params.sequence_number,
            previous: params.previous,
            links: params.links,
            com_prefix: params.com_prefix,
            com_id: params.com_id,
            com_seq_num: params.com_seq_num,
            timestamp: params.timestamp,
            signature: Vec::new(),
        }
    }

    /// A copy of this block with `signature` cleared, used as the input
    /// to both hashing and signing.
    fn unsigned(&self) -> Block {
        let mut b = self.clone();
        b.signature = Vec::new();
        b
    }

    /// Canonical bytes of this block with the signature field zeroed.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        wire::encode(&self.unsigned())
    }

    /// Content hash of this block: BLAKE3 over [`Block::canonical_bytes`].
    pub fn hash(&self) -> Hash {
        Hash::compute(&self.canonical_bytes())
    }

    /// This block's position in its author's personal chain.
    pub fn pers_dot(&self) -> Dot {
        Dot::new(self.sequence_number, self.hash().short())
    }

    /// This block's position in its community chain, if it has one.
    pub fn com_dot(&self) -> Option<Dot> {
        if self.com_id.as_bytes().is_empty() {
            None
        } else {
            Some(Dot::new(self.com_seq_num, self.hash().short()))
        }
    }

    /// Signs this block in place using `authenticator`.
    pub fn sign<A: BlockAuthenticator>(&mut self, authenticator: &A, signing_key: &A::SigningKey) {
        let bytes = self.unsigned_bytes_for_signing();
        self.signature = authenticator.sign(signing_key, &bytes);
    }

    /// The bytes a [`BlockAuthenticator`] signs and verifies over: the
    /// canonical encoding with the signature field cleared.
    pub fn unsigned_bytes_for_signing(&self) -> Vec<u8> {
        self.canonical_bytes()
    }

    /// Structural invariants independent of any signature scheme:
    /// sequence numbers are non-zero, and a community dot is only
    /// claimed when a community id is actually present.
    pub fn structurally_valid(&self) -> bool {
        self.sequence_number != 0
            && (self.com_id.as_bytes().is_empty() == (self.com_seq_num == 0))
    }
}

/// Pluggable signature scheme for blocks.
///
/// Concrete signature primitives are an explicit external collaborator:
/// the chain index and database manager only need to know whether a
/// block's signature is valid, never which scheme produced it. Swapping
/// implementations (ed25519, a post-quantum scheme, or a no-op for
/// tests) never touches [`crate::chain_index`] or [`crate::db`].
pub trait BlockAuthenticator {
    type SigningKey;

    /// Produces a detached signature over `bytes`.
    fn sign(&self, signing_key: &Self::SigningKey, bytes: &[u8]) -> Vec<u8>;

    /// Verifies `signature` over `bytes` against `public_key`.
    fn verify(&self, public_key: &[u8], bytes: &[u8], signature: &[u8]) -> bool;
}

/// Verifies a block's signature and declared-key structural consistency
/// using the given authenticator.
pub fn verify_block<A: BlockAuthenticator>(authenticator: &A, block: &Block) -> bool {
    if !block.structurally_valid() {
        return false;
    }
    let bytes = block.unsigned_bytes_for_signing();
    authenticator.verify(&block.public_key, &bytes, &block.signature)
}

/// An authenticator that accepts every block regardless of signature.
///
/// Useful for tests and for demos that have not wired in a real
/// signature scheme yet.
pub struct NullAuthenticator;

impl BlockAuthenticator for NullAuthenticator {
    type SigningKey = ();

    fn sign(&self, _signing_key: &(), _bytes: &[u8]) -> Vec<u8> {
        Vec::new()
    }

    fn verify(&self, _public_key: &[u8], _bytes: &[u8], _signature: &[u8]) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block(seq: SeqNum) -> Block {
        Block::create(CreateParams {
            block_type: b"demo".to_vec(),
            transaction: b"payload".to_vec(),
            public_key: vec![1, 2, 3],
            sequence_number: seq,
            previous: Links::empty(),
            links: Links::empty(),
            com_prefix: Vec::new(),
            com_id: ChainId::new(Vec::new()),
            com_seq_num: 0,
            timestamp: 1_700_000_000_000,
        })
    }

    #[test]
    fn hash_is_stable_across_signing() {
        let mut block = sample_block(1);
        let hash_before = block.hash();
        block.sign(&NullAuthenticator, &());
        let hash_after = block.hash();
        assert_eq!(hash_before, hash_after);
    }

    #[test]
    fn com_dot_is_none_without_a_community_id() {
        let block = sample_block(1);
        assert!(block.com_dot().is_none());
    }

    #[test]
    fn com_dot_is_some_with_a_community_id() {
        let mut block = sample_block(1);
        block.com_id = ChainId::new(b"group".to_vec());
        block.com_seq_num = 1;
        assert!(block.com_dot().is_some());
    }

    #[test]
    fn structurally_valid_rejects_zero_sequence_number() {
        let mut block = sample_block(1);
        block.sequence_number = 0;
        assert!(!block.structurally_valid());
    }

    #[test]
    fn null_authenticator_accepts_any_block() {
        let mut block = sample_block(1);
        block.sign(&NullAuthenticator, &());
        assert!(verify_block(&NullAuthenticator, &block));
    }
}
