//! In-memory block store, useful for unit tests and small devnets.

use std::collections::HashMap;

use super::{BlockStore, StorageError, dot_key};
use crate::types::{ChainId, Dot, Hash};

/// In-memory implementation of [`BlockStore`].
#[derive(Default)]
pub struct InMemoryBlockStore {
    blocks: HashMap<Hash, Vec<u8>>,
    txs: HashMap<Hash, Vec<u8>>,
    extras: HashMap<Hash, Vec<u8>>,
    dots: HashMap<Vec<u8>, Hash>,
}

impl InMemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl BlockStore for InMemoryBlockStore {
    fn put_block(&mut self, hash: &Hash, block_blob: &[u8]) -> Result<(), StorageError> {
        self.blocks.entry(*hash).or_insert_with(|| block_blob.to_vec());
        Ok(())
    }

    fn get_block(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.blocks.get(hash).cloned())
    }

    fn put_tx(&mut self, hash: &Hash, tx_blob: &[u8]) -> Result<(), StorageError> {
        self.txs.entry(*hash).or_insert_with(|| tx_blob.to_vec());
        Ok(())
    }

    fn get_tx(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.txs.get(hash).cloned())
    }

    fn put_extra(&mut self, hash: &Hash, extra_blob: &[u8]) -> Result<(), StorageError> {
        self.extras
            .entry(*hash)
            .or_insert_with(|| extra_blob.to_vec());
        Ok(())
    }

    fn get_extra(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.extras.get(hash).cloned())
    }

    fn put_dot(&mut self, chain_id: &ChainId, dot: &Dot, hash: &Hash) -> Result<(), StorageError> {
        self.dots.entry(dot_key(chain_id, dot)).or_insert(*hash);
        Ok(())
    }

    fn get_hash_by_dot(
        &self,
        chain_id: &ChainId,
        dot: &Dot,
    ) -> Result<Option<Hash>, StorageError> {
        Ok(self.dots.get(&dot_key(chain_id, dot)).copied())
    }

    fn close(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_get_block_roundtrip() {
        let mut store = InMemoryBlockStore::new();
        let hash = Hash::compute(b"block bytes");
        store.put_block(&hash, b"block bytes").unwrap();

        let fetched = store.get_block(&hash).unwrap().expect("present");
        assert_eq!(fetched, b"block bytes");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn put_block_is_idempotent() {
        let mut store = InMemoryBlockStore::new();
        let hash = Hash::compute(b"x");
        store.put_block(&hash, b"x").unwrap();
        store.put_block(&hash, b"x").unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn dot_lookup_is_scoped_by_chain_id() {
        let mut store = InMemoryBlockStore::new();
        let hash = Hash::compute(b"x");
        let dot = Dot::new(1, hash.short());
        let chain_a = ChainId::new(b"a".to_vec());
        let chain_b = ChainId::new(b"b".to_vec());

        store.put_dot(&chain_a, &dot, &hash).unwrap();

        assert_eq!(store.get_hash_by_dot(&chain_a, &dot).unwrap(), Some(hash));
        assert_eq!(store.get_hash_by_dot(&chain_b, &dot).unwrap(), None);
    }

    #[test]
    fn missing_entries_are_absent_not_errors() {
        let store = InMemoryBlockStore::new();
        let hash = Hash::compute(b"nope");
        assert_eq!(store.get_block(&hash).unwrap(), None);
        assert_eq!(store.get_tx(&hash).unwrap(), None);
    }
}
