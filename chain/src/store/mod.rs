//! Block store (C2): content-addressed persistence of block bytes and
//! the two small indices that let the chain index and database manager
//! resolve a `(ChainId, Dot)` to a block without re-walking the DAG.
//!
//! Four logical tables, as in §6 of the persisted-state layout: `blocks`
//! (hash → block blob), `txs` (hash → transaction blob), `extras` (hash →
//! small metadata blob, e.g. block type), `dots` (chain_id‖encoded_dot →
//! hash). Any `get_*` miss is "absent", never an error; only genuine
//! storage-layer failures are surfaced as [`StorageError`].

pub mod mem;
pub mod rocksdb_store;

pub use mem::InMemoryBlockStore;
pub use rocksdb_store::{RocksDbBlockStore, RocksDbConfig};

use crate::types::{ChainId, Dot, Hash};

/// Storage-level error type.
#[derive(Debug)]
pub enum StorageError {
    RocksDb(rocksdb::Error),
    MissingColumnFamily(&'static str),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::RocksDb(e) => write!(f, "rocksdb error: {e}"),
            StorageError::MissingColumnFamily(cf) => write!(f, "missing column family: {cf}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<rocksdb::Error> for StorageError {
    fn from(e: rocksdb::Error) -> Self {
        StorageError::RocksDb(e)
    }
}

/// Builds the `dots` column family key for `chain_id‖encoded_dot`.
pub fn dot_key(chain_id: &ChainId, dot: &Dot) -> Vec<u8> {
    let mut key = Vec::with_capacity(chain_id.as_bytes().len() + 8);
    key.extend_from_slice(chain_id.as_bytes());
    key.extend_from_slice(&dot.seq_num.to_be_bytes());
    key.extend_from_slice(dot.short_hash.as_bytes());
    key
}

/// Abstract storage interface used by the chain index and database
/// manager. Implementations can be backed by in-memory maps, RocksDB,
/// etc; the interface only needs idempotent puts and fallible-absent
/// gets.
pub trait BlockStore {
    fn put_block(&mut self, hash: &Hash, block_blob: &[u8]) -> Result<(), StorageError>;
    fn get_block(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError>;

    fn put_tx(&mut self, hash: &Hash, tx_blob: &[u8]) -> Result<(), StorageError>;
    fn get_tx(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError>;

    fn put_extra(&mut self, hash: &Hash, extra_blob: &[u8]) -> Result<(), StorageError>;
    fn get_extra(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError>;

    fn put_dot(&mut self, chain_id: &ChainId, dot: &Dot, hash: &Hash) -> Result<(), StorageError>;
    fn get_hash_by_dot(
        &self,
        chain_id: &ChainId,
        dot: &Dot,
    ) -> Result<Option<Hash>, StorageError>;

    fn has_block(&self, hash: &Hash) -> Result<bool, StorageError> {
        Ok(self.get_block(hash)?.is_some())
    }

    /// Flushes and releases resources. A no-op for in-memory stores.
    fn close(&mut self) -> Result<(), StorageError>;
}
