//! RocksDB-backed block store.
//!
//! Persists blocks and their indices in four column families, matching
//! the persisted-state layout of §6: `"blocks"`, `"txs"`, `"extras"`,
//! `"dots"`.

use std::{path::Path, sync::Arc};

use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, DB, Options};

use super::{BlockStore, StorageError, dot_key};
use crate::types::{ChainId, Dot, HASH_LEN, Hash};

/// Configuration for [`RocksDbBlockStore`].
#[derive(Clone, Debug)]
pub struct RocksDbConfig {
    /// Filesystem path to the RocksDB database directory.
    pub path: String,
    /// Whether to create the database and missing column families if
    /// they do not yet exist.
    pub create_if_missing: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "data/chain-db".to_string(),
            create_if_missing: true,
        }
    }
}

const CF_BLOCKS: &str = "blocks";
const CF_TXS: &str = "txs";
const CF_EXTRAS: &str = "extras";
const CF_DOTS: &str = "dots";

/// RocksDB-backed implementation of [`BlockStore`].
pub struct RocksDbBlockStore {
    db: DB,
}

impl RocksDbBlockStore {
    /// Opens (or creates) a RocksDB-backed block store at the given path.
    ///
    /// On open the store does not iterate existing data — per-chain
    /// indices are rebuilt lazily as blocks are re-fed into the database
    /// manager, per §6.
    pub fn open(cfg: &RocksDbConfig) -> Result<Self, StorageError> {
        let path = Path::new(&cfg.path);

        let mut opts = Options::default();
        opts.create_if_missing(cfg.create_if_missing);
        opts.create_missing_column_families(cfg.create_if_missing);

        let cfs = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new(CF_BLOCKS, Options::default()),
            ColumnFamilyDescriptor::new(CF_TXS, Options::default()),
            ColumnFamilyDescriptor::new(CF_EXTRAS, Options::default()),
            ColumnFamilyDescriptor::new(CF_DOTS, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self { db })
    }

    fn cf(&self, name: &'static str) -> Result<Arc<BoundColumnFamily<'_>>, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or(StorageError::MissingColumnFamily(name))
    }

    fn get(&self, cf_name: &'static str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let cf = self.cf(cf_name)?;
        Ok(self.db.get_cf(&cf, key)?)
    }

    fn put(&self, cf_name: &'static str, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(&cf, key, value)?;
        Ok(())
    }
}

impl BlockStore for RocksDbBlockStore {
    fn put_block(&mut self, hash: &Hash, block_blob: &[u8]) -> Result<(), StorageError> {
        if self.has_block(hash)? {
            return Ok(());
        }
        self.put(CF_BLOCKS, hash.as_bytes(), block_blob)
    }

    fn get_block(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError> {
        self.get(CF_BLOCKS, hash.as_bytes())
    }

    fn put_tx(&mut self, hash: &Hash, tx_blob: &[u8]) -> Result<(), StorageError> {
        self.put(CF_TXS, hash.as_bytes(), tx_blob)
    }

    fn get_tx(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError> {
        self.get(CF_TXS, hash.as_bytes())
    }

    fn put_extra(&mut self, hash: &Hash, extra_blob: &[u8]) -> Result<(), StorageError> {
        self.put(CF_EXTRAS, hash.as_bytes(), extra_blob)
    }

    fn get_extra(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError> {
        self.get(CF_EXTRAS, hash.as_bytes())
    }

    fn put_dot(&mut self, chain_id: &ChainId, dot: &Dot, hash: &Hash) -> Result<(), StorageError> {
        self.put(CF_DOTS, &dot_key(chain_id, dot), hash.as_bytes())
    }

    fn get_hash_by_dot(
        &self,
        chain_id: &ChainId,
        dot: &Dot,
    ) -> Result<Option<Hash>, StorageError> {
        let key = dot_key(chain_id, dot);
        match self.get(CF_DOTS, &key)? {
            None => Ok(None),
            Some(bytes) => {
                if bytes.len() != HASH_LEN {
                    return Ok(None);
                }
                let mut arr = [0u8; HASH_LEN];
                arr.copy_from_slice(&bytes);
                Ok(Some(Hash(arr)))
            }
        }
    }

    fn close(&mut self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, RocksDbBlockStore) {
        let tmp = TempDir::new().expect("create temp dir");
        let cfg = RocksDbConfig {
            path: tmp.path().to_string_lossy().to_string(),
            create_if_missing: true,
        };
        let store = RocksDbBlockStore::open(&cfg).expect("open rocksdb");
        (tmp, store)
    }

    #[test]
    fn block_put_get_roundtrip() {
        let (_tmp, mut store) = open_store();
        let hash = Hash::compute(b"payload");
        store.put_block(&hash, b"payload").unwrap();
        assert_eq!(store.get_block(&hash).unwrap(), Some(b"payload".to_vec()));
    }

    #[test]
    fn dot_lookup_roundtrips_through_four_column_families() {
        let (_tmp, mut store) = open_store();
        let hash = Hash::compute(b"payload");
        let chain_id = ChainId::new(b"demo".to_vec());
        let dot = Dot::new(3, hash.short());

        store.put_block(&hash, b"payload").unwrap();
        store.put_tx(&hash, b"tx").unwrap();
        store.put_extra(&hash, b"meta").unwrap();
        store.put_dot(&chain_id, &dot, &hash).unwrap();

        assert_eq!(store.get_tx(&hash).unwrap(), Some(b"tx".to_vec()));
        assert_eq!(store.get_extra(&hash).unwrap(), Some(b"meta".to_vec()));
        assert_eq!(store.get_hash_by_dot(&chain_id, &dot).unwrap(), Some(hash));
    }
}
