//! Database manager (C4): the single entry point for persisting blocks
//! and serving anti-entropy fetches.
//!
//! Owns the block store and the map of per-chain indices exclusively; a
//! block, once ingested, is shared-read by anything that can name it by
//! `(ChainId, Dot)`. Observers are notified with a chain id and an
//! ordered list of newly-consistent dots — never with the blocks
//! themselves, forcing a re-read through this manager.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::block::{Block, CreateParams};
use crate::chain_index::{ChainIndex, Frontier, FrontierDiff};
use crate::store::BlockStore;
use crate::types::{ChainId, Dot, Hash, Links, SeqNum};

/// Opaque peer identity, conventionally the peer's public key bytes.
pub type PeerId = Vec<u8>;

/// Parameters for [`DatabaseManager::create_block`]: everything about a
/// new block except its chain position, which is derived from the
/// author's (and, optionally, the community's) current chain state.
pub struct NewBlockParams {
    pub block_type: Vec<u8>,
    pub transaction: Vec<u8>,
    pub public_key: Vec<u8>,
    pub com_prefix: Vec<u8>,
    pub com_id: ChainId,
    pub timestamp: u64,
}

/// Fan-out topic an observer subscribes to, per §9's "dynamic dict-keyed
/// observers by topic" re-expression as a tagged variant.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ObserverTopic {
    /// Every chain touched by ingestion.
    All,
    /// Only personal chains (keyed by an author's public key).
    Personal,
    /// Only community/group chains.
    Group,
    /// One specific chain.
    Chain(ChainId),
}

type ObserverCallback = Box<dyn Fn(&ChainId, &[Dot]) + Send + Sync>;

/// Internal record of an ingested block's dual chain touches.
enum ChainKind {
    Personal,
    Group,
}

/// The database manager (C4).
///
/// Generic over the block store backend `S` so the same manager code
/// works atop [`crate::store::InMemoryBlockStore`] or
/// [`crate::store::RocksDbBlockStore`].
pub struct DatabaseManager<S: BlockStore> {
    store: Mutex<S>,
    chains: Mutex<HashMap<ChainId, Arc<Mutex<ChainIndex>>>>,
    closure_cache_capacity: usize,
    last_reconcile_point: Mutex<HashMap<(ChainId, PeerId), SeqNum>>,
    last_known_frontier: Mutex<HashMap<(ChainId, PeerId), Frontier>>,
    observers: Mutex<Vec<(ObserverTopic, ObserverCallback)>>,
}

impl<S: BlockStore> DatabaseManager<S> {
    pub fn new(store: S, closure_cache_capacity: usize) -> Self {
        Self {
            store: Mutex::new(store),
            chains: Mutex::new(HashMap::new()),
            closure_cache_capacity,
            last_reconcile_point: Mutex::new(HashMap::new()),
            last_known_frontier: Mutex::new(HashMap::new()),
            observers: Mutex::new(Vec::new()),
        }
    }

    fn chain_handle(&self, chain_id: &ChainId) -> Arc<Mutex<ChainIndex>> {
        let mut chains = self.chains.lock().expect("chain map lock poisoned");
        chains
            .entry(chain_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(ChainIndex::new(self.closure_cache_capacity))))
            .clone()
    }

    /// Ingests a block into the block store and all chains it touches.
    ///
    /// No-op if the block is already known by hash. Emits newly-consistent
    /// dots, in order, to every observer registered for a matching topic.
    pub fn add_block(&self, block_blob: &[u8], block: &Block) {
        let hash = block.hash();
        {
            let mut store = self.store.lock().expect("store lock poisoned");
            if store.has_block(&hash).unwrap_or(false) {
                return;
            }
            let _ = store.put_block(&hash, block_blob);
            let _ = store.put_tx(&hash, &block.transaction);
            let _ = store.put_extra(&hash, &block.block_type);
        }

        let mut prefixed_com_id = block.com_prefix.clone();
        prefixed_com_id.extend_from_slice(block.com_id.as_bytes());
        let personal_chain_id = ChainId::new(block.public_key.clone());

        self.ingest_into_chain(
            &personal_chain_id,
            ChainKind::Personal,
            block.previous.clone(),
            block.sequence_number,
            hash,
        );

        if !block.com_id.as_bytes().is_empty() {
            let community_chain_id = ChainId::new(prefixed_com_id);
            self.ingest_into_chain(
                &community_chain_id,
                ChainKind::Group,
                block.links.clone(),
                block.com_seq_num,
                hash,
            );
        }
    }

    /// Builds an unsigned block whose `previous`/`links`/`sequence_number`/
    /// `com_seq_num` are picked from the author's personal chain (and, if
    /// `com_id` is non-empty, the community chain) current terminal —
    /// mirroring `BamiBlock.create`. When `use_consistent_links` is true
    /// (the normal case), the *consistent* terminal is used, so a new
    /// block never extends a still-inconsistent head; set it to `false`
    /// to extend the raw terminal instead. Callers still sign and ingest
    /// the result themselves.
    pub fn create_block(&self, params: NewBlockParams, use_consistent_links: bool) -> Block {
        let personal_chain_id = ChainId::new(params.public_key.clone());
        let (previous, sequence_number) =
            self.next_links_and_seq(&personal_chain_id, use_consistent_links);

        let has_community = !params.com_id.as_bytes().is_empty();
        let (links, com_seq_num) = if has_community {
            let mut prefixed_com_id = params.com_prefix.clone();
            prefixed_com_id.extend_from_slice(params.com_id.as_bytes());
            let community_chain_id = ChainId::new(prefixed_com_id);
            self.next_links_and_seq(&community_chain_id, use_consistent_links)
        } else {
            (Links::empty(), 0)
        };

        Block::create(CreateParams {
            block_type: params.block_type,
            transaction: params.transaction,
            public_key: params.public_key,
            sequence_number,
            previous,
            links,
            com_prefix: params.com_prefix,
            com_id: params.com_id,
            com_seq_num,
            timestamp: params.timestamp,
        })
    }

    fn next_links_and_seq(&self, chain_id: &ChainId, use_consistent_links: bool) -> (Links, SeqNum) {
        let handle = self.chain_handle(chain_id);
        let idx = handle.lock().expect("chain index lock poisoned");
        let terminal = if use_consistent_links {
            idx.consistent_terminal()
        } else {
            idx.terminal()
        };
        let links = Links::new(terminal.iter().cloned());
        let next_seq = idx.max_known_seq_num() + 1;
        (links, next_seq)
    }

    fn ingest_into_chain(
        &self,
        chain_id: &ChainId,
        kind: ChainKind,
        links: crate::types::Links,
        seq: SeqNum,
        hash: Hash,
    ) {
        let handle = self.chain_handle(chain_id);
        let newly_consistent = {
            let mut idx = handle.lock().expect("chain index lock poisoned");
            idx.add_block(links, seq, hash)
        };

        {
            let mut store = self.store.lock().expect("store lock poisoned");
            for dot in &newly_consistent {
                let _ = store.put_dot(chain_id, dot, &hash);
            }
        }

        if newly_consistent.is_empty() {
            return;
        }
        self.notify(chain_id, &kind, &newly_consistent);
    }

    fn notify(&self, chain_id: &ChainId, kind: &ChainKind, dots: &[Dot]) {
        let observers = self.observers.lock().expect("observer lock poisoned");
        for (topic, callback) in observers.iter() {
            let matches = match topic {
                ObserverTopic::All => true,
                ObserverTopic::Personal => matches!(kind, ChainKind::Personal),
                ObserverTopic::Group => matches!(kind, ChainKind::Group),
                ObserverTopic::Chain(id) => id == chain_id,
            };
            if matches {
                callback(chain_id, dots);
            }
        }
    }

    /// Registers an observer callback for `topic`.
    pub fn add_observer<F>(&self, topic: ObserverTopic, callback: F)
    where
        F: Fn(&ChainId, &[Dot]) + Send + Sync + 'static,
    {
        self.observers
            .lock()
            .expect("observer lock poisoned")
            .push((topic, Box::new(callback)));
    }

    /// Reconciles a peer's frontier against our chain index, creating the
    /// chain if we haven't seen it before. On an empty diff, advances
    /// `last_reconcile_point` to the peer's maximum terminal sequence
    /// number.
    pub fn reconcile(
        &self,
        chain_id: &ChainId,
        frontier: &Frontier,
        peer_id: &PeerId,
        max_extra_dots: u32,
    ) -> FrontierDiff {
        let handle = self.chain_handle(chain_id);
        let key = (chain_id.clone(), peer_id.clone());
        let last_point = *self
            .last_reconcile_point
            .lock()
            .expect("last_reconcile_point lock poisoned")
            .get(&key)
            .unwrap_or(&0);

        let diff = {
            let mut idx = handle.lock().expect("chain index lock poisoned");
            idx.reconcile(frontier, last_point, max_extra_dots)
        };

        self.last_known_frontier
            .lock()
            .expect("last_known_frontier lock poisoned")
            .insert(key.clone(), frontier.clone());

        if diff.is_empty() {
            let new_point = frontier.terminal.iter().map(|d| d.seq_num).max().unwrap_or(0);
            self.last_reconcile_point
                .lock()
                .expect("last_reconcile_point lock poisoned")
                .insert(key, new_point);
        }

        diff
    }

    /// The set of block blobs satisfying `diff` for `chain_id`.
    ///
    /// Any short-hash the peer advertised via `diff.conflicts` extra-dot
    /// maps that we lack ourselves is appended to `out_to_request`, for a
    /// future reconcile round.
    pub fn get_block_blobs_by_frontier_diff(
        &self,
        chain_id: &ChainId,
        diff: &FrontierDiff,
        out_to_request: &mut Vec<Dot>,
    ) -> Vec<Vec<u8>> {
        let handle = self.chain_handle(chain_id);
        let idx = handle.lock().expect("chain index lock poisoned");
        let mut blobs = Vec::new();

        for seq in diff.missing.expand() {
            if let Some(shs) = idx.get_all_short_hash_by_seq_num(seq) {
                for sh in shs {
                    let dot = Dot::new(seq, sh);
                    if let Some(blob) = self.fetch_dot_blob(chain_id, &dot) {
                        blobs.push(blob);
                    }
                }
            }
        }

        for (conflict, extra_map) in &diff.conflicts {
            if extra_map.is_empty() {
                if let Some(blob) = self.fetch_dot_blob(chain_id, conflict) {
                    blobs.push(blob);
                }
                continue;
            }

            let mut start_seqs: Vec<SeqNum> = Vec::new();
            for (seq, peer_short_hashes) in extra_map {
                let ours = idx
                    .get_all_short_hash_by_seq_num(*seq)
                    .unwrap_or_default();
                let peer_set: std::collections::BTreeSet<_> =
                    peer_short_hashes.iter().cloned().collect();
                if ours != peer_set {
                    start_seqs.push(*seq);
                    for sh in peer_short_hashes {
                        if !ours.contains(sh) {
                            out_to_request.push(Dot::new(*seq, *sh));
                        }
                    }
                }
            }
            start_seqs.sort_unstable();

            if let Some(&first_divergent_seq) = start_seqs.first() {
                for start_dot in idx.get_dots_by_seq_num(first_divergent_seq) {
                    self.walk_forward_to(&idx, chain_id, start_dot, *conflict, &mut blobs);
                }
            } else if let Some(blob) = self.fetch_dot_blob(chain_id, conflict) {
                blobs.push(blob);
            }
        }

        blobs
    }

    fn walk_forward_to(
        &self,
        idx: &ChainIndex,
        chain_id: &ChainId,
        start: Dot,
        target: Dot,
        out: &mut Vec<Vec<u8>>,
    ) {
        let mut current = start;
        loop {
            if let Some(blob) = self.fetch_dot_blob(chain_id, &current) {
                out.push(blob);
            }
            if current == target {
                break;
            }
            let next = idx
                .get_next_links(&current)
                .and_then(|links| links.as_slice().iter().find(|d| **d != current).copied());
            match next {
                Some(n) => current = n,
                None => break,
            }
        }
    }

    fn fetch_dot_blob(&self, chain_id: &ChainId, dot: &Dot) -> Option<Vec<u8>> {
        let store = self.store.lock().expect("store lock poisoned");
        let hash = store.get_hash_by_dot(chain_id, dot).ok()??;
        store.get_block(&hash).ok()?
    }

    pub fn get_block_blob_by_dot(&self, chain_id: &ChainId, dot: &Dot) -> Option<Vec<u8>> {
        self.fetch_dot_blob(chain_id, dot)
    }

    pub fn get_tx_blob_by_dot(&self, chain_id: &ChainId, dot: &Dot) -> Option<Vec<u8>> {
        let store = self.store.lock().expect("store lock poisoned");
        let hash = store.get_hash_by_dot(chain_id, dot).ok()??;
        store.get_tx(&hash).ok()?
    }

    pub fn has_block(&self, hash: &Hash) -> bool {
        self.store
            .lock()
            .expect("store lock poisoned")
            .has_block(hash)
            .unwrap_or(false)
    }

    /// Every chain this manager has ever created an index for.
    pub fn known_chain_ids(&self) -> Vec<ChainId> {
        self.chains
            .lock()
            .expect("chain map lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Returns the current frontier of `chain_id`, if the chain exists.
    pub fn get_chain_frontier(&self, chain_id: &ChainId) -> Option<Frontier> {
        let chains = self.chains.lock().expect("chain map lock poisoned");
        let handle = chains.get(chain_id)?.clone();
        drop(chains);
        Some(handle.lock().expect("chain index lock poisoned").frontier())
    }

    pub fn close(&self) {
        let _ = self.store.lock().expect("store lock poisoned").close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, CreateParams};
    use crate::store::InMemoryBlockStore;
    use crate::types::Links;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_block(seq: SeqNum, pub_key: &[u8]) -> Block {
        Block::create(CreateParams {
            block_type: b"demo".to_vec(),
            transaction: b"payload".to_vec(),
            public_key: pub_key.to_vec(),
            sequence_number: seq,
            previous: if seq == 1 {
                Links::new(vec![Dot::GENESIS])
            } else {
                Links::empty()
            },
            links: Links::empty(),
            com_prefix: Vec::new(),
            com_id: ChainId::new(Vec::new()),
            com_seq_num: 0,
            timestamp: 1_700_000_000_000,
        })
    }

    #[test]
    fn add_block_is_a_no_op_when_already_known() {
        let manager = DatabaseManager::new(InMemoryBlockStore::new(), 1024);
        let block = sample_block(1, b"alice");
        let bytes = crate::wire::encode(&block);

        manager.add_block(&bytes, &block);
        manager.add_block(&bytes, &block);

        let chain_id = ChainId::new(b"alice".to_vec());
        let frontier = manager.get_chain_frontier(&chain_id).unwrap();
        assert_eq!(frontier.terminal.len(), 1);
    }

    #[test]
    fn observers_receive_newly_consistent_dots_for_matching_topic() {
        let manager = DatabaseManager::new(InMemoryBlockStore::new(), 1024);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        manager.add_observer(ObserverTopic::Personal, move |_chain_id, dots| {
            count_clone.fetch_add(dots.len(), Ordering::SeqCst);
        });

        let block = sample_block(1, b"alice");
        let bytes = crate::wire::encode(&block);
        manager.add_block(&bytes, &block);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reconcile_advances_last_reconcile_point_on_empty_diff() {
        let manager = DatabaseManager::new(InMemoryBlockStore::new(), 1024);
        let block = sample_block(1, b"alice");
        let bytes = crate::wire::encode(&block);
        manager.add_block(&bytes, &block);

        let chain_id = ChainId::new(b"alice".to_vec());
        let frontier = manager.get_chain_frontier(&chain_id).unwrap();
        let peer: PeerId = b"peer-1".to_vec();

        let diff = manager.reconcile(&chain_id, &frontier, &peer, 5);
        assert!(diff.is_empty());
    }

    #[test]
    fn create_block_chains_off_the_consistent_terminal() {
        let manager = DatabaseManager::new(InMemoryBlockStore::new(), 1024);

        let first = manager.create_block(
            NewBlockParams {
                block_type: b"demo".to_vec(),
                transaction: b"one".to_vec(),
                public_key: b"alice".to_vec(),
                com_prefix: Vec::new(),
                com_id: ChainId::new(Vec::new()),
                timestamp: 1,
            },
            true,
        );
        assert_eq!(first.sequence_number, 1);
        assert_eq!(first.previous.as_slice(), &[Dot::GENESIS]);

        let first_bytes = crate::wire::encode(&first);
        manager.add_block(&first_bytes, &first);

        let second = manager.create_block(
            NewBlockParams {
                block_type: b"demo".to_vec(),
                transaction: b"two".to_vec(),
                public_key: b"alice".to_vec(),
                com_prefix: Vec::new(),
                com_id: ChainId::new(Vec::new()),
                timestamp: 2,
            },
            true,
        );
        assert_eq!(second.sequence_number, 2);
        assert_eq!(second.previous.as_slice(), &[first.pers_dot()]);
    }
}
