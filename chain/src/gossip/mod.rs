//! Gossip engine (C5): frontier-based anti-entropy over an abstract
//! transport.
//!
//! This module is deliberately transport-agnostic: [`PeerTransport`] is
//! the seam a concrete network layer plugs into (see
//! [`crate::block::BlockAuthenticator`] for the same pattern applied to
//! signatures). The engine only needs to push one-way [`GossipMessage`]s
//! to a named peer and to receive them back through its inbox channel;
//! how those messages cross a socket is somebody else's problem.

mod message;
mod selection;

pub use message::{GossipError, GossipMessage};
pub use selection::{PeerSelectionStrategy, Random, Smart};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::block::Block;
use crate::chain_index::Frontier;
use crate::config::GossipConfig;
use crate::db::{DatabaseManager, PeerId};
use crate::store::BlockStore;
use crate::types::{ChainId, Hash};
use crate::wire;

/// Sends one-way gossip messages to a named peer.
///
/// Implementations are expected to be cheap to clone (or already behind
/// an `Arc`) and to route a peer's reply, if any, back into that peer's
/// own [`GossipEngine::inbox_sender`] rather than returning it directly —
/// this engine never blocks a tick on a round trip.
pub trait PeerTransport: Send + Sync + 'static {
    fn send(
        &self,
        peer: &PeerId,
        message: &GossipMessage,
    ) -> impl std::future::Future<Output = Result<(), GossipError>> + Send;
}

const RELAY_DEDUP_CAPACITY: usize = 4096;

/// The gossip engine: periodic frontier broadcast, anti-entropy
/// reconciliation, and push-gossip relay of freshly-ingested blocks.
pub struct GossipEngine<T, Sel, S>
where
    T: PeerTransport,
    Sel: PeerSelectionStrategy,
    S: BlockStore + Send + 'static,
{
    db: Arc<DatabaseManager<S>>,
    transport: Arc<T>,
    selection: Sel,
    config: GossipConfig,
    peers: Mutex<Vec<PeerId>>,
    last_known_frontier: Mutex<HashMap<(ChainId, PeerId), Frontier>>,
    relay_seen: Mutex<LruCache<Hash, ()>>,
    inbox_tx: mpsc::Sender<(PeerId, GossipMessage)>,
    inbox_rx: Mutex<Option<mpsc::Receiver<(PeerId, GossipMessage)>>>,
}

impl<T, Sel, S> GossipEngine<T, Sel, S>
where
    T: PeerTransport,
    Sel: PeerSelectionStrategy,
    S: BlockStore + Send + 'static,
{
    pub fn new(db: Arc<DatabaseManager<S>>, transport: Arc<T>, selection: Sel, config: GossipConfig) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(1024);
        let relay_capacity = std::num::NonZeroUsize::new(RELAY_DEDUP_CAPACITY).unwrap();
        Self {
            db,
            transport,
            selection,
            config,
            peers: Mutex::new(Vec::new()),
            last_known_frontier: Mutex::new(HashMap::new()),
            relay_seen: Mutex::new(LruCache::new(relay_capacity)),
            inbox_tx,
            inbox_rx: Mutex::new(Some(inbox_rx)),
        }
    }

    /// A clonable handle for feeding inbound messages into this engine,
    /// meant to be handed to the concrete [`PeerTransport`] implementation.
    pub fn inbox_sender(&self) -> mpsc::Sender<(PeerId, GossipMessage)> {
        self.inbox_tx.clone()
    }

    pub fn add_peer(&self, peer: PeerId) {
        let mut peers = self.peers.lock().expect("peer list lock poisoned");
        if !peers.contains(&peer) {
            peers.push(peer);
        }
    }

    fn known_frontiers_for(&self, chain_id: &ChainId) -> HashMap<PeerId, Frontier> {
        self.last_known_frontier
            .lock()
            .expect("known-frontier lock poisoned")
            .iter()
            .filter(|((cid, _), _)| cid == chain_id)
            .map(|((_, peer), frontier)| (peer.clone(), frontier.clone()))
            .collect()
    }

    fn remember_peer_frontier(&self, chain_id: ChainId, peer: PeerId, frontier: Frontier) {
        self.last_known_frontier
            .lock()
            .expect("known-frontier lock poisoned")
            .insert((chain_id, peer), frontier);
    }

    /// Spawns the inbox loop and a single tick loop that, on every
    /// interval, gossips every chain the database manager currently knows
    /// about (chains are discovered dynamically as blocks are ingested, so
    /// there is no fixed chain set to pass in up front). Returns a
    /// shutdown sender and the spawned tasks' handles; dropping the sender
    /// or sending `true` asks every loop to stop after its current
    /// iteration.
    pub fn spawn(self: Arc<Self>) -> (watch::Sender<bool>, Vec<JoinHandle<()>>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::new();

        let inbox_rx = self
            .inbox_rx
            .lock()
            .expect("inbox lock poisoned")
            .take()
            .expect("gossip engine spawned more than once");

        {
            let engine = self.clone();
            let mut shutdown_rx = shutdown_rx.clone();
            handles.push(tokio::spawn(async move {
                engine.run_inbox_loop(inbox_rx, &mut shutdown_rx).await;
            }));
        }

        {
            let engine = self.clone();
            let mut shutdown_rx = shutdown_rx.clone();
            handles.push(tokio::spawn(async move {
                engine.run_tick_loop(&mut shutdown_rx).await;
            }));
        }

        (shutdown_tx, handles)
    }

    async fn run_inbox_loop(
        &self,
        mut inbox_rx: mpsc::Receiver<(PeerId, GossipMessage)>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                received = inbox_rx.recv() => {
                    match received {
                        Some((peer, message)) => self.handle_inbox_message(peer, message).await,
                        None => break,
                    }
                }
            }
        }
    }

    async fn run_tick_loop(&self, shutdown_rx: &mut watch::Receiver<bool>) {
        let jitter = self.initial_jitter();
        tokio::time::sleep(jitter).await;

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.gossip_interval) => {
                    for chain_id in self.db.known_chain_ids() {
                        self.tick_once(&chain_id).await;
                    }
                }
            }
        }
    }

    fn initial_jitter(&self) -> std::time::Duration {
        use rand::Rng;
        let max_millis = self.config.gossip_sync_max_delay.as_millis().max(1) as u64;
        let millis = rand::thread_rng().gen_range(0..max_millis);
        std::time::Duration::from_millis(millis)
    }

    /// One periodic gossip round: broadcasts our frontier to a
    /// selection of peers, requesting each to answer back.
    async fn tick_once(&self, chain_id: &ChainId) {
        let Some(our_frontier) = self.db.get_chain_frontier(chain_id) else {
            return;
        };
        let peers = self.peers.lock().expect("peer list lock poisoned").clone();
        if peers.is_empty() {
            return;
        }
        let known = self.known_frontiers_for(chain_id);
        let fanout = self.config.gossip_fanout.min(peers.len());
        let targets = self.selection.select(&peers, &known, None, fanout, &our_frontier);

        for peer in targets {
            let message = GossipMessage::Frontier {
                chain_id: chain_id.clone(),
                frontier: our_frontier.clone(),
                request_response: true,
            };
            let _ = self.transport.send(&peer, &message).await;
        }
    }

    async fn handle_inbox_message(&self, peer: PeerId, message: GossipMessage) {
        match message {
            GossipMessage::Frontier {
                chain_id,
                frontier,
                request_response,
            } => {
                self.handle_frontier(peer, chain_id, frontier, request_response).await;
            }
            GossipMessage::FrontierResponse { chain_id, frontier } => {
                self.handle_frontier(peer, chain_id, frontier, false).await;
            }
            GossipMessage::BlocksRequest { chain_id, diff } => {
                self.handle_blocks_request(peer, chain_id, diff).await;
            }
            GossipMessage::Block { chain_id, blob, ttl } => {
                self.handle_block(peer, chain_id, blob, ttl).await;
            }
        }
    }

    async fn handle_frontier(
        &self,
        peer: PeerId,
        chain_id: ChainId,
        frontier: Frontier,
        request_response: bool,
    ) {
        self.remember_peer_frontier(chain_id.clone(), peer.clone(), frontier.clone());

        let diff = self
            .db
            .reconcile(&chain_id, &frontier, &peer, self.config.max_extra_dots);
        let diff_is_empty = diff.is_empty();

        if !diff_is_empty {
            let request = GossipMessage::BlocksRequest {
                chain_id: chain_id.clone(),
                diff,
            };
            let _ = self.transport.send(&peer, &request).await;
        }

        if !diff_is_empty {
            tokio::time::sleep(self.config.gossip_collect_time).await;
        }

        if request_response {
            if let Some(our_frontier) = self.db.get_chain_frontier(&chain_id) {
                let response = GossipMessage::FrontierResponse {
                    chain_id,
                    frontier: our_frontier,
                };
                let _ = self.transport.send(&peer, &response).await;
            }
        }
    }

    async fn handle_blocks_request(
        &self,
        peer: PeerId,
        chain_id: ChainId,
        diff: crate::chain_index::FrontierDiff,
    ) {
        let mut to_request = Vec::new();
        let blobs = self
            .db
            .get_block_blobs_by_frontier_diff(&chain_id, &diff, &mut to_request);

        for blob in blobs {
            let message = GossipMessage::Block {
                chain_id: chain_id.clone(),
                blob,
                ttl: 0,
            };
            let _ = self.transport.send(&peer, &message).await;
        }
    }

    async fn handle_block(&self, from: PeerId, chain_id: ChainId, blob: Vec<u8>, ttl: u8) {
        let block: Block = match wire::decode(&blob) {
            Ok(b) => b,
            Err(_) => return,
        };
        let hash = block.hash();
        if self.db.has_block(&hash) {
            return;
        }
        self.db.add_block(&blob, &block);

        if ttl == 0 {
            return;
        }

        {
            let mut seen = self.relay_seen.lock().expect("relay cache lock poisoned");
            if seen.contains(&hash) {
                return;
            }
            seen.put(hash, ());
        }

        let peers = self.peers.lock().expect("peer list lock poisoned").clone();
        let known = self.known_frontiers_for(&chain_id);
        let our_frontier = self.db.get_chain_frontier(&chain_id).unwrap_or_default();
        let targets = self.selection.select(
            &peers,
            &known,
            Some(&from),
            self.config.push_gossip_fanout,
            &our_frontier,
        );

        for peer in targets {
            let message = GossipMessage::Block {
                chain_id: chain_id.clone(),
                blob: blob.clone(),
                ttl: ttl - 1,
            };
            let _ = self.transport.send(&peer, &message).await;
        }
    }
}

/// A transport that only logs what it would have sent, for demos and
/// single-node runs where no real peer network is wired in yet. Mirrors
/// [`crate::block::NullAuthenticator`]'s role as a placeholder for a real
/// external collaborator.
pub struct LoggingTransport;

impl PeerTransport for LoggingTransport {
    async fn send(&self, peer: &PeerId, message: &GossipMessage) -> Result<(), GossipError> {
        tracing::debug!(peer = %hex::encode(peer), ?message, "gossip send (no transport wired)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::CreateParams;
    use crate::store::InMemoryBlockStore;
    use crate::types::{ChainId as Cid, Links};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    struct RecordingTransport {
        sent: AsyncMutex<Vec<(PeerId, GossipMessage)>>,
        count: AtomicUsize,
    }

    impl RecordingTransport {
        fn new() -> Self {
            Self {
                sent: AsyncMutex::new(Vec::new()),
                count: AtomicUsize::new(0),
            }
        }
    }

    impl PeerTransport for RecordingTransport {
        async fn send(&self, peer: &PeerId, message: &GossipMessage) -> Result<(), GossipError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            self.sent.lock().await.push((peer.clone(), message.clone()));
            Ok(())
        }
    }

    fn sample_block(seq: u32, pub_key: &[u8]) -> Block {
        Block::create(CreateParams {
            block_type: b"demo".to_vec(),
            transaction: b"payload".to_vec(),
            public_key: pub_key.to_vec(),
            sequence_number: seq,
            previous: if seq == 1 {
                Links::new(vec![crate::types::Dot::GENESIS])
            } else {
                Links::empty()
            },
            links: Links::empty(),
            com_prefix: Vec::new(),
            com_id: Cid::new(Vec::new()),
            com_seq_num: 0,
            timestamp: 1_700_000_000_000,
        })
    }

    #[tokio::test]
    async fn tick_broadcasts_frontier_to_selected_peers() {
        let db = Arc::new(DatabaseManager::new(InMemoryBlockStore::new(), 1024));
        let block = sample_block(1, b"alice");
        let bytes = crate::wire::encode(&block);
        db.add_block(&bytes, &block);

        let transport = Arc::new(RecordingTransport::new());
        let engine = Arc::new(GossipEngine::new(
            db,
            transport.clone(),
            Random,
            GossipConfig::default(),
        ));
        engine.add_peer(b"peer-1".to_vec());

        let chain_id = Cid::new(b"alice".to_vec());
        engine.tick_once(&chain_id).await;

        assert_eq!(transport.count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn receiving_a_block_ingests_and_relays_with_decremented_ttl() {
        let db = Arc::new(DatabaseManager::new(InMemoryBlockStore::new(), 1024));
        let transport = Arc::new(RecordingTransport::new());
        let engine = Arc::new(GossipEngine::new(
            db.clone(),
            transport.clone(),
            Random,
            GossipConfig::default(),
        ));
        engine.add_peer(b"peer-2".to_vec());

        let block = sample_block(1, b"bob");
        let bytes = crate::wire::encode(&block);
        let chain_id = Cid::new(b"bob".to_vec());

        engine
            .handle_inbox_message(
                b"peer-1".to_vec(),
                GossipMessage::Block {
                    chain_id: chain_id.clone(),
                    blob: bytes,
                    ttl: 2,
                },
            )
            .await;

        assert!(db.get_chain_frontier(&chain_id).is_some());
        let sent = transport.sent.lock().await;
        assert_eq!(sent.len(), 1);
        match &sent[0].1 {
            GossipMessage::Block { ttl, .. } => assert_eq!(*ttl, 1),
            _ => panic!("expected a relayed Block message"),
        }
    }

    #[tokio::test]
    async fn a_block_with_zero_ttl_is_ingested_but_not_relayed() {
        let db = Arc::new(DatabaseManager::new(InMemoryBlockStore::new(), 1024));
        let transport = Arc::new(RecordingTransport::new());
        let engine = Arc::new(GossipEngine::new(
            db.clone(),
            transport.clone(),
            Random,
            GossipConfig::default(),
        ));
        engine.add_peer(b"peer-2".to_vec());

        let block = sample_block(1, b"carol");
        let bytes = crate::wire::encode(&block);
        let chain_id = Cid::new(b"carol".to_vec());

        engine
            .handle_inbox_message(
                b"peer-1".to_vec(),
                GossipMessage::Block {
                    chain_id,
                    blob: bytes,
                    ttl: 0,
                },
            )
            .await;

        assert!(transport.sent.lock().await.is_empty());
    }
}
