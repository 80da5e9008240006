//! Chain library crate.
//!
//! This crate provides the core building blocks for a content-addressed,
//! multi-writer DAG chain store with frontier-based anti-entropy gossip
//! reconciliation:
//!
//! - strongly-typed domain types (`types`) and a canonical wire encoding
//!   (`wire`),
//! - the block record and its pluggable signature seam (`block`),
//! - content-addressed block persistence (`store`),
//! - the per-chain DAG index, frontiers and reconciliation (`chain_index`),
//! - the database manager tying storage and chain indices together (`db`),
//! - the gossip engine (`gossip`),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level node configuration (`config`).
//!
//! Higher-level binaries compose these pieces to build nodes, simulators,
//! and experiment harnesses.

pub mod block;
pub mod chain_index;
pub mod config;
pub mod db;
pub mod gossip;
pub mod metrics;
pub mod store;
pub mod types;
pub mod wire;

pub use block::{Block, BlockAuthenticator, CreateParams, NullAuthenticator, verify_block};
pub use chain_index::{ChainIndex, Frontier, FrontierDiff};
pub use config::{ChainConfig, GossipConfig, MetricsConfig};
pub use db::{DatabaseManager, NewBlockParams, ObserverTopic, PeerId};
pub use gossip::{
    GossipEngine, GossipError, GossipMessage, LoggingTransport, PeerSelectionStrategy, PeerTransport,
    Random, Smart,
};
pub use metrics::{ChainMetrics, MetricsRegistry, run_prometheus_http_server};
pub use store::{BlockStore, InMemoryBlockStore, RocksDbBlockStore, RocksDbConfig, StorageError};
pub use types::{ChainId, Dot, Hash, Links, Ranges, SeqNum, ShortHash, HASH_LEN, SHORT_HASH_LEN};
pub use wire::WireError;

/// Type alias for the default block store backend.
pub type DefaultBlockStore = RocksDbBlockStore;

/// Type alias for a database manager over the default block store.
pub type DefaultDatabaseManager = DatabaseManager<DefaultBlockStore>;
