//! Shared application state.

use std::sync::Arc;

use chain::{DatabaseManager, GossipEngine, LoggingTransport, MetricsRegistry, RocksDbBlockStore, Smart};

/// Concrete gossip engine type this gateway runs: RocksDB-backed storage,
/// no real peer transport wired in yet, and the staleness-aware peer
/// selection strategy.
pub type Gossip = GossipEngine<LoggingTransport, Smart, RocksDbBlockStore>;

/// Shared state held by the API and background tasks.
///
/// This is wrapped in an [`Arc`] and passed to request handlers via Axum's
/// `State` extractor.
pub struct AppState {
    /// The database manager: block store + per-chain indices.
    pub db: Arc<DatabaseManager<RocksDbBlockStore>>,
    /// The gossip engine driving anti-entropy with configured peers.
    pub gossip: Arc<Gossip>,
    /// Metrics registry shared between ingestion, gossip, and the API.
    pub metrics: Arc<MetricsRegistry>,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
