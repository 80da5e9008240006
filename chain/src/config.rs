//! Top-level configuration for a chain node.
//!
//! This module aggregates configuration for:
//!
//! - persistent storage (RocksDB path and creation flags),
//! - gossip tuning (intervals, fanout, push-gossip TTL, reconcile bounds),
//! - metrics exporter (enable flag + listen address).
//!
//! The goal is to have a single [`ChainConfig`] struct that higher-level
//! binaries (e.g. `main.rs`) can construct from defaults, config files, or
//! environment variables as needed.

use std::net::SocketAddr;
use std::time::Duration;

use crate::chain_index::{DEFAULT_CLOSURE_CACHE_CAPACITY, DEFAULT_MAX_EXTRA_DOTS};
use crate::store::RocksDbConfig;

/// Gossip engine tuning parameters.
#[derive(Clone, Debug)]
pub struct GossipConfig {
    /// Period between a peer's own frontier broadcasts.
    pub gossip_interval: Duration,
    /// Upper bound on the random jitter added before the first broadcast,
    /// so peers coming up together don't all announce in lockstep.
    pub gossip_sync_max_delay: Duration,
    /// How long to wait after requesting blocks from a peer before
    /// deciding whether to answer back with our own frontier.
    pub gossip_collect_time: Duration,
    /// Number of peers contacted per periodic gossip tick.
    pub gossip_fanout: usize,
    /// Number of peers a freshly-ingested block is proactively relayed to.
    pub push_gossip_fanout: usize,
    /// Hops remaining before a push-gossiped block is no longer relayed.
    pub push_gossip_ttl: u8,
    /// Cap on intermediate dots attached per conflict in a reconcile
    /// response.
    pub max_extra_dots: u32,
    /// Capacity of each chain index's forward-closure cache.
    pub closure_cache_capacity: usize,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            gossip_interval: Duration::from_secs(5),
            gossip_sync_max_delay: Duration::from_millis(500),
            gossip_collect_time: Duration::from_millis(200),
            gossip_fanout: 3,
            push_gossip_fanout: 5,
            push_gossip_ttl: 3,
            max_extra_dots: DEFAULT_MAX_EXTRA_DOTS,
            closure_cache_capacity: DEFAULT_CLOSURE_CACHE_CAPACITY,
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Top-level configuration for a chain node.
///
/// This aggregates all the sub-configs needed to wire up a typical node:
///
/// - persistent storage (`storage`),
/// - gossip tuning (`gossip`),
/// - Prometheus metrics exporter (`metrics`).
#[derive(Clone, Debug, Default)]
pub struct ChainConfig {
    pub storage: RocksDbConfig,
    pub gossip: GossipConfig,
    pub metrics: MetricsConfig,
}
