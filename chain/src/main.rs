// src/main.rs
//
// Minimal demo node that wires up the chain library:
//
// - RocksDB-backed block store
// - a database manager and gossip engine (no real peer transport wired in
//   yet, see `LoggingTransport`)
// - Prometheus metrics exporter on /metrics
// - a tiny loop that appends one block to its own personal chain every
//   few seconds, to make the frontier move.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chain::{
    ChainConfig, ChainId, DatabaseManager, GossipEngine, LoggingTransport, MetricsRegistry,
    NewBlockParams, NullAuthenticator, RocksDbBlockStore, Smart, run_prometheus_http_server,
};

#[tokio::main]
async fn main() {
    if let Err(err) = run_node().await {
        eprintln!("fatal error: {err}");
        std::process::exit(1);
    }
}

async fn run_node() -> Result<(), String> {
    let cfg = ChainConfig::default();

    // ---------------------------
    // Metrics registry + exporter
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                eprintln!("metrics HTTP server error: {e}");
            }
        });
        eprintln!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Storage + database manager
    // ---------------------------

    let store = RocksDbBlockStore::open(&cfg.storage).map_err(|e| {
        format!(
            "failed to open RocksDB store at {}: {e:?}",
            cfg.storage.path
        )
    })?;

    let db = Arc::new(DatabaseManager::new(store, cfg.gossip.closure_cache_capacity));

    // ---------------------------
    // Gossip engine (no peers configured in this demo)
    // ---------------------------

    let gossip = Arc::new(GossipEngine::new(
        db.clone(),
        Arc::new(LoggingTransport),
        Smart,
        cfg.gossip.clone(),
    ));
    let (_shutdown, _handles) = gossip.clone().spawn();

    // ---------------------------
    // Demo author identity + append loop
    // ---------------------------

    let public_key = b"demo-node-public-key".to_vec();

    eprintln!("starting node, appending to its own personal chain every 5s");

    loop {
        let timestamp = current_unix_timestamp();
        let mut block = db.create_block(
            NewBlockParams {
                block_type: b"demo".to_vec(),
                transaction: Vec::new(),
                public_key: public_key.clone(),
                com_prefix: Vec::new(),
                com_id: ChainId::new(Vec::new()),
                timestamp,
            },
            true,
        );
        block.sign(&NullAuthenticator, &());

        let dot = block.pers_dot();
        let blob = chain::wire::encode(&block);
        db.add_block(&blob, &block);

        println!("appended block seq={} hash={:?}", dot.seq_num, dot.short_hash);

        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

fn current_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}
