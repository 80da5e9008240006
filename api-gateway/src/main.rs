// api-gateway/src/main.rs

//! API gateway binary.
//!
//! This binary exposes a small HTTP API on top of the `chain` crate:
//!
//! - `GET /health`
//! - `POST /chains/:chain_id/blocks`
//! - `GET /chains/:chain_id/frontier`
//!
//! It embeds a [`chain::DatabaseManager`] (RocksDB-backed), a
//! [`chain::GossipEngine`] (no peer transport wired in yet, see
//! [`chain::LoggingTransport`]), and a Prometheus metrics exporter on
//! `/metrics`.

mod config;
mod routes;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::signal;

use chain::{ChainConfig, DatabaseManager, GossipEngine, LoggingTransport, MetricsRegistry, RocksDbBlockStore, Smart, run_prometheus_http_server};
use config::ApiConfig;
use routes::{blocks, health};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "api_gateway=info,chain=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let api_cfg = ApiConfig::default();
    let chain_cfg = ChainConfig::default();

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if chain_cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = chain_cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                eprintln!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Storage + database manager
    // ---------------------------

    let store = RocksDbBlockStore::open(&chain_cfg.storage).map_err(|e| {
        format!(
            "failed to open RocksDB store at {}: {e:?}",
            chain_cfg.storage.path
        )
    })?;

    let db = Arc::new(DatabaseManager::new(
        store,
        chain_cfg.gossip.closure_cache_capacity,
    ));

    // ---------------------------
    // Gossip engine
    // ---------------------------

    let gossip = Arc::new(GossipEngine::new(
        db.clone(),
        Arc::new(LoggingTransport),
        Smart,
        chain_cfg.gossip.clone(),
    ));
    let (_shutdown, _handles) = gossip.clone().spawn();

    // ---------------------------
    // Shared state
    // ---------------------------

    let app_state: SharedState = Arc::new(AppState {
        db,
        gossip,
        metrics: metrics.clone(),
    });

    // ---------------------------
    // HTTP router
    // ---------------------------

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/chains/{chain_id}/blocks", post(blocks::submit_block))
        .route("/chains/{chain_id}/frontier", get(blocks::get_frontier))
        .with_state(app_state);

    tracing::info!("API gateway listening on http://{}", api_cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(api_cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", api_cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
