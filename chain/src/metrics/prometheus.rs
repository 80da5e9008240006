//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed ingestion/gossip metrics, and an
//! async HTTP exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Ingestion and gossip metrics for one node.
#[derive(Clone)]
pub struct ChainMetrics {
    /// Latency of [`crate::db::DatabaseManager::add_block`], in seconds.
    pub block_ingestion_seconds: Histogram,
    /// Total dots reported newly-consistent across all chains.
    pub newly_consistent_dots_total: IntCounter,
    /// Total reconcile rounds served, across all peers and chains.
    pub reconcile_rounds_total: IntCounter,
    /// Block blobs currently queued for fetch from a peer, not yet served.
    pub outstanding_block_requests: IntGauge,
    /// Gossip messages sent or received, labelled by `kind` and `direction`.
    pub gossip_messages_total: IntCounterVec,
}

impl ChainMetrics {
    /// Registers metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let block_ingestion_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "chain_block_ingestion_seconds",
                "Time to ingest one block into the block store and chain indices",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )?;
        registry.register(Box::new(block_ingestion_seconds.clone()))?;

        let newly_consistent_dots_total = IntCounter::with_opts(Opts::new(
            "chain_newly_consistent_dots_total",
            "Total dots reported newly-consistent across all chains",
        ))?;
        registry.register(Box::new(newly_consistent_dots_total.clone()))?;

        let reconcile_rounds_total = IntCounter::with_opts(Opts::new(
            "chain_reconcile_rounds_total",
            "Total reconcile rounds served, across all peers and chains",
        ))?;
        registry.register(Box::new(reconcile_rounds_total.clone()))?;

        let outstanding_block_requests = IntGauge::with_opts(Opts::new(
            "chain_outstanding_block_requests",
            "Block blobs currently queued for fetch from a peer",
        ))?;
        registry.register(Box::new(outstanding_block_requests.clone()))?;

        let gossip_messages_total = IntCounterVec::new(
            Opts::new(
                "chain_gossip_messages_total",
                "Gossip messages sent or received, by kind and direction",
            ),
            &["kind", "direction"],
        )?;
        registry.register(Box::new(gossip_messages_total.clone()))?;

        Ok(Self {
            block_ingestion_seconds,
            newly_consistent_dots_total,
            reconcile_rounds_total,
            outstanding_block_requests,
            gossip_messages_total,
        })
    }
}

/// Wrapper around a Prometheus registry and the chain metrics.
///
/// This is the main handle you pass around in the node. It can be wrapped
/// in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub chain: ChainMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the chain metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("chain".to_string()), None)?;
        let chain = ChainMetrics::register(&registry)?;
        Ok(Self { registry, chain })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            eprintln!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                eprintln!("prometheus HTTP server error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn chain_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = ChainMetrics::register(&registry).expect("register metrics");

        metrics.block_ingestion_seconds.observe(0.002);
        metrics.newly_consistent_dots_total.inc();
        metrics.reconcile_rounds_total.inc();
        metrics.outstanding_block_requests.set(3);
        metrics
            .gossip_messages_total
            .with_label_values(&["frontier", "sent"])
            .inc();

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn metrics_registry_gather_text_works() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.chain.block_ingestion_seconds.observe(0.01);
        let text = registry.gather_text();
        assert!(text.contains("chain_block_ingestion_seconds"));
    }
}
