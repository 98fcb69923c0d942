//! Metrics and monitoring for the live stream
//!
//! ## Table of Contents
//! - **StreamMetrics**: Prometheus counters and gauges for one feed
//! - **MetricsExporter**: Text exposition and an axum `/metrics` route

use crate::error::{Result, StreamError};
use crate::supervisor::IgnoreReason;
use axum::{routing::get, Router};
use prometheus::{Counter, CounterVec, Gauge, Opts, Registry};
use std::sync::Arc;

/// Core metrics for a live threat feed
pub struct StreamMetrics {
    registry: Registry,

    // Transport metrics
    /// Frames received, ignored ones included
    pub frames_received: Counter,
    /// Frames dropped, by reason
    pub frames_ignored: CounterVec,
    /// Reconnects scheduled
    pub reconnects: Counter,
    /// 1 while connected
    pub connected: Gauge,

    // Reconciliation metrics
    /// Records received, duplicates included
    pub records_received: Counter,
    /// Records inserted into the collection
    pub records_fresh: Counter,
    /// Records currently held
    pub collection_size: Gauge,
    /// Events received since the last acknowledgment
    pub unseen: Gauge,
}

impl StreamMetrics {
    /// Create a new metrics instance
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let frames_received = Counter::new(
            "threat_stream_frames_received_total",
            "Total frames received from the live transport",
        )?;
        let frames_ignored = CounterVec::new(
            Opts::new("threat_stream_frames_ignored_total", "Frames dropped without ingest"),
            &["reason"],
        )?;
        let reconnects = Counter::new(
            "threat_stream_reconnects_total",
            "Reconnect attempts scheduled after a failure or close",
        )?;
        let connected = Gauge::new("threat_stream_connected", "1 while the stream is connected")?;

        let records_received = Counter::new(
            "threat_stream_records_received_total",
            "Records received, duplicates included",
        )?;
        let records_fresh = Counter::new(
            "threat_stream_records_fresh_total",
            "Records inserted into the live collection",
        )?;
        let collection_size = Gauge::new("threat_stream_collection_size", "Records currently held")?;
        let unseen = Gauge::new("threat_stream_unseen", "Events received since last acknowledgment")?;

        registry.register(Box::new(frames_received.clone()))?;
        registry.register(Box::new(frames_ignored.clone()))?;
        registry.register(Box::new(reconnects.clone()))?;
        registry.register(Box::new(connected.clone()))?;
        registry.register(Box::new(records_received.clone()))?;
        registry.register(Box::new(records_fresh.clone()))?;
        registry.register(Box::new(collection_size.clone()))?;
        registry.register(Box::new(unseen.clone()))?;

        Ok(Self {
            registry,
            frames_received,
            frames_ignored,
            reconnects,
            connected,
            records_received,
            records_fresh,
            collection_size,
            unseen,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a frame that produced a batch
    pub fn record_batch(&self, received: usize, fresh: usize) {
        self.frames_received.inc();
        self.records_received.inc_by(received as f64);
        self.records_fresh.inc_by(fresh as f64);
    }

    /// Update the collection gauges after any feed change
    pub fn set_feed_state(&self, collection_size: usize, unseen: u64) {
        self.collection_size.set(collection_size as f64);
        self.unseen.set(unseen as f64);
    }

    /// Record a dropped frame
    pub fn record_ignored(&self, reason: IgnoreReason) {
        self.frames_received.inc();
        self.frames_ignored.with_label_values(&[reason.as_str()]).inc();
    }

    /// Record a scheduled reconnect
    pub fn record_reconnect(&self) {
        self.reconnects.inc();
    }

    /// Update the connection gauge
    pub fn set_connected(&self, connected: bool) {
        self.connected.set(if connected { 1.0 } else { 0.0 });
    }

    /// Gather all metrics as text
    pub fn gather_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| StreamError::metrics(format!("Encode error: {}", e)))?;
        String::from_utf8(buffer).map_err(|e| StreamError::metrics(format!("UTF8 error: {}", e)))
    }
}

/// Metrics exporter for Prometheus scraping
pub struct MetricsExporter {
    metrics: Arc<StreamMetrics>,
}

impl MetricsExporter {
    /// Create a new exporter
    pub fn new(metrics: Arc<StreamMetrics>) -> Self {
        Self { metrics }
    }

    /// Get metrics as Prometheus text format
    pub fn export(&self) -> Result<String> {
        self.metrics.gather_text()
    }

    /// Router serving `/metrics`
    pub fn router(&self) -> Router {
        let metrics = Arc::clone(&self.metrics);
        Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics);
                async move {
                    match metrics.gather_text() {
                        Ok(text) => axum::response::Response::builder()
                            .header("Content-Type", "text/plain; charset=utf-8")
                            .body(axum::body::Body::from(text))
                            .unwrap_or_else(|_| {
                                axum::response::Response::new(axum::body::Body::from("Internal error"))
                            }),
                        Err(e) => axum::response::Response::builder()
                            .status(500)
                            .body(axum::body::Body::from(format!("Error: {}", e)))
                            .unwrap_or_else(|_| {
                                axum::response::Response::new(axum::body::Body::from("Internal error"))
                            }),
                    }
                }
            }),
        )
    }
}
