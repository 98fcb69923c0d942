//! FeedBuilder for assembling a live threat feed
//!
//! ## Table of Contents
//! - **FeedBuilder**: Builder pattern over [`StreamConfig`]
//! - **ThreatFeed**: Feed, supervisor and metrics wired together

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::info;

use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::geo::{attack_arcs, cluster, AttackArc};
use crate::metrics::StreamMetrics;
use crate::reconciler::LiveFeed;
use crate::record::{EventRecord, GeoRecord, GeoThreat, LatLng};
use crate::resilience::BackoffConfig;
use crate::supervisor::{BoxedTransport, ConnectionSupervisor, SubscriptionHandle, TransportKind};

/// Builder for constructing [`ThreatFeed`] instances
pub struct FeedBuilder<T = GeoThreat> {
    config: StreamConfig,
    transport: Option<BoxedTransport>,
    metrics_enabled: bool,
    _record: std::marker::PhantomData<fn() -> T>,
}

impl<T> FeedBuilder<T>
where
    T: EventRecord + DeserializeOwned,
{
    /// Create a new FeedBuilder with default configuration
    pub fn new() -> Self {
        Self::from_config(StreamConfig::default())
    }

    /// Start from a loaded configuration
    pub fn from_config(config: StreamConfig) -> Self {
        let metrics_enabled = config.metrics.enabled;
        Self {
            config,
            transport: None,
            metrics_enabled,
            _record: std::marker::PhantomData,
        }
    }

    /// Set the stream endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.stream.endpoint = endpoint.into();
        self
    }

    /// Select a built-in transport
    pub fn with_transport(mut self, kind: TransportKind) -> Self {
        self.config.stream.transport = kind;
        self.transport = None;
        self
    }

    /// Use a custom transport
    pub fn with_custom_transport(mut self, transport: BoxedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the collection bound
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.config.stream.max_items = max_items;
        self
    }

    /// Set the reconnect policy
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.config.reconnect = backoff;
        self
    }

    /// Set the arc destination
    pub fn with_reference(mut self, reference: LatLng) -> Self {
        self.config.map.reference = reference;
        self
    }

    /// Enable or disable metrics
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    /// Build the feed. Nothing connects until [`ThreatFeed::start`].
    pub fn build(self) -> Result<ThreatFeed<T>> {
        self.config.validate()?;
        let endpoint = self.config.resolved_endpoint();

        let transport = match self.transport {
            Some(transport) => transport,
            None => self.config.stream.transport.build()?,
        };

        info!(
            endpoint = %endpoint,
            transport = %transport.name(),
            max_items = self.config.stream.max_items,
            "Building threat feed"
        );

        let metrics = if self.metrics_enabled {
            Some(Arc::new(StreamMetrics::new()?))
        } else {
            None
        };

        let mut feed = LiveFeed::new(self.config.stream.max_items);
        if let Some(metrics) = &metrics {
            feed = feed.with_metrics(Arc::clone(metrics));
        }
        let mut supervisor = ConnectionSupervisor::new(transport, feed)
            .with_backoff(self.config.reconnect.clone());
        if let Some(metrics) = &metrics {
            supervisor = supervisor.with_metrics(Arc::clone(metrics));
        }

        Ok(ThreatFeed {
            supervisor,
            metrics,
            endpoint,
            reference: self.config.map.reference,
        })
    }
}

impl<T> Default for FeedBuilder<T>
where
    T: EventRecord + DeserializeOwned,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A configured live feed
pub struct ThreatFeed<T = GeoThreat> {
    supervisor: ConnectionSupervisor<T>,
    metrics: Option<Arc<StreamMetrics>>,
    endpoint: String,
    reference: LatLng,
}

impl<T> ThreatFeed<T>
where
    T: EventRecord + DeserializeOwned,
{
    /// Shared record collection
    pub fn feed(&self) -> &LiveFeed<T> {
        self.supervisor.feed()
    }

    /// Connection supervisor
    pub fn supervisor(&self) -> &ConnectionSupervisor<T> {
        &self.supervisor
    }

    /// Metrics, when enabled
    pub fn metrics(&self) -> Option<&Arc<StreamMetrics>> {
        self.metrics.as_ref()
    }

    /// Endpoint `start` connects to; empty when the stream is disabled
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Arc destination
    pub fn reference(&self) -> LatLng {
        self.reference
    }

    /// Start the live subscription. Any subscription already running on this
    /// feed is stopped first.
    pub fn start(&self) -> SubscriptionHandle {
        self.supervisor.start(self.endpoint.clone())
    }

    /// Start a subscription against another endpoint, replacing the current one
    pub fn start_with(&self, endpoint: impl Into<String>) -> Result<SubscriptionHandle> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(StreamError::config("endpoint must not be empty"));
        }
        Ok(self.supervisor.start(endpoint))
    }
}

impl<T> ThreatFeed<T>
where
    T: GeoRecord + DeserializeOwned,
{
    /// Arcs for the current collection toward the reference point
    pub fn attack_arcs(&self) -> Vec<AttackArc> {
        let snapshot = self.feed().snapshot();
        attack_arcs(&cluster(&snapshot), self.reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Severity;

    #[test]
    fn test_builder_default() {
        let feed = FeedBuilder::<GeoThreat>::new().build().unwrap();
        assert_eq!(feed.feed().max_items(), 200);
        assert_eq!(feed.endpoint(), "");
        assert!(feed.metrics().is_none());
    }

    #[test]
    fn test_builder_with_options() {
        let feed: ThreatFeed = FeedBuilder::new()
            .with_endpoint("ws://localhost:8000/stream")
            .with_transport(TransportKind::WebSocket)
            .with_max_items(20)
            .with_reference(LatLng::new(51.5, -0.12))
            .with_metrics(true)
            .build()
            .unwrap();

        assert_eq!(feed.endpoint(), "ws://localhost:8000/stream");
        assert_eq!(feed.feed().max_items(), 20);
        assert_eq!(feed.reference(), LatLng::new(51.5, -0.12));
        assert!(feed.metrics().is_some());
    }

    #[test]
    fn test_builder_rejects_zero_capacity() {
        let result = FeedBuilder::<GeoThreat>::new().with_max_items(0).build();
        assert!(matches!(result, Err(StreamError::Config(_))));
    }

    #[test]
    fn test_attack_arcs_from_feed() {
        let feed = FeedBuilder::<GeoThreat>::new().build().unwrap();
        feed.feed().ingest(vec![
            GeoThreat::new(1, Severity::High).at(48.85, 2.35),
            GeoThreat::new(2, Severity::Low),
        ]);

        let arcs = feed.attack_arcs();
        assert_eq!(arcs.len(), 1);
        assert_eq!(arcs[0].severity, Severity::High);
    }

    #[tokio::test]
    async fn test_start_disabled() {
        let feed = FeedBuilder::<GeoThreat>::new().build().unwrap();
        let handle = feed.start();
        assert!(!handle.connected());
        assert!(!handle.is_active());
        assert!(feed.start_with("  ").is_err());
    }

    #[test]
    fn test_builder_metrics_track_acknowledgment() {
        let feed = FeedBuilder::<GeoThreat>::new().with_metrics(true).build().unwrap();
        feed.feed().ingest(vec![
            GeoThreat::new(1, Severity::High),
            GeoThreat::new(2, Severity::Low),
        ]);
        feed.feed().reset_unseen_count();

        let text = feed.metrics().unwrap().gather_text().unwrap();
        assert!(text.contains("threat_stream_unseen 0"));
        assert!(text.contains("threat_stream_collection_size 2"));
    }
}
