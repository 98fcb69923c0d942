//! # Threat Stream
//!
//! Live threat-stream core for security dashboards: a bounded, deduplicated
//! record collection, a supervisor that keeps one live subscription open
//! across failures, and geographic clustering for the threat map.
//!
//! ## Features
//!
//! - **Reconciliation**: Most-recent-first, id-deduplicated, bounded
//!   collection with an unseen-event counter
//! - **Supervision**: SSE or WebSocket subscription with fixed-delay
//!   reconnects and final, idempotent teardown
//! - **Geo clustering**: ~0.1° grid buckets, dominant severity, attack arcs
//! - **Dashboard API**: Typed client for the backend's REST endpoints
//! - **Metrics**: Prometheus-compatible metrics export
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use threat_stream::{FeedBuilder, GeoThreat, TransportKind};
//!
//! #[tokio::main]
//! async fn main() -> threat_stream::Result<()> {
//!     let live = FeedBuilder::<GeoThreat>::new()
//!         .with_endpoint("http://localhost:8000/api/dashboard/stream")
//!         .with_transport(TransportKind::Sse)
//!         .build()?;
//!
//!     let mut handle = live.start();
//!     let mut updates = live.feed().subscribe();
//!     while updates.changed().await.is_ok() {
//!         for arc in live.attack_arcs() {
//!             println!("{} {} x{}", arc.key, arc.severity, arc.count);
//!         }
//!     }
//!     handle.teardown();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod api;
pub mod builder;
pub mod config;
pub mod error;
pub mod geo;
pub mod metrics;
pub mod reconciler;
pub mod record;
pub mod resilience;
pub mod supervisor;
pub mod view;

// Re-exports for ergonomic API
pub use api::{ApiError, DashboardClient, DashboardSnapshot};
pub use builder::{FeedBuilder, ThreatFeed};
pub use config::StreamConfig;
pub use error::{Result, StreamError};
pub use geo::{attack_arcs, build_arc, cluster, AttackArc, BucketKey, Cluster, ClusterMap};
pub use metrics::{MetricsExporter, StreamMetrics};
pub use reconciler::{Ingested, LiveFeed, StreamReconciler};
pub use record::{EventRecord, GeoRecord, GeoThreat, LatLng, Severity};
pub use resilience::{BackoffConfig, BackoffStrategy};
pub use supervisor::{
    ConnectionState, ConnectionSupervisor, SubscriptionHandle, Transport, TransportKind,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::builder::FeedBuilder;
    pub use crate::error::Result;
    pub use crate::geo::{build_arc, cluster};
    pub use crate::reconciler::{LiveFeed, StreamReconciler};
    pub use crate::record::{EventRecord, GeoRecord, GeoThreat, LatLng, Severity};
    pub use crate::supervisor::{ConnectionState, ConnectionSupervisor, TransportKind};
}
