//! Live stream supervision
//!
//! ## Table of Contents
//! - **ConnectionSupervisor**: Keeps one subscription alive and feeds a
//!   [`LiveFeed`]
//! - **SubscriptionHandle**: Exclusive handle returned by `start`
//! - **ConnectionState**: Observable connected flag
//! - **frame / transport / sse / websocket**: Parsing and transports
//!
//! Lifecycle of one subscription:
//!
//! ```text
//! Disconnected ──open ok──▶ Connected ──error / close──▶ Disconnected
//!      ▲                                                     │
//!      └──────────────── sleep(backoff delay) ◀──────────────┘
//! ```
//!
//! The loop runs until `teardown`. Callers only see the connected flag.

pub mod frame;
pub mod sse;
pub mod transport;
pub mod websocket;

pub use frame::{parse_frame, FrameOutcome, IgnoreReason};
pub use sse::{SseDecoder, SseEvent, SseTransport};
pub use transport::{BoxedTransport, FrameStream, Transport, TransportKind};
pub use websocket::WebSocketTransport;

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::metrics::StreamMetrics;
use crate::reconciler::LiveFeed;
use crate::record::EventRecord;
use crate::resilience::{BackoffConfig, ReconnectBackoff};

/// Connection state of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected: never connected, failed, closed, disabled or torn down
    #[default]
    Disconnected,
    /// Transport open
    Connected,
}

impl ConnectionState {
    /// Whether the transport is open
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connected => f.write_str("connected"),
        }
    }
}

/// Supervises the live subscription of one feed.
///
/// The feed has a single writer: starting a subscription stops the one
/// started before it, as if its handle had been torn down.
pub struct ConnectionSupervisor<T> {
    transport: BoxedTransport,
    feed: LiveFeed<T>,
    backoff: BackoffConfig,
    metrics: Option<Arc<StreamMetrics>>,
    current: Mutex<Option<Stopper>>,
}

impl<T> ConnectionSupervisor<T>
where
    T: EventRecord + DeserializeOwned,
{
    /// Create a supervisor with the default reconnect policy
    pub fn new(transport: BoxedTransport, feed: LiveFeed<T>) -> Self {
        Self {
            transport,
            feed,
            backoff: BackoffConfig::default(),
            metrics: None,
            current: Mutex::new(None),
        }
    }

    /// Set the reconnect policy
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Attach metrics
    pub fn with_metrics(mut self, metrics: Arc<StreamMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The feed batches are dispatched to
    pub fn feed(&self) -> &LiveFeed<T> {
        &self.feed
    }

    /// Start a subscription, stopping any previous one.
    ///
    /// Returns immediately; the connection runs on a spawned tokio task, so
    /// this must be called from within a runtime. An empty endpoint starts
    /// nothing and the handle reports `Disconnected` forever.
    pub fn start(&self, endpoint: impl Into<String>) -> SubscriptionHandle {
        let endpoint = endpoint.into().trim().to_string();
        let id = Uuid::new_v4();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let mut current = self.current.lock();
        if let Some(previous) = current.take() {
            if previous.stop() {
                info!(subscription = %id, "Superseding previous live stream");
            }
        }

        if endpoint.is_empty() {
            info!(subscription = %id, "Live stream disabled: no endpoint");
            return SubscriptionHandle {
                id,
                endpoint,
                state: state_rx,
                control: None,
            };
        }

        let state_tx = Arc::new(state_tx);
        let gate = Arc::new(Mutex::new(true));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stopper = Stopper {
            gate: Arc::clone(&gate),
            state: Arc::clone(&state_tx),
            shutdown: Arc::new(shutdown_tx),
        };
        *current = Some(stopper.clone());

        let session = Session {
            id,
            endpoint: endpoint.clone(),
            transport: Arc::clone(&self.transport),
            feed: self.feed.clone(),
            backoff: ReconnectBackoff::new(self.backoff.clone()),
            metrics: self.metrics.clone(),
            state: Arc::clone(&state_tx),
            gate: Arc::clone(&gate),
        };

        info!(
            subscription = %id,
            endpoint = %endpoint,
            transport = %self.transport.name(),
            "Starting live stream"
        );
        let task = tokio::spawn(session.run(shutdown_rx));

        SubscriptionHandle {
            id,
            endpoint,
            state: state_rx,
            control: Some(Control { stopper, task }),
        }
    }
}

/// Stops one subscription from outside its task
#[derive(Clone)]
struct Stopper {
    gate: Arc<Mutex<bool>>,
    state: Arc<watch::Sender<ConnectionState>>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Stopper {
    /// Close the dispatch gate and signal the task. Returns whether the
    /// subscription was still running.
    fn stop(&self) -> bool {
        let was_open = {
            // Waits for an in-flight dispatch to finish.
            let mut open = self.gate.lock();
            let was_open = *open;
            *open = false;
            self.state.send_replace(ConnectionState::Disconnected);
            was_open
        };
        let _ = self.shutdown.send(true);
        was_open
    }
}

struct Control {
    stopper: Stopper,
    task: JoinHandle<()>,
}

/// Exclusive handle to one running subscription.
///
/// Dropping the handle tears the subscription down.
pub struct SubscriptionHandle {
    id: Uuid,
    endpoint: String,
    state: watch::Receiver<ConnectionState>,
    control: Option<Control>,
}

impl SubscriptionHandle {
    /// Subscription id, as logged
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Endpoint this subscription connects to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Whether the transport is currently open
    pub fn connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Receiver for connection state changes
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait until the subscription reaches `wanted`.
    ///
    /// Returns false if the subscription can no longer change state.
    pub async fn wait_for_state(&self, wanted: ConnectionState) -> bool {
        let mut rx = self.state.clone();
        let reached = rx.wait_for(|state| *state == wanted).await.is_ok();
        reached
    }

    /// Whether a connection loop is still running
    pub fn is_active(&self) -> bool {
        self.control
            .as_ref()
            .map_or(false, |control| !control.task.is_finished())
    }

    /// Stop the subscription.
    ///
    /// Once this returns no further batches reach the feed and no reconnect
    /// fires. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        let Some(control) = self.control.take() else {
            return;
        };

        control.stopper.stop();
        control.task.abort();
        info!(subscription = %self.id, "Live stream torn down");
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .field("active", &self.is_active())
            .finish()
    }
}

/// State owned by the connection task
struct Session<T> {
    id: Uuid,
    endpoint: String,
    transport: BoxedTransport,
    feed: LiveFeed<T>,
    backoff: ReconnectBackoff,
    metrics: Option<Arc<StreamMetrics>>,
    state: Arc<watch::Sender<ConnectionState>>,
    gate: Arc<Mutex<bool>>,
}

impl<T> Session<T>
where
    T: EventRecord + DeserializeOwned,
{
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            debug!(subscription = %self.id, attempt = self.backoff.attempt(), "Connecting");
            let opened = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                opened = self.transport.open(&self.endpoint) => opened,
            };

            match opened {
                Ok(mut frames) => {
                    self.set_state(ConnectionState::Connected);
                    self.backoff.reset();
                    info!(subscription = %self.id, endpoint = %self.endpoint, "Live stream connected");

                    loop {
                        let next = tokio::select! {
                            biased;
                            _ = shutdown.changed() => return,
                            next = frames.next() => next,
                        };

                        match next {
                            Some(Ok(payload)) => self.dispatch(&payload),
                            Some(Err(e)) => {
                                warn!(subscription = %self.id, error = %e, "Live stream failed");
                                break;
                            }
                            None => {
                                info!(subscription = %self.id, "Live stream closed by server");
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(subscription = %self.id, error = %e, "Live stream connection failed");
                }
            }

            self.set_state(ConnectionState::Disconnected);

            let Some(delay) = self.backoff.next_delay() else {
                warn!(
                    subscription = %self.id,
                    attempts = self.backoff.attempt(),
                    "Reconnect attempts exhausted, staying offline"
                );
                break;
            };

            if let Some(metrics) = &self.metrics {
                metrics.record_reconnect();
            }
            debug!(
                subscription = %self.id,
                attempt = self.backoff.attempt(),
                delay_ms = delay.as_millis() as u64,
                "Reconnecting after delay"
            );

            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn dispatch(&self, payload: &str) {
        match parse_frame::<T>(payload) {
            FrameOutcome::Batch(batch) => {
                let open = self.gate.lock();
                if !*open {
                    return;
                }

                let received = batch.len();
                let outcome = self.feed.ingest(batch);
                debug!(subscription = %self.id, received, fresh = outcome.fresh, "Batch ingested");

                if let Some(metrics) = &self.metrics {
                    metrics.record_batch(received, outcome.fresh);
                }
            }
            FrameOutcome::Ignored(reason) => {
                debug!(subscription = %self.id, reason = %reason, "Ignoring frame");
                if let Some(metrics) = &self.metrics {
                    metrics.record_ignored(reason);
                }
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let open = self.gate.lock();
        if !*open {
            return;
        }
        self.state.send_replace(state);
        if let Some(metrics) = &self.metrics {
            metrics.set_connected(state.is_connected());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, StreamError};
    use crate::record::GeoThreat;
    use async_trait::async_trait;
    use futures::stream;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Scripted session behaviour
    enum Script {
        /// Opening fails
        Refuse,
        /// Opens, yields these frames, then fails
        FramesThenError(Vec<String>),
        /// Opens, yields these frames, then stays open
        FramesThenHold(Vec<String>),
    }

    struct FakeTransport {
        scripts: Mutex<VecDeque<Script>>,
        fallback: fn() -> Script,
        opened_at: Mutex<Vec<Instant>>,
    }

    impl FakeTransport {
        fn new(scripts: Vec<Script>, fallback: fn() -> Script) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into()),
                fallback,
                opened_at: Mutex::new(Vec::new()),
            })
        }

        fn attempts(&self) -> Vec<Instant> {
            self.opened_at.lock().clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn open(&self, _endpoint: &str) -> Result<FrameStream> {
            self.opened_at.lock().push(Instant::now());
            let script = self
                .scripts
                .lock()
                .pop_front()
                .unwrap_or_else(self.fallback);

            match script {
                Script::Refuse => Err(StreamError::transport("connection refused")),
                Script::FramesThenError(frames) => {
                    let items = frames
                        .into_iter()
                        .map(Ok)
                        .chain(std::iter::once(Err(StreamError::transport("reset"))));
                    Ok(Box::pin(stream::iter(items)))
                }
                Script::FramesThenHold(frames) => {
                    let items = frames.into_iter().map(Ok::<String, StreamError>);
                    Ok(Box::pin(stream::iter(items).chain(stream::pending())))
                }
            }
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn supervisor(transport: Arc<FakeTransport>, delay: Duration) -> ConnectionSupervisor<GeoThreat> {
        ConnectionSupervisor::new(transport, LiveFeed::new(3))
            .with_backoff(BackoffConfig::constant(delay))
    }

    fn ids(feed: &LiveFeed<GeoThreat>) -> Vec<i64> {
        feed.snapshot().iter().map(|t| t.id).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_endpoint_is_disabled() {
        let transport = FakeTransport::new(vec![], || Script::Refuse);
        let sup = supervisor(transport.clone(), Duration::from_secs(5));

        let handle = sup.start("   ");
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(!handle.connected());
        assert!(!handle.is_active());
        assert!(transport.attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_are_ingested_in_order() {
        let transport = FakeTransport::new(
            vec![Script::FramesThenHold(vec![
                r#"[{"id":1},{"id":2}]"#.to_string(),
                "not json".to_string(),
                "[]".to_string(),
                r#"[{"id":3},{"id":4}]"#.to_string(),
            ])],
            || Script::Refuse,
        );
        let sup = supervisor(transport, Duration::from_secs(5));

        let handle = sup.start("fake://stream");
        assert!(handle.wait_for_state(ConnectionState::Connected).await);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(ids(sup.feed()), vec![3, 4, 1]);
        assert_eq!(sup.feed().unseen_count(), 4);
        assert!(handle.connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_exact_delay() {
        let transport = FakeTransport::new(vec![], || Script::FramesThenError(Vec::new()));
        let sup = supervisor(transport.clone(), Duration::from_secs(5));

        let mut handle = sup.start("fake://stream");
        tokio::time::sleep(Duration::from_millis(20_100)).await;
        handle.teardown();

        let attempts = transport.attempts();
        assert_eq!(attempts.len(), 5);
        for pair in attempts.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(5));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_connections_keep_retrying() {
        let transport = FakeTransport::new(
            vec![Script::Refuse, Script::Refuse],
            || Script::FramesThenHold(vec![r#"[{"id":9}]"#.to_string()]),
        );
        let sup = supervisor(transport.clone(), Duration::from_secs(5));

        let handle = sup.start("fake://stream");
        assert!(handle.wait_for_state(ConnectionState::Connected).await);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(transport.attempts().len(), 3);
        assert_eq!(ids(sup.feed()), vec![9]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_pending_reconnect() {
        let transport = FakeTransport::new(vec![], || Script::Refuse);
        let sup = supervisor(transport.clone(), Duration::from_secs(5));

        let mut handle = sup.start("fake://stream");
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(transport.attempts().len(), 1);

        // A reconnect is pending at t=5s.
        handle.teardown();
        handle.teardown();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(transport.attempts().len(), 1);
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert!(!handle.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_while_connected_stops_dispatch() {
        let transport = FakeTransport::new(
            vec![Script::FramesThenHold(vec![r#"[{"id":1}]"#.to_string()])],
            || Script::FramesThenHold(vec![r#"[{"id":2}]"#.to_string()]),
        );
        let sup = supervisor(transport.clone(), Duration::from_secs(5));

        let mut handle = sup.start("fake://stream");
        assert!(handle.wait_for_state(ConnectionState::Connected).await);
        tokio::time::sleep(Duration::from_millis(10)).await;

        handle.teardown();
        assert!(!handle.connected());
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(ids(sup.feed()), vec![1]);
        assert_eq!(transport.attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_tears_down() {
        let transport = FakeTransport::new(vec![], || Script::Refuse);
        let sup = supervisor(transport.clone(), Duration::from_secs(5));

        let handle = sup.start("fake://stream");
        let state = handle.watch_state();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(transport.attempts().len(), 1);

        // A reconnect is pending at t=5s.
        drop(handle);
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(transport.attempts().len(), 1);
        assert_eq!(*state.borrow(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_supersedes_first() {
        let transport = FakeTransport::new(
            vec![Script::FramesThenHold(vec![r#"[{"id":1}]"#.to_string()])],
            || Script::FramesThenHold(vec![r#"[{"id":2}]"#.to_string()]),
        );
        let sup = supervisor(transport.clone(), Duration::from_secs(5));

        let first = sup.start("fake://stream");
        assert!(first.wait_for_state(ConnectionState::Connected).await);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = sup.start("fake://stream");
        assert!(!first.connected());
        assert!(second.wait_for_state(ConnectionState::Connected).await);
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(!first.is_active());
        assert!(!first.connected());
        assert!(second.connected());
        assert_eq!(ids(sup.feed()), vec![2, 1]);
        assert_eq!(transport.attempts().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_start_stops_previous() {
        let transport = FakeTransport::new(vec![], || Script::FramesThenHold(Vec::new()));
        let sup = supervisor(transport.clone(), Duration::from_secs(5));

        let first = sup.start("fake://stream");
        assert!(first.wait_for_state(ConnectionState::Connected).await);

        let disabled = sup.start("");
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(!first.connected());
        assert!(!first.is_active());
        assert!(!disabled.is_active());
        assert_eq!(transport.attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_attempts_gives_up() {
        let transport = FakeTransport::new(vec![], || Script::Refuse);
        let sup = ConnectionSupervisor::<GeoThreat>::new(transport.clone(), LiveFeed::new(10))
            .with_backoff(BackoffConfig::constant(Duration::from_secs(1)).max_attempts(2));

        let handle = sup.start("fake://stream");
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(transport.attempts().len(), 3);
        assert!(!handle.is_active());
        assert!(!handle.connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_metrics_track_session() {
        let transport = FakeTransport::new(
            vec![Script::FramesThenError(vec![
                r#"[{"id":1}]"#.to_string(),
                "{}".to_string(),
            ])],
            || Script::FramesThenHold(Vec::new()),
        );
        let metrics = Arc::new(StreamMetrics::new().unwrap());
        let sup = supervisor(transport, Duration::from_secs(5)).with_metrics(Arc::clone(&metrics));

        let handle = sup.start("fake://stream");
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(handle.connected());

        let text = metrics.gather_text().unwrap();
        assert!(text.contains("threat_stream_frames_received_total 2"));
        assert!(text.contains("threat_stream_reconnects_total 1"));
        assert!(text.contains("threat_stream_connected 1"));
        assert!(text.contains("reason=\"not_sequence\""));
    }
}
