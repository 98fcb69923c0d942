//! Stream reconciliation
//!
//! ## Table of Contents
//! - **StreamReconciler**: Bounded, deduplicated, most-recent-first collection
//!   plus the unseen-event counter
//! - **Ingested**: Result of one ingest call
//! - **LiveFeed**: Shared handle the supervisor writes to and views read from

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::trace;

use crate::metrics::StreamMetrics;
use crate::record::EventRecord;

/// Default maximum number of records held
pub const DEFAULT_MAX_ITEMS: usize = 200;

/// Outcome of [`StreamReconciler::ingest`]
#[derive(Debug, Clone)]
pub struct Ingested<T> {
    /// Collection after the call. Pointer-equal to the prior collection when
    /// nothing new was inserted.
    pub items: Arc<Vec<T>>,
    /// Number of records inserted at the front
    pub fresh: usize,
}

impl<T> Ingested<T> {
    /// Whether the collection changed
    pub fn changed(&self) -> bool {
        self.fresh > 0
    }
}

/// Bounded, deduplicated, most-recent-first record collection.
///
/// Invariants held after every call:
/// - no two records share an id
/// - `len() <= max_items()`
/// - records from one batch keep their received order, ahead of everything
///   held before
#[derive(Debug, Clone)]
pub struct StreamReconciler<T> {
    items: Arc<Vec<T>>,
    max_items: usize,
    unseen: u64,
}

impl<T: EventRecord> StreamReconciler<T> {
    /// Create an empty reconciler holding at most `max_items` records
    pub fn new(max_items: usize) -> Self {
        Self {
            items: Arc::new(Vec::new()),
            max_items,
            unseen: 0,
        }
    }

    /// Merge a batch into the collection.
    ///
    /// The unseen counter grows by the raw batch length, duplicates included.
    /// When no record in the batch is new the collection is left as is and
    /// the same `Arc` is returned.
    pub fn ingest(&mut self, batch: Vec<T>) -> Ingested<T> {
        if batch.is_empty() {
            return self.unchanged();
        }

        let received = batch.len();
        self.unseen = self.unseen.saturating_add(received as u64);

        let mut seen: HashSet<i64> = self.items.iter().map(|record| record.id()).collect();
        let fresh: Vec<T> = batch
            .into_iter()
            .filter(|record| seen.insert(record.id()))
            .collect();

        if fresh.is_empty() {
            trace!(received, "Batch held only known ids");
            return self.unchanged();
        }

        let inserted = fresh.len();
        let mut next = Vec::with_capacity((inserted + self.items.len()).min(self.max_items));
        next.extend(fresh.into_iter().take(self.max_items));
        let room = self.max_items.saturating_sub(next.len());
        next.extend(self.items.iter().take(room).cloned());

        trace!(received, inserted, len = next.len(), "Batch reconciled");
        self.items = Arc::new(next);

        Ingested {
            items: Arc::clone(&self.items),
            fresh: inserted,
        }
    }

    fn unchanged(&self) -> Ingested<T> {
        Ingested {
            items: Arc::clone(&self.items),
            fresh: 0,
        }
    }
}

impl<T> StreamReconciler<T> {
    /// Acknowledge everything received so far
    pub fn reset_unseen_count(&mut self) {
        self.unseen = 0;
    }

    /// Events received since the last reset
    pub fn unseen_count(&self) -> u64 {
        self.unseen
    }

    /// Current collection, most recent first
    pub fn items(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.items)
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is held
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Capacity bound
    pub fn max_items(&self) -> usize {
        self.max_items
    }
}

impl<T: EventRecord> Default for StreamReconciler<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITEMS)
    }
}

/// Shared live feed.
///
/// One writer (the connection supervisor) and any number of readers. Every
/// state change bumps a revision on a watch channel so views can await
/// updates instead of polling.
pub struct LiveFeed<T> {
    reconciler: Arc<Mutex<StreamReconciler<T>>>,
    revision: Arc<watch::Sender<u64>>,
    metrics: Option<Arc<StreamMetrics>>,
}

impl<T> Clone for LiveFeed<T> {
    fn clone(&self) -> Self {
        Self {
            reconciler: Arc::clone(&self.reconciler),
            revision: Arc::clone(&self.revision),
            metrics: self.metrics.clone(),
        }
    }
}

impl<T: EventRecord> LiveFeed<T> {
    /// Create a feed holding at most `max_items` records
    pub fn new(max_items: usize) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            reconciler: Arc::new(Mutex::new(StreamReconciler::new(max_items))),
            revision: Arc::new(revision),
            metrics: None,
        }
    }

    /// Keep the collection-size and unseen gauges in step with the feed
    pub fn with_metrics(mut self, metrics: Arc<StreamMetrics>) -> Self {
        let (len, unseen) = {
            let reconciler = self.reconciler.lock();
            (reconciler.len(), reconciler.unseen_count())
        };
        metrics.set_feed_state(len, unseen);
        self.metrics = Some(metrics);
        self
    }

    /// Merge a batch and notify subscribers
    pub fn ingest(&self, batch: Vec<T>) -> Ingested<T> {
        if batch.is_empty() {
            return self.reconciler.lock().unchanged();
        }
        let outcome = self.reconciler.lock().ingest(batch);
        // The unseen counter moved even when the collection did not.
        self.bump();
        outcome
    }
}

impl<T> LiveFeed<T> {
    /// Current collection, most recent first
    pub fn snapshot(&self) -> Arc<Vec<T>> {
        self.reconciler.lock().items()
    }

    /// Events received since the last reset
    pub fn unseen_count(&self) -> u64 {
        self.reconciler.lock().unseen_count()
    }

    /// Acknowledge everything received so far
    pub fn reset_unseen_count(&self) {
        self.reconciler.lock().reset_unseen_count();
        self.bump();
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        self.reconciler.lock().len()
    }

    /// Whether nothing is held
    pub fn is_empty(&self) -> bool {
        self.reconciler.lock().is_empty()
    }

    /// Capacity bound
    pub fn max_items(&self) -> usize {
        self.reconciler.lock().max_items()
    }

    /// Current revision
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Receiver that is marked changed on every feed update
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        if let Some(metrics) = &self.metrics {
            let reconciler = self.reconciler.lock();
            metrics.set_feed_state(reconciler.len(), reconciler.unseen_count());
        }
        self.revision.send_modify(|rev| *rev += 1);
    }
}

impl<T: EventRecord> Default for LiveFeed<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITEMS)
    }
}
