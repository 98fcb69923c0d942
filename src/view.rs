//! Live view derivations
//!
//! Pure helpers the overview uses to combine the polled geo list with the
//! live stream.

use std::collections::{HashMap, HashSet};

use crate::reconciler::LiveFeed;
use crate::record::{EventRecord, GeoRecord, GeoThreat};

/// Number of origin countries the overview lists
pub const DEFAULT_TOP_ORIGINS: usize = 6;

/// Live records with a coordinate that the geo list lacks, ahead of the geo list
pub fn merge_live<T: GeoRecord>(geo: &[T], live: &[T]) -> Vec<T> {
    let known: HashSet<i64> = geo.iter().map(|record| record.id()).collect();

    live.iter()
        .filter(|record| record.coordinate().is_some() && !known.contains(&record.id()))
        .chain(geo.iter())
        .cloned()
        .collect()
}

/// Origin countries by threat count, most frequent first.
///
/// Ties keep first-seen order. Records without a country are not counted.
pub fn top_origins(records: &[GeoThreat], n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for country in records.iter().filter_map(|t| t.source_country.as_deref()) {
        let count = counts.entry(country).or_insert(0);
        if *count == 0 {
            order.push(country);
        }
        *count += 1;
    }

    let mut ranked: Vec<(String, usize)> = order
        .into_iter()
        .map(|country| (country.to_string(), counts[country]))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(n);
    ranked
}

/// Records carrying a latitude
pub fn tracked_count<T: GeoRecord>(records: &[T]) -> usize {
    records.iter().filter(|r| r.latitude().is_some()).count()
}

/// Connection indicator text
pub fn status_label(connected: bool) -> &'static str {
    if connected {
        "LIVE"
    } else {
        "OFFLINE"
    }
}

/// Unseen-event badge on the overview tab.
///
/// Viewing the overview acknowledges everything received so far.
#[derive(Clone)]
pub struct LiveBadge<T> {
    feed: LiveFeed<T>,
    on_overview: bool,
}

impl<T: EventRecord> LiveBadge<T> {
    /// Badge for a feed. The viewer starts on the overview.
    pub fn new(feed: LiveFeed<T>) -> Self {
        feed.reset_unseen_count();
        Self {
            feed,
            on_overview: true,
        }
    }

    /// Viewer switched to the overview (`true`) or away from it
    pub fn set_overview_visible(&mut self, visible: bool) {
        self.on_overview = visible;
        if visible {
            self.feed.reset_unseen_count();
        }
    }

    /// Count to show on the badge, `None` when hidden
    pub fn count(&self) -> Option<u64> {
        let unseen = self.feed.unseen_count();
        (!self.on_overview && unseen > 0).then_some(unseen)
    }
}
