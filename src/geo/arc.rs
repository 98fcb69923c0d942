//! Attack arcs
//!
//! Arcs are straight interpolations in degree space with a latitude bow, so
//! they read as curves on an equirectangular map. Not great circles.

use std::f64::consts::PI;

use super::cluster::{BucketKey, ClusterMap};
use crate::record::{GeoRecord, LatLng, Severity};

/// Default number of segments per arc
pub const DEFAULT_ARC_STEPS: usize = 64;

/// Upper bound on the bow height in degrees
const MAX_BOW: f64 = 38.0;

/// Bowed path from `source` to `destination` with `steps + 1` points.
///
/// `steps == 0` gives just the source point.
pub fn build_arc(source: LatLng, destination: LatLng, steps: usize) -> Vec<LatLng> {
    if steps == 0 {
        return vec![source];
    }

    let height = (source.euclidean_distance(&destination) * 0.25 + 6.0).min(MAX_BOW);

    (0..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            let lat = source.lat + (destination.lat - source.lat) * t + height * (PI * t).sin();
            let lng = source.lng + (destination.lng - source.lng) * t;
            LatLng::new(lat, lng)
        })
        .collect()
}

/// Arc from one cluster to the reference point
#[derive(Debug, Clone, PartialEq)]
pub struct AttackArc {
    /// Originating bucket
    pub key: BucketKey,
    /// Dominant severity of the bucket
    pub severity: Severity,
    /// Number of records in the bucket
    pub count: usize,
    /// Path points
    pub path: Vec<LatLng>,
}

/// One arc per cluster, in cluster order
pub fn attack_arcs<T: GeoRecord>(clusters: &ClusterMap<'_, T>, reference: LatLng) -> Vec<AttackArc> {
    clusters
        .iter()
        .map(|c| AttackArc {
            key: c.key,
            severity: c.dominant_severity(),
            count: c.len(),
            path: build_arc(c.center, reference, DEFAULT_ARC_STEPS),
        })
        .collect()
}
