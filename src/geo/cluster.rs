//! Grid bucketing

use std::collections::HashMap;
use std::fmt;

use crate::record::{GeoRecord, LatLng, Severity};

/// Grid bucket: latitude and longitude rounded to one decimal.
///
/// Stored as whole tenths of a degree so keys hash and compare exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    lat_tenths: i32,
    lng_tenths: i32,
}

impl BucketKey {
    /// Bucket containing a coordinate
    pub fn of(point: LatLng) -> Self {
        Self {
            lat_tenths: to_tenths(point.lat),
            lng_tenths: to_tenths(point.lng),
        }
    }

    /// Rounded latitude
    pub fn lat(&self) -> f64 {
        f64::from(self.lat_tenths) / 10.0
    }

    /// Rounded longitude
    pub fn lng(&self) -> f64 {
        f64::from(self.lng_tenths) / 10.0
    }
}

/// Round to one decimal the way dashboards print coordinates: the nearest
/// decimal wins, and an exact tie (`x.x5` held exactly, i.e. a fraction of
/// `.25` or `.75`) rounds away from zero.
fn to_tenths(value: f64) -> i32 {
    let magnitude = value.abs();
    let fract = magnitude.fract();
    let tenths = if fract == 0.25 || fract == 0.75 {
        (magnitude * 10.0).ceil()
    } else {
        // `{:.1}` resolves near-ties like `0.15` by the exact binary value.
        let rounded: f64 = format!("{:.1}", magnitude).parse().unwrap_or(magnitude);
        (rounded * 10.0).round()
    };
    let tenths = tenths as i32;
    if value.is_sign_negative() {
        -tenths
    } else {
        tenths
    }
}

fn write_tenths(f: &mut fmt::Formatter<'_>, tenths: i32) -> fmt::Result {
    let sign = if tenths < 0 { "-" } else { "" };
    let abs = tenths.unsigned_abs();
    write!(f, "{}{}.{}", sign, abs / 10, abs % 10)
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_tenths(f, self.lat_tenths)?;
        f.write_str(",")?;
        write_tenths(f, self.lng_tenths)
    }
}

/// Records sharing one bucket
#[derive(Debug, Clone)]
pub struct Cluster<'a, T> {
    /// Bucket key
    pub key: BucketKey,
    /// Unrounded coordinate of the first member
    pub center: LatLng,
    /// Members in input order
    pub members: Vec<&'a T>,
}

impl<'a, T: GeoRecord> Cluster<'a, T> {
    /// Most severe level present, `Low` when none of the ranked levels is
    pub fn dominant_severity(&self) -> Severity {
        Severity::RANKED
            .into_iter()
            .find(|level| self.members.iter().any(|m| m.severity() == *level))
            .unwrap_or(Severity::Low)
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the cluster has no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Clusters in first-seen bucket order
#[derive(Debug, Clone)]
pub struct ClusterMap<'a, T> {
    clusters: Vec<Cluster<'a, T>>,
    index: HashMap<BucketKey, usize>,
}

impl<'a, T> Default for ClusterMap<'a, T> {
    fn default() -> Self {
        Self {
            clusters: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<'a, T> ClusterMap<'a, T> {
    /// Cluster for a bucket
    pub fn get(&self, key: &BucketKey) -> Option<&Cluster<'a, T>> {
        self.index.get(key).map(|&i| &self.clusters[i])
    }

    /// Iterate clusters in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = &Cluster<'a, T>> {
        self.clusters.iter()
    }

    /// Number of clusters
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Whether no record was placed
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    fn insert(&mut self, point: LatLng, record: &'a T) {
        let key = BucketKey::of(point);
        match self.index.get(&key) {
            Some(&i) => self.clusters[i].members.push(record),
            None => {
                self.index.insert(key, self.clusters.len());
                self.clusters.push(Cluster {
                    key,
                    center: point,
                    members: vec![record],
                });
            }
        }
    }
}

impl<'a, T> IntoIterator for ClusterMap<'a, T> {
    type Item = Cluster<'a, T>;
    type IntoIter = std::vec::IntoIter<Cluster<'a, T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.clusters.into_iter()
    }
}

/// Group records by grid bucket. Records without both coordinates are skipped.
pub fn cluster<T: GeoRecord>(records: &[T]) -> ClusterMap<'_, T> {
    let mut map = ClusterMap::default();
    for record in records {
        if let Some(point) = record.coordinate() {
            map.insert(point, record);
        }
    }
    map
}
