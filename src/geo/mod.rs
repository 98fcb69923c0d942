//! Geographic clustering for the threat map
//!
//! ## Table of Contents
//! - **cluster**: Group records into ~0.1° grid buckets
//! - **build_arc**: Bowed path between two points
//! - **attack_arcs**: One arc per cluster toward the reference point

pub mod arc;
pub mod cluster;

pub use arc::{attack_arcs, build_arc, AttackArc, DEFAULT_ARC_STEPS};
pub use cluster::{cluster, BucketKey, Cluster, ClusterMap};

use crate::record::LatLng;

/// Default arc destination (New York)
pub const DEFAULT_REFERENCE_POINT: LatLng = LatLng::new(40.7128, -74.006);
