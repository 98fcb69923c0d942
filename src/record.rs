//! Event records flowing through the live stream
//!
//! ## Table of Contents
//! - **EventRecord**: Anything with a unique integer id
//! - **GeoRecord**: Records that can be placed on the threat map
//! - **Severity**: Ranked threat severity
//! - **LatLng**: Geographic coordinate in degrees
//! - **GeoThreat**: The threat record pushed by the backend stream

use serde::{Deserialize, Serialize};
use std::fmt;

/// A record identified by a unique integer id.
///
/// Two records with the same id are the same event; the reconciler keeps the
/// first instance it sees and drops later duplicates.
pub trait EventRecord: Clone + Send + Sync + 'static {
    /// Unique record id
    fn id(&self) -> i64;
}

/// A record with an optional source location and a severity.
pub trait GeoRecord: EventRecord {
    /// Source latitude, if known
    fn latitude(&self) -> Option<f64>;

    /// Source longitude, if known
    fn longitude(&self) -> Option<f64>;

    /// Threat severity
    fn severity(&self) -> Severity;

    /// Source coordinate when both axes are known
    fn coordinate(&self) -> Option<LatLng> {
        match (self.latitude(), self.longitude()) {
            (Some(lat), Some(lng)) => Some(LatLng::new(lat, lng)),
            _ => None,
        }
    }
}

/// Threat severity, ranked critical > high > medium > low
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Highest severity
    Critical,
    /// High severity
    High,
    /// Medium severity
    Medium,
    /// Low severity
    Low,
    /// Any value the backend sends that is not one of the four above
    #[serde(other)]
    Unknown,
}

impl Severity {
    /// Ranked severities, most severe first
    pub const RANKED: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    /// Numeric rank, higher is more severe
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 4,
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
            Severity::Unknown => 0,
        }
    }

    /// Lowercase name as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lng: f64,
}

impl LatLng {
    /// Create a coordinate
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Planar distance in degrees. Not geodesic.
    pub fn euclidean_distance(&self, other: &LatLng) -> f64 {
        ((other.lat - self.lat).powi(2) + (other.lng - self.lng).powi(2)).sqrt()
    }
}

impl From<(f64, f64)> for LatLng {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self::new(lat, lng)
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.lat, self.lng)
    }
}

/// Threat record as pushed on the live stream and returned by the geo endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoThreat {
    /// Threat id
    pub id: i64,
    /// Threat classification (e.g. "brute_force")
    #[serde(default)]
    pub threat_type: String,
    /// Severity
    #[serde(default = "unknown_severity")]
    pub severity: Severity,
    /// Attacking IP
    #[serde(default)]
    pub source_ip: String,
    /// Attacking country, if geolocated
    #[serde(default)]
    pub source_country: Option<String>,
    /// Source latitude
    #[serde(default)]
    pub source_lat: Option<f64>,
    /// Source longitude
    #[serde(default)]
    pub source_lng: Option<f64>,
    /// Workflow status (open, investigating, resolved)
    #[serde(default)]
    pub status: String,
    /// Detection timestamp as sent by the backend
    #[serde(default)]
    pub detected_at: String,
}

fn unknown_severity() -> Severity {
    Severity::Unknown
}

impl GeoThreat {
    /// Create a minimal threat record, mostly useful for tests and fixtures
    pub fn new(id: i64, severity: Severity) -> Self {
        Self {
            id,
            threat_type: String::new(),
            severity,
            source_ip: String::new(),
            source_country: None,
            source_lat: None,
            source_lng: None,
            status: "open".to_string(),
            detected_at: String::new(),
        }
    }

    /// Set the source location
    pub fn at(mut self, lat: f64, lng: f64) -> Self {
        self.source_lat = Some(lat);
        self.source_lng = Some(lng);
        self
    }

    /// Set the source country
    pub fn from_country(mut self, country: impl Into<String>) -> Self {
        self.source_country = Some(country.into());
        self
    }
}

impl EventRecord for GeoThreat {
    fn id(&self) -> i64 {
        self.id
    }
}

impl GeoRecord for GeoThreat {
    fn latitude(&self) -> Option<f64> {
        self.source_lat
    }

    fn longitude(&self) -> Option<f64> {
        self.source_lng
    }

    fn severity(&self) -> Severity {
        self.severity
    }
}
