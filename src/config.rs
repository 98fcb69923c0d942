//! Configuration for threat-stream
//!
//! Loaded from a TOML file, from the environment, or both (file first, then
//! environment overrides).
//!
//! ```toml
//! [stream]
//! endpoint = "http://localhost:8000/api/dashboard/stream"
//! transport = "sse"
//! max_items = 200
//!
//! [reconnect]
//! strategy = "constant"
//! initial_delay_ms = 5000
//!
//! [map]
//! reference = { lat = 40.7128, lng = -74.006 }
//!
//! [metrics]
//! enabled = true
//! addr = "127.0.0.1:9090"
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::error::{Result, StreamError};
use crate::geo::DEFAULT_REFERENCE_POINT;
use crate::reconciler::DEFAULT_MAX_ITEMS;
use crate::record::LatLng;
use crate::resilience::BackoffConfig;
use crate::supervisor::TransportKind;

/// Live stream endpoint
pub const STREAM_URL_ENV: &str = "THREAT_STREAM_URL";
/// Transport name (`sse` or `websocket`)
pub const STREAM_TRANSPORT_ENV: &str = "THREAT_STREAM_TRANSPORT";
/// Collection bound
pub const STREAM_MAX_ITEMS_ENV: &str = "THREAT_STREAM_MAX_ITEMS";
/// Dashboard backend origin
pub const API_URL_ENV: &str = crate::api::THREAT_API_ENV;

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Live stream connection
    pub stream: StreamSection,
    /// Reconnect policy
    pub reconnect: BackoffConfig,
    /// Map settings
    pub map: MapConfig,
    /// Dashboard backend
    pub api: ApiConfig,
    /// Prometheus endpoint
    pub metrics: MetricsConfig,
}

/// Live stream connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSection {
    /// Stream URL. Empty disables the live stream unless an API base URL is
    /// set, in which case the backend's stream endpoint is used.
    pub endpoint: String,
    /// Transport
    pub transport: TransportKind,
    /// Maximum records held
    pub max_items: usize,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            transport: TransportKind::default(),
            max_items: DEFAULT_MAX_ITEMS,
        }
    }
}

/// Map settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Point every attack arc ends at
    pub reference: LatLng,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            reference: DEFAULT_REFERENCE_POINT,
        }
    }
}

/// Dashboard backend settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Backend origin, e.g. `http://localhost:8000`
    pub base_url: Option<String>,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve Prometheus metrics
    pub enabled: bool,
    /// Listen address
    pub addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: SocketAddr::from(([127, 0, 0, 1], 9090)),
        }
    }
}

impl StreamConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            StreamError::config(format!(
                "Failed to read config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parse TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides
    pub fn with_env(self) -> Result<Self> {
        self.with_lookup(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn with_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(STREAM_URL_ENV) {
            self.stream.endpoint = endpoint;
        }
        if let Some(transport) = lookup(STREAM_TRANSPORT_ENV) {
            self.stream.transport = transport.parse()?;
        }
        if let Some(max_items) = lookup(STREAM_MAX_ITEMS_ENV) {
            self.stream.max_items = max_items.trim().parse().map_err(|_| {
                StreamError::config(format!("{} must be a positive integer", STREAM_MAX_ITEMS_ENV))
            })?;
        }
        if let Some(base_url) = lookup(API_URL_ENV).filter(|url| !url.trim().is_empty()) {
            self.api.base_url = Some(base_url);
        }

        self.validate()?;
        Ok(self)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.stream.max_items == 0 {
            return Err(StreamError::config("stream.max_items must be at least 1"));
        }
        if self.reconnect.multiplier < 1.0 {
            return Err(StreamError::config("reconnect.multiplier must be >= 1.0"));
        }
        let reference = self.map.reference;
        if !(-90.0..=90.0).contains(&reference.lat) || !(-180.0..=180.0).contains(&reference.lng) {
            return Err(StreamError::config(format!("map.reference out of range: {}", reference)));
        }
        Ok(())
    }

    /// Endpoint the supervisor should connect to. Empty means disabled.
    pub fn resolved_endpoint(&self) -> String {
        let endpoint = self.stream.endpoint.trim();
        if !endpoint.is_empty() {
            return endpoint.to_string();
        }
        match &self.api.base_url {
            Some(base) => format!("{}/api/dashboard/stream", base.trim_end_matches('/')),
            None => String::new(),
        }
    }
}
