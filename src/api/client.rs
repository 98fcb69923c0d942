//! Dashboard API client

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::CACHE_CONTROL;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::types::{
    DashboardStats, DataEnvelope, LogEntry, Recommendation, ThreatDetail, ThreatPage, ThreatQuery,
    ThreatStatus, TimelinePoint,
};
use super::{ApiError, ApiResult};
use crate::record::GeoThreat;

/// Environment variable holding the backend base URL
pub const THREAT_API_ENV: &str = "THREAT_API_URL";

/// Days of history the overview timeline shows
pub const DEFAULT_TIMELINE_DAYS: u32 = 14;
/// Threats loaded for the overview table
pub const DEFAULT_THREAT_LIMIT: u32 = 100;
/// Log lines loaded for the overview
pub const DEFAULT_LOG_LIMIT: u32 = 100;
/// Recommendations loaded for the overview
pub const DEFAULT_RECOMMENDATION_LIMIT: u32 = 20;

/// Client for the `/api/dashboard` backend
#[derive(Clone)]
pub struct DashboardClient {
    client: Client,
    base_url: String,
}

impl DashboardClient {
    /// Create a client from `THREAT_API_URL`
    pub fn from_env() -> ApiResult<Option<Self>> {
        match std::env::var(THREAT_API_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::new(url).map(Some),
            _ => Ok(None),
        }
    }

    /// Create a client for a backend origin
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Backend origin
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/dashboard{}", self.base_url, path)
    }

    /// Live stream endpoint
    pub fn stream_url(&self) -> String {
        self.url("/stream")
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> ApiResult<T> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.json().await.map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        debug!(path = %path, "GET dashboard API");
        let resp = self
            .client
            .get(self.url(path))
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// Headline counters
    pub async fn get_stats(&self) -> ApiResult<DashboardStats> {
        self.get("/stats").await
    }

    /// Daily threat counts for the last `days` days
    pub async fn get_timeline(&self, days: u32) -> ApiResult<Vec<TimelinePoint>> {
        self.get(&format!("/threats/timeline?days={}", days)).await
    }

    /// Filtered page of threats
    pub async fn get_threats(&self, query: &ThreatQuery) -> ApiResult<ThreatPage> {
        let resp = self
            .client
            .get(self.url("/threats"))
            .header(CACHE_CONTROL, "no-store")
            .query(query)
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// One threat with its recommendation
    pub async fn get_threat(&self, id: i64) -> ApiResult<ThreatDetail> {
        self.get(&format!("/threats/{}", id)).await
    }

    /// Move a threat through the workflow
    pub async fn update_threat_status(
        &self,
        id: i64,
        status: ThreatStatus,
    ) -> ApiResult<serde_json::Value> {
        let resp = self
            .client
            .patch(self.url(&format!("/threats/{}/status", id)))
            .json(&serde_json::json!({ "status": status }))
            .send()
            .await?;

        debug!(threat = id, status = %status, "Threat status updated");
        Self::decode(resp).await
    }

    /// Most recent log lines
    pub async fn get_logs(&self, limit: u32) -> ApiResult<Vec<LogEntry>> {
        let envelope: DataEnvelope<LogEntry> = self.get(&format!("/logs?limit={}", limit)).await?;
        Ok(envelope.data)
    }

    /// Most recent recommendations
    pub async fn get_recommendations(&self, limit: u32) -> ApiResult<Vec<Recommendation>> {
        let envelope: DataEnvelope<Recommendation> =
            self.get(&format!("/recommendations?limit={}", limit)).await?;
        Ok(envelope.data)
    }

    /// Geolocated threats for the map
    pub async fn get_geo(&self) -> ApiResult<Vec<GeoThreat>> {
        let envelope: DataEnvelope<GeoThreat> = self.get("/geo").await?;
        Ok(envelope.data)
    }

    /// Fetch every overview panel concurrently.
    ///
    /// A failing panel is left empty and recorded in
    /// [`DashboardSnapshot::failures`]; the other panels still load.
    pub async fn load_dashboard(&self) -> DashboardSnapshot {
        let threat_query = ThreatQuery::limit(DEFAULT_THREAT_LIMIT);
        let (stats, timeline, threats, logs, recommendations, geo) = tokio::join!(
            self.get_stats(),
            self.get_timeline(DEFAULT_TIMELINE_DAYS),
            self.get_threats(&threat_query),
            self.get_logs(DEFAULT_LOG_LIMIT),
            self.get_recommendations(DEFAULT_RECOMMENDATION_LIMIT),
            self.get_geo(),
        );

        let mut failures = Vec::new();
        let mut settle = |panel: Panel, err: ApiError| {
            warn!(panel = %panel, error = %err, "Dashboard panel failed to load");
            failures.push(PanelFailure {
                panel,
                message: err.to_string(),
            });
        };

        let stats = stats.unwrap_or_else(|e| {
            settle(Panel::Stats, e);
            DashboardStats::default()
        });
        let timeline = timeline.unwrap_or_else(|e| {
            settle(Panel::Timeline, e);
            Vec::new()
        });
        let threats = threats.map(|page| page.data).unwrap_or_else(|e| {
            settle(Panel::Threats, e);
            Vec::new()
        });
        let logs = logs.unwrap_or_else(|e| {
            settle(Panel::Logs, e);
            Vec::new()
        });
        let recommendations = recommendations.unwrap_or_else(|e| {
            settle(Panel::Recommendations, e);
            Vec::new()
        });
        let geo = geo.unwrap_or_else(|e| {
            settle(Panel::Geo, e);
            Vec::new()
        });

        DashboardSnapshot {
            stats,
            timeline,
            threats,
            logs,
            recommendations,
            geo,
            failures,
            fetched_at: Utc::now(),
        }
    }
}

impl fmt::Debug for DashboardClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashboardClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Overview panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    /// Headline counters
    Stats,
    /// Daily detection counts
    Timeline,
    /// Recent threats
    Threats,
    /// Recent log lines
    Logs,
    /// Recent recommendations
    Recommendations,
    /// Threats with coordinates
    Geo,
}

impl Panel {
    /// Panel name
    pub fn as_str(&self) -> &'static str {
        match self {
            Panel::Stats => "stats",
            Panel::Timeline => "timeline",
            Panel::Threats => "threats",
            Panel::Logs => "logs",
            Panel::Recommendations => "recommendations",
            Panel::Geo => "geo",
        }
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A panel that failed to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelFailure {
    /// Which panel
    pub panel: Panel,
    /// Error text
    pub message: String,
}

/// Every overview panel from one load
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    /// Headline counters
    pub stats: DashboardStats,
    /// Daily detection counts
    pub timeline: Vec<TimelinePoint>,
    /// Recent threats
    pub threats: Vec<super::Threat>,
    /// Recent log lines
    pub logs: Vec<LogEntry>,
    /// Recent recommendations
    pub recommendations: Vec<Recommendation>,
    /// Threats for the map
    pub geo: Vec<GeoThreat>,
    /// Panels left empty because their request failed
    pub failures: Vec<PanelFailure>,
    /// When the load finished
    pub fetched_at: DateTime<Utc>,
}

impl DashboardSnapshot {
    /// Whether every panel loaded
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// User-facing error text, if any panel failed
    pub fn error_banner(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }

        let detail = self
            .failures
            .iter()
            .map(|f| format!("{} ({})", f.panel, f.message))
            .collect::<Vec<_>>()
            .join("; ");
        Some(format!("Failed to fetch dashboard data: {}", detail))
    }
}
