//! Dashboard API payloads

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ApiError;
use crate::record::Severity;

/// Headline counters for the overview
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardStats {
    /// Threats on record
    pub total_threats: u64,
    /// Critical threats
    pub critical: u64,
    /// High threats
    pub high: u64,
    /// Medium threats
    pub medium: u64,
    /// Low threats
    pub low: u64,
    /// Threats not yet triaged
    pub open: u64,
    /// Threats under investigation
    pub investigating: u64,
    /// Resolved threats
    pub resolved: u64,
    /// Log lines ingested today
    pub logs_today: u64,
    /// Counts per threat type
    pub type_distribution: Vec<TypeCount>,
    /// Counts per severity
    pub severity_distribution: Vec<SeverityCount>,
}

/// Threat count per type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCount {
    /// Threat type
    #[serde(rename = "type")]
    pub threat_type: String,
    /// Threats of this type
    pub count: u64,
}

/// Threat count per severity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCount {
    /// Severity
    pub severity: Severity,
    /// Threats at this severity
    pub count: u64,
}

/// Threats detected on one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelinePoint {
    /// Day, `YYYY-MM-DD`
    pub date: String,
    /// Threats detected that day
    pub count: u64,
}

/// Full threat record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threat {
    /// Threat id
    pub id: i64,
    /// Detection time, RFC 3339
    pub detected_at: String,
    /// Log line that raised it
    #[serde(default)]
    pub log_id: Option<i64>,
    /// Threat type
    pub threat_type: String,
    /// Severity
    pub severity: Severity,
    /// Detector score
    #[serde(default)]
    pub anomaly_score: Option<f64>,
    /// Source address
    pub source_ip: String,
    /// Source country
    #[serde(default)]
    pub source_country: Option<String>,
    /// Source latitude
    #[serde(default)]
    pub source_lat: Option<f64>,
    /// Source longitude
    #[serde(default)]
    pub source_lng: Option<f64>,
    /// Raw log payload
    #[serde(default)]
    pub raw_log_data: Option<String>,
    /// Workflow status, see [`ThreatStatus`]
    pub status: String,
    /// Resolution time, if resolved
    #[serde(default)]
    pub resolved_at: Option<String>,
}

/// Page of threats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatPage {
    /// Threats on this page
    pub data: Vec<Threat>,
    /// Total matching threats
    #[serde(default)]
    pub count: u64,
}

/// Threat summary embedded in a recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatSummary {
    /// Threat id
    pub id: i64,
    /// Threat type
    pub threat_type: String,
    /// Severity
    pub severity: Severity,
    /// Source address
    pub source_ip: String,
    /// Source country
    #[serde(default)]
    pub source_country: Option<String>,
    /// Workflow status
    pub status: String,
}

/// Generated remediation advice for a threat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Recommendation id
    pub id: i64,
    /// Threat it was generated for
    pub threat_id: i64,
    /// Generation time
    pub generated_at: String,
    /// One-paragraph summary
    pub summary: String,
    /// Assessed risk level
    pub risk_level: String,
    /// Expected business impact
    pub business_impact: String,
    /// JSON-encoded list of steps, see [`Recommendation::steps`]
    pub action_steps: String,
    /// Technical analysis
    pub technical_detail: String,
    /// Model that produced it
    pub llm_model: String,
    /// The threat it covers
    #[serde(default)]
    pub threats: Option<ThreatSummary>,
}

impl Recommendation {
    /// Decoded action steps. Empty when the field is not a JSON string list.
    pub fn steps(&self) -> Vec<String> {
        serde_json::from_str(&self.action_steps).unwrap_or_default()
    }
}

/// Raw access log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Log line id
    pub id: i64,
    /// Time of the request
    pub timestamp: String,
    /// Client address
    pub source_ip: String,
    /// Server address
    #[serde(default)]
    pub dest_ip: Option<String>,
    /// Requested path
    #[serde(default)]
    pub endpoint: Option<String>,
    /// HTTP method
    #[serde(default)]
    pub method: Option<String>,
    /// Response status
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Bytes sent to the client
    #[serde(default)]
    pub bytes_sent: Option<u64>,
    /// Bytes received from the client
    #[serde(default)]
    pub bytes_recv: Option<u64>,
    /// Client country
    #[serde(default)]
    pub country: Option<String>,
    /// Client user agent
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Event classification
    #[serde(default)]
    pub event_type: Option<String>,
}

/// Threat with its recommendation, if one was generated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatDetail {
    /// The threat
    pub threat: Threat,
    /// Its recommendation
    #[serde(default)]
    pub recommendation: Option<Recommendation>,
}

/// `{ "data": [...] }` list envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    /// Items
    pub data: Vec<T>,
}

/// Threat workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatStatus {
    /// Not yet triaged
    Open,
    /// Being investigated
    Investigating,
    /// Closed out
    Resolved,
}

impl ThreatStatus {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatStatus::Open => "open",
            ThreatStatus::Investigating => "investigating",
            ThreatStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for ThreatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreatStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(ThreatStatus::Open),
            "investigating" => Ok(ThreatStatus::Investigating),
            "resolved" => Ok(ThreatStatus::Resolved),
            other => Err(ApiError::InvalidStatus(other.to_string())),
        }
    }
}

/// Filters for the threat list. Unset fields are left out of the query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThreatQuery {
    /// Page size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Threats to skip
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    /// Severity filter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Status filter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ThreatStatus>,
    /// Threat type filter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat_type: Option<String>,
}

impl ThreatQuery {
    /// Query with a page size
    pub fn limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }

    /// Skip the first `offset` threats
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Only this severity
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Only this status
    pub fn status(mut self, status: ThreatStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Only this threat type
    pub fn threat_type(mut self, threat_type: impl Into<String>) -> Self {
        self.threat_type = Some(threat_type.into());
        self
    }
}
