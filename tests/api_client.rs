//! Dashboard client against a stub backend

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde_json::{json, Value};
use threat_stream::api::{ApiError, DashboardClient, Panel, ThreatQuery, ThreatStatus};
use threat_stream::Severity;
use tokio::net::TcpListener;

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn threat(id: i64, severity: &str) -> Value {
    json!({
        "id": id,
        "detected_at": "2024-05-01T12:00:00Z",
        "log_id": null,
        "threat_type": "brute_force",
        "severity": severity,
        "anomaly_score": 0.93,
        "source_ip": "203.0.113.7",
        "source_country": "NL",
        "source_lat": 52.37,
        "source_lng": 4.9,
        "raw_log_data": null,
        "status": "open",
        "resolved_at": null
    })
}

fn backend() -> Router {
    Router::new()
        .route(
            "/api/dashboard/stats",
            get(|| async {
                Json(json!({
                    "total_threats": 42, "critical": 3, "high": 9, "medium": 10, "low": 20,
                    "open": 30, "investigating": 8, "resolved": 4, "logs_today": 1200,
                    "type_distribution": [{"type": "brute_force", "count": 30}],
                    "severity_distribution": [{"severity": "critical", "count": 3}]
                }))
            }),
        )
        .route(
            "/api/dashboard/threats/timeline",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let days: usize = q.get("days").and_then(|d| d.parse().ok()).unwrap_or(0);
                Json(
                    (0..days)
                        .map(|d| json!({"date": format!("2024-05-{:02}", d + 1), "count": d}))
                        .collect::<Vec<_>>(),
                )
            }),
        )
        .route(
            "/api/dashboard/threats",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let severity = q.get("severity").cloned().unwrap_or_else(|| "low".to_string());
                Json(json!({"data": [threat(1, &severity)], "count": 1, "echo": q}))
            }),
        )
        .route(
            "/api/dashboard/threats/:id",
            get(|Path(id): Path<i64>| async move {
                if id == 404 {
                    return Err((StatusCode::NOT_FOUND, "no such threat"));
                }
                Ok(Json(json!({"threat": threat(id, "critical"), "recommendation": null})))
            }),
        )
        .route(
            "/api/dashboard/threats/:id/status",
            patch(|Path(id): Path<i64>, Json(body): Json<Value>| async move {
                Json(json!({"id": id, "status": body["status"]}))
            }),
        )
        .route(
            "/api/dashboard/logs",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "database down") }),
        )
        .route(
            "/api/dashboard/recommendations",
            get(|| async { Json(json!({"data": []})) }),
        )
        .route(
            "/api/dashboard/geo",
            get(|| async {
                Json(json!({"data": [
                    {"id": 7, "threat_type": "ddos", "severity": "high", "source_ip": "198.51.100.2",
                     "source_country": "US", "source_lat": 37.77, "source_lng": -122.42,
                     "status": "open", "detected_at": "2024-05-01T12:00:00Z"}
                ]}))
            }),
        )
}

async fn client() -> DashboardClient {
    let addr = serve(backend()).await;
    DashboardClient::new(format!("http://{}", addr)).unwrap()
}

#[tokio::test]
async fn test_get_stats_and_timeline() {
    let client = client().await;

    let stats = client.get_stats().await.unwrap();
    assert_eq!(stats.total_threats, 42);
    assert_eq!(stats.severity_distribution[0].severity, Severity::Critical);

    let timeline = client.get_timeline(14).await.unwrap();
    assert_eq!(timeline.len(), 14);
    assert_eq!(timeline[0].date, "2024-05-01");
}

#[tokio::test]
async fn test_get_threats_sends_filters() {
    let client = client().await;

    let page = client
        .get_threats(&ThreatQuery::limit(100).severity(Severity::High))
        .await
        .unwrap();
    assert_eq!(page.count, 1);
    assert_eq!(page.data[0].severity, Severity::High);
    assert_eq!(page.data[0].anomaly_score, Some(0.93));
}

#[tokio::test]
async fn test_non_success_maps_to_status_error() {
    let client = client().await;

    let err = client.get_threat(404).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "API error 404: no such threat");

    let err = client.get_logs(100).await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 500, .. }));
}

#[tokio::test]
async fn test_update_threat_status() {
    let client = client().await;

    let reply = client
        .update_threat_status(5, ThreatStatus::Investigating)
        .await
        .unwrap();
    assert_eq!(reply["status"], "investigating");
    assert_eq!(reply["id"], 5);
}

#[tokio::test]
async fn test_load_dashboard_keeps_partial_results() {
    let client = client().await;

    let snapshot = client.load_dashboard().await;
    assert_eq!(snapshot.stats.total_threats, 42);
    assert_eq!(snapshot.timeline.len(), 14);
    assert_eq!(snapshot.threats.len(), 1);
    assert_eq!(snapshot.geo[0].id, 7);
    assert!(snapshot.logs.is_empty());

    assert_eq!(snapshot.failures.len(), 1);
    assert_eq!(snapshot.failures[0].panel, Panel::Logs);
    assert_eq!(
        snapshot.error_banner().unwrap(),
        "Failed to fetch dashboard data: logs (API error 500: database down)"
    );
}

#[tokio::test]
async fn test_unreachable_backend() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = DashboardClient::new(format!("http://{}", addr)).unwrap();
    let err = client.get_stats().await.unwrap_err();
    assert!(matches!(err, ApiError::Http(_)));
}
