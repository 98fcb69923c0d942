// =============================================================================
// threat-stream - Live Threat Feed CLI
// =============================================================================
// Table of Contents:
// 1. Imports
// 2. Command Line
// 3. Main Entry Point
// 4. Feed Watcher
// =============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use threat_stream::api::DashboardClient;
use threat_stream::view::{merge_live, status_label, top_origins, tracked_count, DEFAULT_TOP_ORIGINS};
use threat_stream::{
    cluster, FeedBuilder, GeoThreat, MetricsExporter, StreamConfig, SubscriptionHandle,
    ThreatFeed, TransportKind,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// -----------------------------------------------------------------------------
// 2. Command Line
// -----------------------------------------------------------------------------

/// Follow a live threat stream and log map clusters as they change
#[derive(Debug, Parser)]
#[command(name = "threat-stream", version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "THREAT_STREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Stream endpoint (overrides config)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Transport: sse or websocket (overrides config)
    #[arg(short, long)]
    transport: Option<TransportKind>,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    metrics_addr: Option<std::net::SocketAddr>,

    /// Load the dashboard panels once before streaming
    #[arg(long)]
    load_dashboard: bool,
}

fn load_config(cli: &Cli) -> anyhow::Result<StreamConfig> {
    let config = match &cli.config {
        Some(path) => StreamConfig::from_file(path)?,
        None => StreamConfig::default(),
    };
    let mut config = config.with_env()?;

    if let Some(endpoint) = &cli.endpoint {
        config.stream.endpoint = endpoint.clone();
    }
    if let Some(transport) = cli.transport {
        config.stream.transport = transport;
    }
    if let Some(addr) = cli.metrics_addr {
        config.metrics.enabled = true;
        config.metrics.addr = addr;
    }
    Ok(config)
}

// -----------------------------------------------------------------------------
// 3. Main Entry Point
// -----------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli).context("loading configuration")?;

    let client = match &config.api.base_url {
        Some(url) => Some(DashboardClient::new(url.as_str())?),
        None => None,
    };

    let mut geo = Vec::new();
    if let (true, Some(client)) = (cli.load_dashboard, &client) {
        let snapshot = client.load_dashboard().await;
        if let Some(banner) = snapshot.error_banner() {
            tracing::warn!("{}", banner);
        }
        tracing::info!(
            threats = snapshot.stats.total_threats,
            critical = snapshot.stats.critical,
            geo = snapshot.geo.len(),
            "Dashboard loaded"
        );
        geo = snapshot.geo;
    }

    let live: ThreatFeed<GeoThreat> = FeedBuilder::from_config(config.clone()).build()?;

    if let Some(metrics) = live.metrics() {
        let router = MetricsExporter::new(Arc::clone(metrics)).router();
        let listener = tokio::net::TcpListener::bind(config.metrics.addr)
            .await
            .with_context(|| format!("binding metrics server on {}", config.metrics.addr))?;
        tracing::info!("Metrics available on http://{}/metrics", config.metrics.addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(error = %e, "Metrics server stopped");
            }
        });
    }

    let mut handle = live.start();
    if live.endpoint().is_empty() {
        tracing::warn!("No stream endpoint configured; set THREAT_STREAM_URL or THREAT_API_URL");
    }

    tokio::select! {
        _ = watch_feed(&live, &handle, &geo) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for Ctrl-C")?;
            tracing::info!("Shutting down");
        }
    }

    handle.teardown();
    Ok(())
}

// -----------------------------------------------------------------------------
// 4. Feed Watcher
// -----------------------------------------------------------------------------

async fn watch_feed(live: &ThreatFeed<GeoThreat>, handle: &SubscriptionHandle, geo: &[GeoThreat]) {
    let mut updates = live.feed().subscribe();
    let mut state = handle.watch_state();

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    return;
                }
                let connected = state.borrow_and_update().is_connected();
                tracing::info!(status = status_label(connected), "Stream status");
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    return;
                }
                summarize(live, geo);
            }
        }
    }
}

fn summarize(live: &ThreatFeed<GeoThreat>, geo: &[GeoThreat]) {
    let snapshot = live.feed().snapshot();
    let merged = merge_live(geo, &snapshot);
    let clusters = cluster(&merged);

    let origins = top_origins(&merged, DEFAULT_TOP_ORIGINS)
        .into_iter()
        .map(|(country, count)| format!("{}={}", country, count))
        .collect::<Vec<_>>()
        .join(" ");

    tracing::info!(
        live = snapshot.len(),
        unseen = live.feed().unseen_count(),
        tracked = tracked_count(&merged),
        clusters = clusters.len(),
        origins = %origins,
        "Feed updated"
    );

    for c in clusters.iter().take(5) {
        tracing::debug!(
            bucket = %c.key,
            severity = %c.dominant_severity(),
            members = c.len(),
            "Cluster"
        );
    }
}
