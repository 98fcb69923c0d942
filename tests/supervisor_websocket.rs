//! WebSocket supervision against a real axum server

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use threat_stream::{BackoffConfig, ConnectionState, FeedBuilder, GeoThreat, ThreatFeed, TransportKind};
use tokio::net::TcpListener;

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn ws_handler(State(connections): State<Arc<AtomicUsize>>, ws: WebSocketUpgrade) -> Response {
    let n = connections.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(move |socket| session(socket, n))
}

/// First session sends frames then closes; later sessions stay open.
async fn session(mut socket: WebSocket, n: usize) {
    let base = n as i64 * 10;
    let frames = vec![
        Message::Text(format!(r#"[{{"id":{}}},{{"id":{}}}]"#, base + 1, base + 2)),
        Message::Ping(b"hi".to_vec()),
        Message::Text("[]".to_string()),
        Message::Binary(format!(r#"[{{"id":{}}}]"#, base + 3).into_bytes()),
    ];
    for frame in frames {
        if socket.send(frame).await.is_err() {
            return;
        }
    }

    if n == 0 {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    while let Some(Ok(_)) = socket.recv().await {}
}

async fn start_server() -> (String, Arc<AtomicUsize>) {
    let connections = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(Arc::clone(&connections));
    let addr = serve(app).await;
    (format!("ws://{}/ws", addr), connections)
}

fn build(endpoint: &str) -> ThreatFeed<GeoThreat> {
    FeedBuilder::new()
        .with_endpoint(endpoint)
        .with_transport(TransportKind::WebSocket)
        .with_backoff(BackoffConfig::constant(Duration::from_millis(100)))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_websocket_frames_and_reconnect() {
    let (endpoint, connections) = start_server().await;
    let live = build(&endpoint);
    let mut handle = live.start();

    tokio::time::timeout(Duration::from_secs(10), async {
        while live.feed().len() < 6 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("second session never delivered");

    let ids: Vec<i64> = live.feed().snapshot().iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![13, 11, 12, 3, 1, 2]);
    assert_eq!(connections.load(Ordering::SeqCst), 2);
    assert!(handle.wait_for_state(ConnectionState::Connected).await);

    handle.teardown();
    assert!(!handle.connected());
}
